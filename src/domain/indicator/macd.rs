//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//!
//! Default parameters: fast=12, slow=26, signal=9.
//! Every EMA is seeded with its first input, so there is no warmup gate.

use crate::domain::indicator::ema_values;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

/// Raw MACD components, one entry per input bar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacdLines {
    pub ema_fast: Vec<f64>,
    pub ema_slow: Vec<f64>,
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
}

pub fn macd_lines(closes: &[f64], fast: usize, slow: usize, signal_period: usize) -> MacdLines {
    if closes.is_empty() || fast == 0 || slow == 0 || signal_period == 0 {
        return MacdLines::default();
    }

    let ema_fast = ema_values(closes, fast);
    let ema_slow = ema_values(closes, slow);
    let line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let signal = ema_values(&line, signal_period);

    MacdLines {
        ema_fast,
        ema_slow,
        line,
        signal,
    }
}
