//! RSI (Relative Strength Index) indicator.
//!
//! gain[t] = max(C[t] - C[t-1], 0), loss[t] = max(C[t-1] - C[t], 0).
//! Both series are smoothed, then RS = avg_gain / avg_loss and
//! RSI = 100 - 100 / (1 + RS).
//!
//! Smoothing:
//! - `Exponential`: bias-corrected exponential weighting with span = period,
//!   i.e. sum((1-a)^j * x[t-j]) / sum((1-a)^j) over every change seen so far.
//! - `Simple`: arithmetic mean of the last `period` changes.
//!
//! Warmup: the first `period` bars are invalid (need `period` changes).
//! avg_loss == 0 with avg_gain > 0 saturates to 100. When both averages are
//! zero the market is flat and the point is left invalid.

use crate::domain::indicator::ema::alpha;
use crate::domain::indicator::{
    IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue, RsiSmoothing,
};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_PERIOD: usize = 14;

/// RSI from smoothed gain and loss, `None` when both are zero.
pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 {
        if avg_gain > 0.0 { Some(100.0) } else { None }
    } else {
        let rs = avg_gain / avg_loss;
        Some(100.0 - 100.0 / (1.0 + rs))
    }
}

pub fn calculate_rsi(
    bars: &[OhlcvBar],
    period: usize,
    smoothing: RsiSmoothing,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Rsi { period, smoothing };

    let invalid = |bar: &OhlcvBar| IndicatorPoint {
        timestamp: bar.timestamp,
        valid: false,
        value: IndicatorValue::Simple(0.0),
    };

    if period == 0 || bars.len() < 2 {
        return IndicatorSeries {
            indicator_type,
            values: bars.iter().map(invalid).collect(),
        };
    }

    let mut gains = Vec::with_capacity(bars.len() - 1);
    let mut losses = Vec::with_capacity(bars.len() - 1);
    for w in bars.windows(2) {
        let change = w[1].change_from(w[0].close);
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let averages = match smoothing {
        RsiSmoothing::Exponential => exponential_averages(&gains, &losses, period),
        RsiSmoothing::Simple => simple_averages(&gains, &losses, period),
    };

    let mut values = Vec::with_capacity(bars.len());
    values.push(invalid(&bars[0]));

    for (bar, avg) in bars[1..].iter().zip(averages) {
        let rsi = avg.and_then(|(g, l)| rsi_from_averages(g, l));
        values.push(match rsi {
            Some(v) => IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: IndicatorValue::Simple(v),
            },
            None => invalid(bar),
        });
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}

/// Per-change (avg_gain, avg_loss), `None` until `period` changes are seen.
fn exponential_averages(
    gains: &[f64],
    losses: &[f64],
    period: usize,
) -> Vec<Option<(f64, f64)>> {
    let decay = 1.0 - alpha(period);
    let mut num_gain = 0.0;
    let mut num_loss = 0.0;
    let mut weight = 0.0;

    gains
        .iter()
        .zip(losses)
        .enumerate()
        .map(|(i, (&g, &l))| {
            num_gain = g + decay * num_gain;
            num_loss = l + decay * num_loss;
            weight = 1.0 + decay * weight;
            (i + 1 >= period).then(|| (num_gain / weight, num_loss / weight))
        })
        .collect()
}

fn simple_averages(gains: &[f64], losses: &[f64], period: usize) -> Vec<Option<(f64, f64)>> {
    (0..gains.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let start = i + 1 - period;
            let g = gains[start..=i].iter().sum::<f64>() / period as f64;
            let l = losses[start..=i].iter().sum::<f64>() / period as f64;
            Some((g, l))
        })
        .collect()
}
