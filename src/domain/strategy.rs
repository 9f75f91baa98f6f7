//! Signal classification.
//!
//! A [`Strategy`] maps one bar's indicator snapshot and close price to an
//! [`Action`]. Classification is stateless; the simulator decides whether
//! an action is applicable given the current position.

use std::fmt;

use crate::domain::indicator::IndicatorSnapshot;

pub const DEFAULT_OVERSOLD: f64 = 30.0;
pub const DEFAULT_OVERBOUGHT: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

/// Which rule produced an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalReason {
    TrendMomentumBuy,
    TrendMomentumSell,
    UpperBandBreakout,
    LowerBandBreakout,
    RsiOversold,
    RsiOverbought,
    Neutral,
    Warmup,
}

impl fmt::Display for SignalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalReason::TrendMomentumBuy => "rsi oversold above trend with macd bullish",
            SignalReason::TrendMomentumSell => "rsi overbought below trend with macd bearish",
            SignalReason::UpperBandBreakout => "close above upper band",
            SignalReason::LowerBandBreakout => "close below lower band",
            SignalReason::RsiOversold => "rsi oversold",
            SignalReason::RsiOverbought => "rsi overbought",
            SignalReason::Neutral => "no rule matched",
            SignalReason::Warmup => "indicators warming up",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub action: Action,
    pub reason: SignalReason,
}

impl Signal {
    fn new(action: Action, reason: SignalReason) -> Self {
        Signal { action, reason }
    }

    fn hold(reason: SignalReason) -> Self {
        Signal::new(Action::Hold, reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strategy {
    /// RSI gated by the long trend EMA and MACD, with Bollinger breakouts
    /// as a fallback. First matching rule wins.
    Composite { oversold: f64, overbought: f64 },
    /// RSI thresholds only.
    RsiOnly { oversold: f64, overbought: f64 },
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Composite {
            oversold: DEFAULT_OVERSOLD,
            overbought: DEFAULT_OVERBOUGHT,
        }
    }
}

impl Strategy {
    pub fn rsi_only() -> Self {
        Strategy::RsiOnly {
            oversold: DEFAULT_OVERSOLD,
            overbought: DEFAULT_OVERBOUGHT,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Composite { .. } => "composite",
            Strategy::RsiOnly { .. } => "rsi_only",
        }
    }

    pub fn classify(&self, snapshot: &IndicatorSnapshot, close: f64) -> Signal {
        match *self {
            Strategy::Composite {
                oversold,
                overbought,
            } => classify_composite(snapshot, close, oversold, overbought),
            Strategy::RsiOnly {
                oversold,
                overbought,
            } => classify_rsi(snapshot, oversold, overbought),
        }
    }
}

fn classify_composite(
    snapshot: &IndicatorSnapshot,
    close: f64,
    oversold: f64,
    overbought: f64,
) -> Signal {
    let (Some(rsi), Some(trend), Some(macd), Some(signal), Some(upper), Some(lower)) = (
        snapshot.rsi,
        snapshot.ema_trend,
        snapshot.macd,
        snapshot.macd_signal,
        snapshot.bollinger_upper,
        snapshot.bollinger_lower,
    ) else {
        return Signal::hold(SignalReason::Warmup);
    };

    if rsi < oversold && close > trend && macd > signal {
        Signal::new(Action::Buy, SignalReason::TrendMomentumBuy)
    } else if rsi > overbought && close < trend && macd < signal {
        Signal::new(Action::Sell, SignalReason::TrendMomentumSell)
    } else if close > upper {
        Signal::new(Action::Sell, SignalReason::UpperBandBreakout)
    } else if close < lower {
        Signal::new(Action::Buy, SignalReason::LowerBandBreakout)
    } else {
        Signal::hold(SignalReason::Neutral)
    }
}

fn classify_rsi(snapshot: &IndicatorSnapshot, oversold: f64, overbought: f64) -> Signal {
    match snapshot.rsi {
        None => Signal::hold(SignalReason::Warmup),
        Some(rsi) if rsi < oversold => Signal::new(Action::Buy, SignalReason::RsiOversold),
        Some(rsi) if rsi > overbought => Signal::new(Action::Sell, SignalReason::RsiOverbought),
        Some(_) => Signal::hold(SignalReason::Neutral),
    }
}
