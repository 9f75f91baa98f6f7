//! Technical indicator implementations.
//!
//! EMA, RSI and Bollinger turn a bar slice into an `IndicatorSeries` with
//! exactly one `IndicatorPoint` per bar. Points inside an indicator's warmup
//! window carry `valid == false`. MACD and the rolling statistics work on
//! plain close vectors. The [`snapshot`] module merges the series
//! into one `IndicatorSnapshot` per bar for the signal classifier.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod snapshot;
pub mod stddev;

pub use ema::{calculate_ema, ema_values};
pub use snapshot::{compute_snapshots, IndicatorSettings, IndicatorSnapshot};

use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub valid: bool,
    pub value: IndicatorValue,
}

impl IndicatorPoint {
    /// The scalar value of a valid `Simple` point.
    pub fn simple(&self) -> Option<f64> {
        match (self.valid, &self.value) {
            (true, IndicatorValue::Simple(v)) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
}

/// How RSI smooths its gain and loss series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RsiSmoothing {
    /// Exponentially weighted mean with span = period.
    #[default]
    Exponential,
    /// Plain rolling mean over the last `period` changes.
    Simple,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Ema(usize),
    Rsi {
        period: usize,
        smoothing: RsiSmoothing,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi { period, smoothing } => match smoothing {
                RsiSmoothing::Exponential => write!(f, "RSI({})", period),
                RsiSmoothing::Simple => write!(f, "RSI_SMA({})", period),
            },
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}
