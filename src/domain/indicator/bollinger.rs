//! Bollinger Bands indicator.
//!
//! - Middle: rolling mean of the last n closes
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is the rolling sample standard deviation from
//! [`super::stddev::rolling_mean_std`], computed once by the caller.
//! Default parameters: period=20, multiplier=2.0.
//! Warmup: first (period-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Multiplier encoded in hundredths so it can live in a hashable key.
pub fn multiplier_x100(multiplier: f64) -> u32 {
    (multiplier * 100.0).round().max(0.0) as u32
}

/// Bands over precomputed `stats`, the output of `rolling_mean_std` for the
/// same bars and `period`.
pub fn calculate_bollinger(
    bars: &[OhlcvBar],
    stats: &[Option<(f64, f64)>],
    period: usize,
    multiplier: f64,
) -> IndicatorSeries {
    let values = bars
        .iter()
        .zip(stats.iter().copied())
        .map(|(bar, stats)| {
            let (upper, middle, lower) = match stats {
                Some((mean, std)) => (mean + multiplier * std, mean, mean - multiplier * std),
                None => (0.0, 0.0, 0.0),
            };
            IndicatorPoint {
                timestamp: bar.timestamp,
                valid: stats.is_some(),
                value: IndicatorValue::Bollinger {
                    upper,
                    middle,
                    lower,
                },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Bollinger {
            period,
            stddev_mult_x100: multiplier_x100(multiplier),
        },
        values,
    }
}
