//! Per-bar indicator snapshots.
//!
//! Runs every indicator the classifier needs over one instrument's bars and
//! zips the series into one `IndicatorSnapshot` per bar. Values that are
//! still inside their warmup window are `None`.

use chrono::NaiveDateTime;

use crate::domain::indicator::bollinger::{self, calculate_bollinger};
use crate::domain::indicator::macd::{self, macd_lines};
use crate::domain::indicator::rsi::{self, calculate_rsi};
use crate::domain::indicator::stddev::rolling_mean_std;
use crate::domain::indicator::{calculate_ema, IndicatorPoint, IndicatorValue, RsiSmoothing};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_TREND_PERIOD: usize = 200;

/// Periods and multipliers for every indicator in a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSettings {
    pub rsi_period: usize,
    pub rsi_smoothing: RsiSmoothing,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub trend_period: usize,
    pub bollinger_period: usize,
    pub bollinger_multiplier: f64,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        IndicatorSettings {
            rsi_period: rsi::DEFAULT_PERIOD,
            rsi_smoothing: RsiSmoothing::Exponential,
            macd_fast: macd::DEFAULT_FAST,
            macd_slow: macd::DEFAULT_SLOW,
            macd_signal: macd::DEFAULT_SIGNAL,
            trend_period: DEFAULT_TREND_PERIOD,
            bollinger_period: bollinger::DEFAULT_PERIOD,
            bollinger_multiplier: bollinger::DEFAULT_MULTIPLIER,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub timestamp: NaiveDateTime,
    pub rsi: Option<f64>,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub ema_trend: Option<f64>,
    pub rolling_mean: Option<f64>,
    pub rolling_std: Option<f64>,
    pub bollinger_upper: Option<f64>,
    pub bollinger_lower: Option<f64>,
}

impl IndicatorSnapshot {
    /// A snapshot with nothing defined yet.
    pub fn empty(timestamp: NaiveDateTime) -> Self {
        IndicatorSnapshot {
            timestamp,
            rsi: None,
            ema_fast: None,
            ema_slow: None,
            macd: None,
            macd_signal: None,
            ema_trend: None,
            rolling_mean: None,
            rolling_std: None,
            bollinger_upper: None,
            bollinger_lower: None,
        }
    }

    /// True once every field is defined.
    pub fn is_complete(&self) -> bool {
        [
            self.rsi,
            self.ema_fast,
            self.ema_slow,
            self.macd,
            self.macd_signal,
            self.ema_trend,
            self.rolling_mean,
            self.rolling_std,
            self.bollinger_upper,
            self.bollinger_lower,
        ]
        .iter()
        .all(Option::is_some)
    }
}

/// One snapshot per bar, using only bars at or before each index.
pub fn compute_snapshots(bars: &[OhlcvBar], settings: &IndicatorSettings) -> Vec<IndicatorSnapshot> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let rsi = calculate_rsi(bars, settings.rsi_period, settings.rsi_smoothing);
    let trend = calculate_ema(bars, settings.trend_period);
    let lines = macd_lines(
        &closes,
        settings.macd_fast,
        settings.macd_slow,
        settings.macd_signal,
    );
    let stats = rolling_mean_std(&closes, settings.bollinger_period);
    let bands = calculate_bollinger(
        bars,
        &stats,
        settings.bollinger_period,
        settings.bollinger_multiplier,
    );

    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let mut snap = IndicatorSnapshot::empty(bar.timestamp);

            snap.rsi = rsi.values.get(i).and_then(|p| p.simple());
            snap.ema_trend = trend.values.get(i).and_then(|p| p.simple());

            snap.ema_fast = lines.ema_fast.get(i).copied();
            snap.ema_slow = lines.ema_slow.get(i).copied();
            snap.macd = lines.line.get(i).copied();
            snap.macd_signal = lines.signal.get(i).copied();

            if let Some(IndicatorPoint {
                valid: true,
                value:
                    IndicatorValue::Bollinger {
                        upper,
                        middle,
                        lower,
                    },
                ..
            }) = bands.values.get(i)
            {
                snap.bollinger_upper = Some(*upper);
                snap.rolling_mean = Some(*middle);
                snap.bollinger_lower = Some(*lower);
            }
            snap.rolling_std = stats.get(i).copied().flatten().map(|(_, std)| std);

            snap
        })
        .collect()
}
