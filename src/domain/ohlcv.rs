//! OHLCV bar representation.

use chrono::{NaiveDate, NaiveDateTime};

/// One price bar as delivered by the market-data supplier. Bars are never
/// reordered by the engine; suppliers hand them over ascending by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// Convenience constructor for daily bars stamped at midnight.
    pub fn daily(
        symbol: &str,
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        OhlcvBar {
            symbol: symbol.to_string(),
            timestamp: date.and_time(chrono::NaiveTime::MIN),
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// close - previous close
    pub fn change_from(&self, prev_close: f64) -> f64 {
        self.close - prev_close
    }
}

/// True when timestamps are strictly ascending (unique and ordered).
pub fn is_strictly_ascending(bars: &[OhlcvBar]) -> bool {
    bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
}
