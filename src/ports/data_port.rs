//! Market-data supplier port.

use chrono::NaiveDate;

use crate::domain::error::TraderError;
use crate::domain::ohlcv::OhlcvBar;

pub trait MarketDataPort {
    /// Bars for `symbol` whose date falls within `start..=end`, ascending.
    /// An empty vector means no data, which callers treat as "skip".
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, TraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, TraderError>;
}
