//! Loaded bars for one symbol and the unified multi-symbol timeline.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDateTime;
use tracing::warn;

use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone)]
pub struct SymbolData {
    pub symbol: String,
    pub bars: Vec<OhlcvBar>,
    pub timestamp_index: HashMap<NaiveDateTime, usize>,
}

impl SymbolData {
    /// Indexes `bars` by timestamp. A repeated timestamp keeps the first bar
    /// and drops the rest, so every run mode sees the same bars.
    pub fn new(symbol: impl Into<String>, bars: Vec<OhlcvBar>) -> Self {
        let symbol = symbol.into();
        let mut timestamp_index = HashMap::with_capacity(bars.len());
        let mut kept = Vec::with_capacity(bars.len());
        for bar in bars {
            if timestamp_index.contains_key(&bar.timestamp) {
                warn!(symbol = %symbol, timestamp = %bar.timestamp, "duplicate bar dropped");
                continue;
            }
            timestamp_index.insert(bar.timestamp, kept.len());
            kept.push(bar);
        }
        Self {
            symbol,
            bars: kept,
            timestamp_index,
        }
    }

    pub fn get_bar_index(&self, timestamp: NaiveDateTime) -> Option<usize> {
        self.timestamp_index.get(&timestamp).copied()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }
}

/// Every timestamp seen across `symbols`, ascending and deduplicated.
pub fn build_unified_timeline(symbols: &[SymbolData]) -> Vec<NaiveDateTime> {
    let unique: BTreeSet<NaiveDateTime> = symbols
        .iter()
        .flat_map(|sd| sd.bars.iter().map(|bar| bar.timestamp))
        .collect();
    unique.into_iter().collect()
}
