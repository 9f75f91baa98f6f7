//! Symbol universe for multi-symbol runs.
//!
//! Parses symbol lists from configuration and loads bars for each symbol,
//! skipping symbols whose fetch fails or returns nothing.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::domain::code_data::SymbolData;
use crate::ports::data_port::MarketDataPort;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

/// Splits a comma-separated list, trimming and upper-casing each symbol.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    FetchFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default)]
pub struct LoadedUniverse {
    /// Loaded symbols in the order they were requested.
    pub data: Vec<SymbolData>,
    pub skipped: Vec<SkippedSymbol>,
}

impl LoadedUniverse {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.data.iter().map(|sd| sd.symbol.as_str()).collect()
    }
}

pub fn load_universe(
    data_port: &dyn MarketDataPort,
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> LoadedUniverse {
    let mut loaded = LoadedUniverse::default();

    for symbol in symbols {
        let bars = match data_port.fetch_bars(symbol, start, end) {
            Ok(bars) => bars,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "skipping symbol, fetch failed");
                loaded.skipped.push(SkippedSymbol {
                    symbol: symbol.clone(),
                    reason: SkipReason::FetchFailed(e.to_string()),
                });
                continue;
            }
        };

        if bars.is_empty() {
            warn!(symbol = %symbol, "skipping symbol, no data in range");
            loaded.skipped.push(SkippedSymbol {
                symbol: symbol.clone(),
                reason: SkipReason::NoData,
            });
            continue;
        }

        info!(symbol = %symbol, bars = bars.len(), "loaded");
        loaded.data.push(SymbolData::new(symbol.clone(), bars));
    }

    if !loaded.skipped.is_empty() {
        info!(
            loaded = loaded.data.len(),
            requested = symbols.len(),
            "some symbols were skipped"
        );
    }

    loaded
}
