#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use rsitrader::domain::backtest::BacktestConfig;
use rsitrader::domain::code_data::SymbolData;
use rsitrader::domain::error::TraderError;
use rsitrader::domain::indicator::{IndicatorSettings, RsiSmoothing};
pub use rsitrader::domain::ohlcv::OhlcvBar;
use rsitrader::domain::strategy::Strategy;
use rsitrader::ports::data_port::MarketDataPort;
use std::collections::HashMap;

/// Closes that drive a 3-period simple RSI to 0 on the fourth bar (buy at
/// 50) and to 100 on the last bar (sell at 60).
pub const CYCLE_CLOSES: [f64; 7] = [80.0, 70.0, 60.0, 50.0, 52.0, 56.0, 60.0];

/// 25 bars alternating 100/101, a drop to 90 below the lower band, then a
/// jump to 120 above the upper band. Under the default composite settings
/// the drop is a buy and the jump a sell; the trend EMA stays near 100.
pub fn breakout_closes() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..25)
        .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
        .collect();
    closes.push(90.0);
    closes.push(120.0);
    closes
}

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, TraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(TraderError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.timestamp.date() >= start && b.timestamp.date() <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, TraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn day(n: usize) -> NaiveDateTime {
    (date(2024, 1, 1) + chrono::Duration::days(n as i64))
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn make_bar(symbol: &str, n: usize, close: f64) -> OhlcvBar {
    OhlcvBar::daily(
        symbol,
        day(n).date(),
        close,
        close + 1.0,
        close - 1.0,
        close,
        1000.0,
    )
}

/// Daily bars starting 2024-01-01, one per close.
pub fn bars_from_closes(symbol: &str, closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(symbol, i, c))
        .collect()
}

/// A slow sine wave around `start_price`, enough to move every indicator.
pub fn generate_bars(symbol: &str, count: usize, start_price: f64) -> Vec<OhlcvBar> {
    let closes: Vec<f64> = (0..count)
        .map(|i| {
            let t = i as f64;
            start_price + 0.05 * t + 8.0 * (t / 9.0).sin() + 3.0 * (t / 2.3).cos()
        })
        .collect();
    bars_from_closes(symbol, &closes)
}

pub fn symbol_data(symbol: &str, closes: &[f64]) -> SymbolData {
    SymbolData::new(symbol, bars_from_closes(symbol, closes))
}

/// RSI-only strategy on a 3-period simple RSI, fixed 1000 per trade.
pub fn rsi_config() -> BacktestConfig {
    BacktestConfig {
        strategy: Strategy::rsi_only(),
        indicators: IndicatorSettings {
            rsi_period: 3,
            rsi_smoothing: RsiSmoothing::Simple,
            ..IndicatorSettings::default()
        },
        ..BacktestConfig::default()
    }
}

pub fn full_range() -> (NaiveDate, NaiveDate) {
    (date(2024, 1, 1), date(2024, 12, 31))
}
