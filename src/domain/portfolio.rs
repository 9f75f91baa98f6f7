//! Portfolio ledger: cash, open positions, trade log and valuation history.
//!
//! `open_position` and `close_position` are the only mutation paths. Both
//! return a [`LedgerRejection`] instead of mutating when a precondition
//! fails; rejections are ordinary outcomes, not errors.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use thiserror::Error;

use super::position::{Position, Side, TradeEvent};

pub const DEFAULT_MAX_ACTIVE_POSITIONS: usize = 5;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerRejection {
    #[error("invalid price {price}")]
    InvalidPrice { price: f64 },

    #[error("invalid investment amount {amount}")]
    InvalidAmount { amount: f64 },

    #[error("position already open for {symbol}")]
    AlreadyOpen { symbol: String },

    #[error("max active positions reached ({max})")]
    MaxPositions { max: usize },

    #[error("insufficient cash: need {required:.2}, have {available:.2}")]
    InsufficientCash { required: f64, available: f64 },

    #[error("no open position for {symbol}")]
    NoPosition { symbol: String },
}

/// Ledger state after one processed bar. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationSnapshot {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub cash: f64,
    pub position_quantity: f64,
    pub portfolio_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    cash: f64,
    initial_capital: f64,
    max_active_positions: usize,
    positions: BTreeMap<String, Position>,
    trade_log: Vec<TradeEvent>,
    valuation_history: Vec<ValuationSnapshot>,
}

fn valid_positive(x: f64) -> bool {
    x.is_finite() && x > 0.0
}

fn price_for(position: &Position, prices: &HashMap<String, f64>) -> f64 {
    prices
        .get(&position.symbol)
        .copied()
        .unwrap_or(position.entry_price)
}

impl Portfolio {
    pub fn new(initial_capital: f64, max_active_positions: usize) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            max_active_positions,
            positions: BTreeMap::new(),
            trade_log: Vec::new(),
            valuation_history: Vec::new(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn max_active_positions(&self) -> usize {
        self.max_active_positions
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn active_position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn trade_log(&self) -> &[TradeEvent] {
        &self.trade_log
    }

    pub fn valuation_history(&self) -> &[ValuationSnapshot] {
        &self.valuation_history
    }

    /// Checks every open precondition without touching state.
    pub fn check_open(&self, symbol: &str, price: f64, amount: f64) -> Result<(), LedgerRejection> {
        if !valid_positive(price) {
            return Err(LedgerRejection::InvalidPrice { price });
        }
        if !valid_positive(amount) {
            return Err(LedgerRejection::InvalidAmount { amount });
        }
        if self.has_position(symbol) {
            return Err(LedgerRejection::AlreadyOpen {
                symbol: symbol.to_string(),
            });
        }
        if self.active_position_count() >= self.max_active_positions {
            return Err(LedgerRejection::MaxPositions {
                max: self.max_active_positions,
            });
        }
        if self.cash.is_nan() || self.cash < amount {
            return Err(LedgerRejection::InsufficientCash {
                required: amount,
                available: self.cash,
            });
        }
        Ok(())
    }

    /// Invests `amount` in `symbol` at `price`.
    pub fn open_position(
        &mut self,
        symbol: &str,
        price: f64,
        amount: f64,
        timestamp: NaiveDateTime,
    ) -> Result<TradeEvent, LedgerRejection> {
        self.check_open(symbol, price, amount)?;
        Ok(self.record_open(symbol, price, amount / price, amount, timestamp))
    }

    /// Buys exactly `quantity` units of `symbol` at `price`.
    pub fn open_quantity(
        &mut self,
        symbol: &str,
        price: f64,
        quantity: f64,
        timestamp: NaiveDateTime,
    ) -> Result<TradeEvent, LedgerRejection> {
        let amount = quantity * price;
        self.check_open(symbol, price, amount)?;
        Ok(self.record_open(symbol, price, quantity, amount, timestamp))
    }

    fn record_open(
        &mut self,
        symbol: &str,
        price: f64,
        quantity: f64,
        amount: f64,
        timestamp: NaiveDateTime,
    ) -> TradeEvent {
        self.cash -= amount;
        self.positions.insert(
            symbol.to_string(),
            Position {
                symbol: symbol.to_string(),
                quantity,
                entry_price: price,
                cost_basis: amount,
                opened_at: timestamp,
            },
        );

        let event = TradeEvent {
            timestamp,
            symbol: symbol.to_string(),
            side: Side::Buy,
            price,
            quantity,
            cash_delta: -amount,
            realized_pnl: None,
        };
        self.trade_log.push(event.clone());
        event
    }

    /// Sells the whole position in `symbol` at `price`.
    pub fn close_position(
        &mut self,
        symbol: &str,
        price: f64,
        timestamp: NaiveDateTime,
    ) -> Result<TradeEvent, LedgerRejection> {
        if !valid_positive(price) {
            return Err(LedgerRejection::InvalidPrice { price });
        }
        let position = self
            .positions
            .remove(symbol)
            .ok_or_else(|| LedgerRejection::NoPosition {
                symbol: symbol.to_string(),
            })?;

        let realized = position.unrealized_pnl(price);
        // cost basis plus gain, i.e. quantity * price
        let proceeds = position.cost_basis + realized;
        self.cash += proceeds;

        let event = TradeEvent {
            timestamp,
            symbol: symbol.to_string(),
            side: Side::Sell,
            price,
            quantity: position.quantity,
            cash_delta: proceeds,
            realized_pnl: Some(realized),
        };
        self.trade_log.push(event.clone());
        Ok(event)
    }

    /// Cash plus every position at `prices`. Symbols without a price are
    /// valued at their entry price.
    pub fn mark_to_market(&self, prices: &HashMap<String, f64>) -> f64 {
        let held: f64 = self
            .positions
            .values()
            .map(|p| p.market_value(price_for(p, prices)))
            .sum();
        self.cash + held
    }

    pub fn unrealized_pnl(&self, prices: &HashMap<String, f64>) -> f64 {
        self.positions
            .values()
            .map(|p| p.unrealized_pnl(price_for(p, prices)))
            .sum()
    }

    pub fn realized_pnl(&self) -> f64 {
        self.trade_log.iter().filter_map(|t| t.realized_pnl).sum()
    }

    /// Realized P&L from trades in one symbol.
    pub fn realized_pnl_for(&self, symbol: &str) -> f64 {
        self.trade_log
            .iter()
            .filter(|t| t.symbol == symbol)
            .filter_map(|t| t.realized_pnl)
            .sum()
    }

    /// Appends a valuation for `symbol` and returns it.
    pub fn record_valuation(
        &mut self,
        timestamp: NaiveDateTime,
        symbol: &str,
        prices: &HashMap<String, f64>,
    ) -> &ValuationSnapshot {
        let snapshot = ValuationSnapshot {
            timestamp,
            symbol: symbol.to_string(),
            cash: self.cash,
            position_quantity: self.position(symbol).map_or(0.0, |p| p.quantity),
            portfolio_value: self.mark_to_market(prices),
        };
        self.valuation_history.push(snapshot);
        &self.valuation_history[self.valuation_history.len() - 1]
    }
}
