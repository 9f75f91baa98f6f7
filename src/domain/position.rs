//! Open positions and trade events.

use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

/// A long holding in one symbol. Quantity may be fractional.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub entry_price: f64,
    /// Cash paid to open the position.
    pub cost_basis: f64,
    pub opened_at: NaiveDateTime,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.entry_price)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// One ledger mutation. `realized_pnl` is only set on sells.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeEvent {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub cash_delta: f64,
    pub realized_pnl: Option<f64>,
}
