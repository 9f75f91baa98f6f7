//! Order requests sent to the order-placement sink.
//!
//! Each order type carries its own fields and encodes to its own JSON
//! body shape: `{client_order_id, side, type, symbol, <type>_order_config}`.

use std::fmt;

use chrono::NaiveDateTime;
use serde_json::{json, Value};

use super::position::Side;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderType {
    Market { quantity: f64 },
    Limit { quantity: f64, limit_price: f64 },
}

impl OrderType {
    pub fn name(&self) -> &'static str {
        match self {
            OrderType::Market { .. } => "market",
            OrderType::Limit { .. } => "limit",
        }
    }

    pub fn quantity(&self) -> f64 {
        match *self {
            OrderType::Market { quantity } | OrderType::Limit { quantity, .. } => quantity,
        }
    }

    fn config(&self) -> Value {
        match *self {
            OrderType::Market { quantity } => json!({
                "asset_quantity": quantity.to_string(),
            }),
            OrderType::Limit {
                quantity,
                limit_price,
            } => json!({
                "asset_quantity": quantity.to_string(),
                "limit_price": limit_price.to_string(),
                "time_in_force": "gtc",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub client_order_id: String,
    pub side: Side,
    pub symbol: String,
    pub order_type: OrderType,
}

impl OrderRequest {
    /// Request body for the brokerage API.
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "client_order_id": self.client_order_id,
            "side": self.side,
            "type": self.order_type.name(),
            "symbol": self.symbol,
        });
        if let Value::Object(map) = &mut body {
            map.insert(
                format!("{}_order_config", self.order_type.name()),
                self.order_type.config(),
            );
        }
        body
    }
}

impl fmt::Display for OrderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} x{}",
            self.order_type.name(),
            self.side,
            self.symbol,
            self.order_type.quantity()
        )
    }
}

/// Acknowledgement from the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    pub order_id: String,
    pub client_order_id: String,
}

/// Deterministic client id: symbol, bar timestamp and a per-session counter.
pub fn client_order_id(symbol: &str, timestamp: NaiveDateTime, seq: u64) -> String {
    format!("{}-{}-{}", symbol, timestamp.format("%Y%m%dT%H%M%S"), seq)
}
