//! In-memory order sink.
//!
//! Accepts every order unless told to reject, hands out sequential ids and
//! keeps the JSON body of each accepted request for inspection.

use std::cell::{Cell, RefCell};

use serde_json::Value;
use tracing::info;

use crate::domain::error::TraderError;
use crate::domain::order::{OrderReceipt, OrderRequest};
use crate::ports::order_port::OrderPort;

#[derive(Debug, Default)]
pub struct PaperBroker {
    placed: RefCell<Vec<Value>>,
    next_id: Cell<u64>,
    reject_reason: Option<String>,
}

impl PaperBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A broker that refuses every order with `reason`.
    pub fn rejecting(reason: impl Into<String>) -> Self {
        PaperBroker {
            reject_reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Request bodies of accepted orders, oldest first.
    pub fn placed(&self) -> Vec<Value> {
        self.placed.borrow().clone()
    }
}

impl OrderPort for PaperBroker {
    fn place_order(&self, request: &OrderRequest) -> Result<OrderReceipt, TraderError> {
        if let Some(reason) = &self.reject_reason {
            return Err(TraderError::Order {
                symbol: request.symbol.clone(),
                reason: reason.clone(),
            });
        }

        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.placed.borrow_mut().push(request.to_json());

        let receipt = OrderReceipt {
            order_id: format!("paper-{}", id),
            client_order_id: request.client_order_id.clone(),
        };
        info!(order = %request, order_id = %receipt.order_id, "paper fill");
        Ok(receipt)
    }
}
