//! Order-placement sink port.

use crate::domain::error::TraderError;
use crate::domain::order::{OrderReceipt, OrderRequest};

pub trait OrderPort {
    fn place_order(&self, request: &OrderRequest) -> Result<OrderReceipt, TraderError>;
}
