//! Order execution port trait.
//!
//! The only capability the trade lifecycle depends on. Implementations own
//! the broker protocol, timeouts and credentials.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub trade_id: String,
    pub symbol: String,
    pub action: OrderAction,
    pub quantity: u64,
    /// Price the engine expects to trade at; simulated venues fill against it.
    pub reference_price: f64,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderId(pub String);

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub order_id: OrderId,
    pub price: f64,
    pub quantity: u64,
}

/// Net position held at the venue; negative for short.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerPosition {
    pub symbol: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    #[error("order rejected: {0}")]
    Rejected(String),
    #[error("order not confirmed: {0}")]
    Unconfirmed(String),
    #[error("venue unavailable: {0}")]
    Unavailable(String),
}

pub trait ExecutionPort {
    fn submit_order(&mut self, order: &OrderRequest) -> Result<OrderId, ExecutionError>;
    fn confirm_fill(&mut self, order_id: &OrderId) -> Result<Fill, ExecutionError>;
    fn cancel_order(&mut self, order_id: &OrderId) -> Result<(), ExecutionError>;
    fn fetch_positions(&self) -> Result<Vec<BrokerPosition>, ExecutionError>;
}
