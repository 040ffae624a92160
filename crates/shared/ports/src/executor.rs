use async_trait::async_trait;
use meridian_core::Order;
use rust_decimal::Decimal;

use crate::error::ExecutionError;

/// Outcome of handing an order to an executor
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    /// Filled immediately (paper trading)
    Filled { price: Decimal, quantity: Decimal },
    /// Accepted by the venue; fills arrive later on the orders channel
    Accepted { exchange_order_id: String },
}

/// Where risk-approved orders are sent
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    async fn execute(&self, order: &Order, market_price: Decimal)
    -> Result<Execution, ExecutionError>;
}
