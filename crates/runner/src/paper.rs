//! Paper execution: every order fills immediately

use async_trait::async_trait;
use meridian_core::Order;
use meridian_ports::{Execution, ExecutionError, OrderExecutor};
use rust_decimal::Decimal;

/// Fills market orders at the market price and limit orders at their limit
#[derive(Debug, Default, Clone, Copy)]
pub struct PaperExecutor;

impl PaperExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OrderExecutor for PaperExecutor {
    async fn execute(
        &self,
        order: &Order,
        market_price: Decimal,
    ) -> Result<Execution, ExecutionError> {
        let price = order.effective_price(market_price);
        if price <= Decimal::ZERO {
            return Err(ExecutionError::Rejected(format!(
                "no fill price for {}",
                order.symbol
            )));
        }
        log::info!(
            "[paper] {} {} {} @ {}",
            order.symbol,
            order.side,
            order.quantity,
            price
        );
        Ok(Execution::Filled {
            price,
            quantity: order.quantity,
        })
    }
}
