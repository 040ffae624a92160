//! Order placement over the private endpoint

use async_trait::async_trait;
use meridian_core::Order;
use meridian_ports::{Execution, ExecutionError, OrderExecutor};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::client::ProtocolClient;
use crate::error::GatewayError;
use crate::messages::OrderRequest;

/// Sends `op: "order"` requests; fills arrive later on the `orders` channel
pub struct GatewayOrderExecutor {
    client: Arc<ProtocolClient>,
}

impl GatewayOrderExecutor {
    pub fn new(client: Arc<ProtocolClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OrderExecutor for GatewayOrderExecutor {
    async fn execute(
        &self,
        order: &Order,
        _market_price: Decimal,
    ) -> Result<Execution, ExecutionError> {
        let request = OrderRequest::from(order);
        let arg = serde_json::to_value(&request)
            .map_err(|e| ExecutionError::Transport(e.to_string()))?;

        let response = self.client.send("order", vec![arg]).await.map_err(|e| match e {
            GatewayError::Request { code, msg } => ExecutionError::Rejected(format!("{} {}", code, msg)),
            other => ExecutionError::Transport(other.to_string()),
        })?;

        // Per-order result: {"ordId", "clOrdId", "sCode", "sMsg"}
        let item = response
            .data
            .first()
            .ok_or_else(|| ExecutionError::Transport("order response without data".into()))?;
        let s_code = item.get("sCode").and_then(|v| v.as_str()).unwrap_or("0");
        if s_code != "0" {
            let s_msg = item.get("sMsg").and_then(|v| v.as_str()).unwrap_or_default();
            return Err(ExecutionError::Rejected(format!("{} {}", s_code, s_msg)));
        }
        let exchange_order_id = item
            .get("ordId")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        log::info!(
            "[order] {} {} {} accepted as {}",
            order.side,
            order.quantity,
            order.symbol,
            exchange_order_id
        );
        Ok(Execution::Accepted { exchange_order_id })
    }
}
