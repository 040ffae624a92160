//! Order wire types

use chrono::{DateTime, Utc};
use meridian_core::{Order, OrderStatus, OrderType, Side, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Arguments of an `op: "order"` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub inst_id: String,
    /// Trade mode; spot orders are always `cash`
    pub td_mode: String,
    pub side: Side,
    pub ord_type: OrderType,
    pub sz: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub px: Option<String>,
    /// Client-assigned order ID for correlation
    pub cl_ord_id: String,
}

impl From<&Order> for OrderRequest {
    fn from(order: &Order) -> Self {
        Self {
            inst_id: order.symbol.clone(),
            td_mode: "cash".to_string(),
            side: order.side,
            ord_type: order.order_type,
            sz: order.quantity.normalize().to_string(),
            px: match order.order_type {
                OrderType::Limit => order.price.map(|p| p.normalize().to_string()),
                OrderType::Market => None,
            },
            cl_ord_id: order.client_order_id(),
        }
    }
}

/// Order state change pushed on the private `orders` channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub symbol: Symbol,
    pub exchange_order_id: String,
    pub client_order_id: String,
    pub side: Side,
    pub order_type: String,
    pub price: Option<Decimal>,
    pub size: Decimal,
    /// Price of the latest fill, if this push carries one
    pub fill_price: Option<Decimal>,
    /// Quantity of the latest fill (zero when the push is not a fill)
    pub fill_size: Decimal,
    pub accumulated_fill_size: Decimal,
    pub avg_price: Option<Decimal>,
    /// Venue state: live, partially_filled, filled, canceled
    pub state: String,
    pub fee: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

impl OrderUpdate {
    pub fn is_fill(&self) -> bool {
        !self.fill_size.is_zero() && self.fill_price.is_some()
    }

    pub fn status(&self) -> OrderStatus {
        match self.state.as_str() {
            "live" => OrderStatus::Submitted,
            "partially_filled" => OrderStatus::Partial,
            "filled" => OrderStatus::Filled,
            "canceled" | "mmp_canceled" => OrderStatus::Cancelled,
            _ => OrderStatus::Failed,
        }
    }
}
