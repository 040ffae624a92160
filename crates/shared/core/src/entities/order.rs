use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderStatus, OrderType, Side};
use crate::values::Symbol;

/// Unique identifier for an order
pub type OrderId = Uuid;

/// An order intent. Orders are ephemeral: the core never persists them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    /// Required for limit orders, ignored for market orders
    pub price: Option<Decimal>,
    pub status: OrderStatus,
    /// Venue order id once the exchange has acknowledged the order
    pub exchange_order_id: Option<String>,
    pub filled_quantity: Decimal,
    /// Weighted average fill price
    pub filled_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a new order with explicit timestamp
    pub fn new_with_time(
        symbol: impl Into<Symbol>,
        side: Side,
        order_type: OrderType,
        quantity: Decimal,
        price: Option<Decimal>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            side,
            order_type,
            quantity,
            price,
            status: OrderStatus::Pending,
            exchange_order_id: None,
            filled_quantity: Decimal::ZERO,
            filled_price: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Market order stamped with the current system time
    pub fn market(symbol: impl Into<Symbol>, side: Side, quantity: Decimal) -> Self {
        Self::new_with_time(symbol, side, OrderType::Market, quantity, None, Utc::now())
    }

    /// Limit order stamped with the current system time
    pub fn limit(symbol: impl Into<Symbol>, side: Side, quantity: Decimal, price: Decimal) -> Self {
        Self::new_with_time(
            symbol,
            side,
            OrderType::Limit,
            quantity,
            Some(price),
            Utc::now(),
        )
    }

    /// Client order id sent to the venue (alphanumeric, at most 32 chars)
    pub fn client_order_id(&self) -> String {
        self.id.simple().to_string()
    }

    /// Reason the order is malformed, if it is
    pub fn invalid_reason(&self) -> Option<&'static str> {
        if self.quantity <= Decimal::ZERO {
            return Some("quantity must be positive");
        }
        match (self.order_type, self.price) {
            (OrderType::Limit, None) => Some("limit order requires a price"),
            (_, Some(price)) if price <= Decimal::ZERO => Some("price must be positive"),
            _ => None,
        }
    }

    /// Notional value, valuing market orders at the given market price
    pub fn notional(&self, market_price: Decimal) -> Decimal {
        self.quantity * self.effective_price(market_price)
    }

    /// Limit price for limit orders, market price otherwise
    pub fn effective_price(&self, market_price: Decimal) -> Decimal {
        match self.order_type {
            OrderType::Limit => self.price.unwrap_or(market_price),
            OrderType::Market => market_price,
        }
    }

    /// Signed quantity: positive for buys, negative for sells
    pub fn signed_quantity(&self) -> Decimal {
        self.quantity * self.side.sign()
    }

    pub fn update_status(&mut self, status: OrderStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Record a (partial) fill, keeping a weighted average fill price
    pub fn update_fill(&mut self, quantity: Decimal, price: Decimal) {
        let previous = self.filled_quantity;
        self.filled_quantity += quantity;
        self.filled_price = match self.filled_price {
            Some(avg) if !self.filled_quantity.is_zero() => {
                Some((avg * previous + price * quantity) / self.filled_quantity)
            }
            _ => Some(price),
        };

        if self.filled_quantity >= self.quantity {
            self.status = OrderStatus::Filled;
        } else if self.filled_quantity > Decimal::ZERO {
            self.status = OrderStatus::Partial;
        }
        self.updated_at = Utc::now();
    }

    /// Returns remaining quantity to be filled
    pub fn remaining_quantity(&self) -> Decimal {
        (self.quantity - self.filled_quantity).max(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_update_fill_weighted_average() {
        let mut order = Order::limit("BTC-USDT", Side::Buy, dec!(2), dec!(100));

        order.update_fill(dec!(1), dec!(100));
        assert_eq!(order.status, OrderStatus::Partial);
        assert_eq!(order.remaining_quantity(), dec!(1));

        order.update_fill(dec!(1), dec!(110));
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_price, Some(dec!(105)));
        assert!(!order.status.can_cancel());
    }

    #[test]
    fn test_invalid_orders() {
        let order = Order::market("BTC-USDT", Side::Sell, dec!(0));
        assert_eq!(order.invalid_reason(), Some("quantity must be positive"));

        let mut order = Order::market("BTC-USDT", Side::Sell, dec!(1));
        order.order_type = OrderType::Limit;
        assert_eq!(order.invalid_reason(), Some("limit order requires a price"));
    }

    #[test]
    fn test_notional_uses_market_price_for_market_orders() {
        let order = Order::market("BTC-USDT", Side::Buy, dec!(0.5));
        assert_eq!(order.notional(dec!(200)), dec!(100));

        let order = Order::limit("BTC-USDT", Side::Buy, dec!(0.5), dec!(180));
        assert_eq!(order.notional(dec!(200)), dec!(90));
        assert_eq!(order.signed_quantity(), dec!(0.5));
    }
}
