//! Ephemeral order tracking
//!
//! Orders live here between submission and their final fill or
//! cancellation. Nothing in this module is persisted.

use meridian_core::{Order, OrderId, OrderStatus, Side};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// A fill attributed to a tracked order
#[derive(Debug, Clone, PartialEq)]
pub struct FillUpdate {
    pub order_id: OrderId,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub status: OrderStatus,
}

#[derive(Debug, Default)]
pub struct OrderTracker {
    orders: HashMap<OrderId, Order>,
    /// client order id -> order id
    by_client_id: HashMap<String, OrderId>,
}

impl OrderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an order that was handed to the venue
    pub fn track(&mut self, order: Order) {
        self.by_client_id.insert(order.client_order_id(), order.id);
        self.orders.insert(order.id, order);
    }

    pub fn get(&self, order_id: &OrderId) -> Option<&Order> {
        self.orders.get(order_id)
    }

    pub fn by_client_id(&self, client_order_id: &str) -> Option<&Order> {
        self.by_client_id
            .get(client_order_id)
            .and_then(|id| self.orders.get(id))
    }

    /// Record the venue's acknowledgement
    pub fn mark_submitted(&mut self, client_order_id: &str, exchange_order_id: &str) {
        if let Some(order) = self.lookup_mut(client_order_id) {
            order.exchange_order_id = Some(exchange_order_id.to_string());
            if order.status == OrderStatus::Pending {
                order.update_status(OrderStatus::Submitted);
            }
        }
    }

    /// Apply a fill reported by the venue
    ///
    /// Returns `None` for orders this tracker does not know. Fully filled
    /// orders are dropped from the tracker.
    pub fn apply_fill(
        &mut self,
        client_order_id: &str,
        quantity: Decimal,
        price: Decimal,
    ) -> Option<FillUpdate> {
        let order = self.lookup_mut(client_order_id)?;
        order.update_fill(quantity, price);
        let update = FillUpdate {
            order_id: order.id,
            side: order.side,
            quantity,
            price,
            status: order.status,
        };
        if update.status.is_terminal() {
            self.remove(client_order_id);
        }
        Some(update)
    }

    /// Venue-side cancellation or failure
    pub fn finish(&mut self, client_order_id: &str, status: OrderStatus) -> Option<Order> {
        let mut order = self.remove(client_order_id)?;
        order.update_status(status);
        Some(order)
    }

    pub fn active_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values().filter(|o| o.status.is_active())
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    fn lookup_mut(&mut self, client_order_id: &str) -> Option<&mut Order> {
        let id = self.by_client_id.get(client_order_id)?;
        self.orders.get_mut(id)
    }

    fn remove(&mut self, client_order_id: &str) -> Option<Order> {
        let id = self.by_client_id.remove(client_order_id)?;
        self.orders.remove(&id)
    }
}
