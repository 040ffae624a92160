use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;
use crate::values::Symbol;

/// Append-only record of one filled buy or sell
///
/// Created by the position ledger on every fill and handed to the external
/// store; the core never mutates or deletes a record after creating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub trade_id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub commission: Decimal,
    pub realized_pnl: Decimal,
    pub timestamp: DateTime<Utc>,
    pub strategy_name: String,
}

impl TradeRecord {
    /// Notional value of the fill
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }
}
