use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::Symbol;

/// Point-in-time view of a strategy's position in one instrument
///
/// `quantity` is signed: positive = long, negative = short. The average
/// price is only meaningful while the quantity is non-zero and is reset to
/// zero whenever the position goes flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: Decimal,
    pub avg_price: Decimal,
    pub leverage: u32,
    pub realized_pnl: Decimal,
    /// Derived from `avg_price`, `quantity` and the mark price at snapshot time
    pub unrealized_pnl: Decimal,
    pub margin: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// A flat position
    pub fn flat(symbol: impl Into<Symbol>) -> Self {
        Self {
            symbol: symbol.into(),
            quantity: Decimal::ZERO,
            avg_price: Decimal::ZERO,
            leverage: 1,
            realized_pnl: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            margin: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }

    pub fn is_long(&self) -> bool {
        self.quantity > Decimal::ZERO
    }

    pub fn is_short(&self) -> bool {
        self.quantity < Decimal::ZERO
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Notional value at the average entry price (always non-negative)
    pub fn position_value(&self) -> Decimal {
        self.quantity.abs() * self.avg_price
    }

    /// Signed notional at the average entry price
    pub fn signed_value(&self) -> Decimal {
        self.quantity * self.avg_price
    }

    /// Margin held divided by position notional; `None` while flat
    pub fn margin_ratio(&self) -> Option<Decimal> {
        let value = self.position_value();
        if value.is_zero() {
            None
        } else {
            Some(self.margin / value)
        }
    }

    /// Mark-to-market PnL on the open quantity
    pub fn unrealized_at(&self, mark_price: Decimal) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            (mark_price - self.avg_price) * self.quantity
        }
    }
}
