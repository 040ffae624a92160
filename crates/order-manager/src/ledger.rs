//! Position Ledger
//!
//! Tracks one strategy's position in one instrument. The part of a fill that
//! offsets the open position realizes PnL against the average entry price.
//! The average itself is always the notional-weighted blend of the prior
//! position and the signed fill, so partial reductions and flips move it too.

use chrono::{DateTime, Utc};
use meridian_core::{Position, Side, StrategyState, TradeRecord};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Position and PnL bookkeeping for a (strategy, symbol) pair
#[derive(Debug, Clone)]
pub struct PositionLedger {
    strategy_name: String,
    symbol: String,
    /// Current position quantity (positive=long, negative=short)
    quantity: Decimal,
    /// Average entry price, zero while flat
    avg_price: Decimal,
    realized_pnl: Decimal,
    total_commission: Decimal,
    leverage: u32,
    fill_count: u64,
    /// Total volume traded (absolute)
    volume: Decimal,
    last_update: Option<DateTime<Utc>>,
}

impl PositionLedger {
    pub fn new(strategy_name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            symbol: symbol.into(),
            quantity: Decimal::ZERO,
            avg_price: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            total_commission: Decimal::ZERO,
            leverage: 1,
            fill_count: 0,
            volume: Decimal::ZERO,
            last_update: None,
        }
    }

    /// Rebuild a ledger from persisted strategy state
    pub fn restore(state: &StrategyState) -> Self {
        let mut ledger = Self::new(state.strategy_name.clone(), state.symbol.clone());
        ledger.quantity = state.position.quantity;
        ledger.avg_price = if state.position.quantity.is_zero() {
            Decimal::ZERO
        } else {
            state.position.avg_price
        };
        ledger.realized_pnl = state.total_pnl;
        ledger.total_commission = state.total_commission;
        ledger.leverage = state.position.leverage.max(1);
        ledger.last_update = Some(state.position.updated_at);
        ledger
    }

    /// Apply a fill of `quantity` (> 0) at `price`
    ///
    /// Commission is `|price × quantity × commission_rate|`. Returns the
    /// record to append to the trade store.
    pub fn apply_fill(
        &mut self,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        commission_rate: Decimal,
    ) -> TradeRecord {
        let signed_qty = quantity * side.sign();
        let commission = (price * quantity * commission_rate).abs();

        let mut realized_pnl = Decimal::ZERO;

        // Calculate realized PnL if reducing position
        if (self.quantity > Decimal::ZERO && signed_qty < Decimal::ZERO)
            || (self.quantity < Decimal::ZERO && signed_qty > Decimal::ZERO)
        {
            let close_qty = quantity.min(self.quantity.abs());
            realized_pnl = if self.quantity > Decimal::ZERO {
                // Was long, selling
                (price - self.avg_price) * close_qty
            } else {
                // Was short, buying
                (self.avg_price - price) * close_qty
            };
        }

        let new_quantity = self.quantity + signed_qty;

        self.avg_price = if new_quantity.is_zero() {
            Decimal::ZERO
        } else {
            (self.avg_price * self.quantity + price * signed_qty) / new_quantity
        };

        let timestamp = Utc::now();
        self.quantity = new_quantity;
        self.realized_pnl += realized_pnl;
        self.total_commission += commission;
        self.fill_count += 1;
        self.volume += quantity;
        self.last_update = Some(timestamp);

        log::debug!(
            "[ledger:{}:{}] {} {} @ {} -> qty={} avg={} realized={}",
            self.strategy_name,
            self.symbol,
            side,
            quantity,
            price,
            self.quantity,
            self.avg_price,
            realized_pnl
        );

        TradeRecord {
            trade_id: Uuid::new_v4().to_string(),
            symbol: self.symbol.clone(),
            side,
            price,
            quantity,
            commission,
            realized_pnl,
            timestamp,
            strategy_name: self.strategy_name.clone(),
        }
    }

    /// Mark-to-market PnL on the open quantity
    pub fn unrealized_pnl(&self, mark_price: Decimal) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            (mark_price - self.avg_price) * self.quantity
        }
    }

    /// Realized PnL minus commission plus unrealized PnL at `mark_price`
    pub fn net_pnl(&self, mark_price: Decimal) -> Decimal {
        self.realized_pnl + self.unrealized_pnl(mark_price) - self.total_commission
    }

    /// |quantity| × average entry price
    pub fn position_value(&self) -> Decimal {
        self.quantity.abs() * self.avg_price
    }

    /// Snapshot with unrealized PnL derived at `mark_price` (entry price if unknown)
    pub fn position(&self, mark_price: Option<Decimal>) -> Position {
        let mark = mark_price.unwrap_or(self.avg_price);
        let leverage = Decimal::from(self.leverage.max(1));
        Position {
            symbol: self.symbol.clone(),
            quantity: self.quantity,
            avg_price: self.avg_price,
            leverage: self.leverage,
            realized_pnl: self.realized_pnl,
            unrealized_pnl: self.unrealized_pnl(mark),
            margin: self.position_value() / leverage,
            updated_at: self.last_update.unwrap_or_else(Utc::now),
        }
    }

    pub fn strategy_name(&self) -> &str {
        &self.strategy_name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn avg_price(&self) -> Decimal {
        self.avg_price
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn total_commission(&self) -> Decimal {
        self.total_commission
    }

    pub fn fill_count(&self) -> u64 {
        self.fill_count
    }

    pub fn volume(&self) -> Decimal {
        self.volume
    }
}
