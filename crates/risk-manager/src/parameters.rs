//! Risk limits for one strategy instance

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Capital and exposure limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimit {
    /// Capital allotted to the strategy
    pub total_capital: Decimal,
    /// Fraction of total capital that may be deployed (0..=1)
    pub max_capital_usage: Decimal,
    /// Capital that is never deployed
    pub reserve_capital: Decimal,
    /// Maximum notional of the open position
    pub max_position_value: Decimal,
    pub max_leverage: u32,
    /// Minimum margin / position notional
    pub min_margin_ratio: Decimal,
    /// Daily loss (positive number) at which `update_pnl` starts failing
    pub max_daily_loss: Decimal,
    pub min_order_value: Decimal,
    pub max_order_value: Decimal,
    /// Maximum |limit price - market| / market for limit orders
    pub max_price_deviation: Decimal,
}

impl Default for RiskLimit {
    fn default() -> Self {
        Self {
            total_capital: dec!(10_000),
            max_capital_usage: dec!(0.8),
            reserve_capital: dec!(1_000),
            max_position_value: dec!(5_000),
            max_leverage: 3,
            min_margin_ratio: dec!(0.1),
            max_daily_loss: dec!(500),
            min_order_value: dec!(10),
            max_order_value: dec!(2_000),
            max_price_deviation: dec!(0.05),
        }
    }
}

impl RiskLimit {
    /// total × usage − reserve, never negative
    pub fn max_available_capital(&self) -> Decimal {
        (self.total_capital * self.max_capital_usage - self.reserve_capital).max(Decimal::ZERO)
    }

    /// min(max position value, max available capital)
    pub fn max_position_capital(&self) -> Decimal {
        self.max_position_value.min(self.max_available_capital())
    }

    /// Reason the limits are inconsistent, if they are
    pub fn invalid_reason(&self) -> Option<String> {
        if self.total_capital < Decimal::ZERO {
            return Some("total_capital must not be negative".to_string());
        }
        if self.max_capital_usage < Decimal::ZERO || self.max_capital_usage > Decimal::ONE {
            return Some("max_capital_usage must be within 0..=1".to_string());
        }
        if self.min_order_value > self.max_order_value {
            return Some(format!(
                "min_order_value {} exceeds max_order_value {}",
                self.min_order_value, self.max_order_value
            ));
        }
        if self.max_leverage == 0 {
            return Some("max_leverage must be at least 1".to_string());
        }
        None
    }
}
