//! Risk Engine
//!
//! Validates orders and positions against a [`RiskLimit`], tracks the daily
//! PnL total (reset on the first update after the UTC date changes) and keeps
//! the used-capital figure reported by the owner.

use crate::error::{RiskCheckType, RiskRejection};
use crate::parameters::RiskLimit;
use chrono::NaiveDate;
use log::{info, warn};
use meridian_clock::SystemClock;
use meridian_core::{Order, OrderType, Position};
use meridian_ports::Clock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Capital figures derived from the limits and the reported used capital
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalInfo {
    pub total_capital: Decimal,
    pub max_available_capital: Decimal,
    pub used_capital: Decimal,
    pub remaining_capital: Decimal,
    /// Largest notional a single order may have right now
    pub max_single_trade: Decimal,
}

/// Everything the engine knows, for snapshots and broadcasts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub limits: RiskLimit,
    pub capital: CapitalInfo,
    pub daily_pnl: Decimal,
    pub last_reset: NaiveDate,
    pub daily_loss_breached: bool,
}

/// Pre-trade checks and capital accounting for one strategy instance
pub struct RiskEngine {
    limits: RiskLimit,
    clock: Arc<dyn Clock>,
    daily_pnl: Decimal,
    last_reset: NaiveDate,
    used_capital: Decimal,
}

impl RiskEngine {
    pub fn new(limits: RiskLimit) -> Self {
        Self::with_clock(limits, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(limits: RiskLimit, clock: Arc<dyn Clock>) -> Self {
        let last_reset = clock.now().date_naive();
        Self {
            limits,
            clock,
            daily_pnl: Decimal::ZERO,
            last_reset,
            used_capital: Decimal::ZERO,
        }
    }

    pub fn limits(&self) -> &RiskLimit {
        &self.limits
    }

    /// Validate an order before it is sent
    ///
    /// `position` is the current position in the order's symbol, if any.
    pub fn check_order(
        &self,
        order: &Order,
        position: Option<&Position>,
        market_price: Decimal,
    ) -> Result<(), RiskRejection> {
        let result = self.evaluate_order(order, position, market_price);
        if let Err(rejection) = &result {
            warn!(
                "[RISK REJECTED] {} {} {} @ {:?}: {}",
                order.symbol, order.side, order.quantity, order.price, rejection.reason
            );
        }
        result
    }

    fn evaluate_order(
        &self,
        order: &Order,
        position: Option<&Position>,
        market_price: Decimal,
    ) -> Result<(), RiskRejection> {
        if let Some(reason) = order.invalid_reason() {
            return Err(RiskRejection::new(RiskCheckType::InvalidOrder, reason));
        }
        if market_price <= Decimal::ZERO {
            return Err(RiskRejection::new(
                RiskCheckType::MarketPrice,
                format!("no valid market price for {}", order.symbol),
            ));
        }

        let order_value = order.notional(market_price);
        if order_value > self.limits.max_order_value {
            return Err(RiskRejection::limit(
                RiskCheckType::MaxOrderValue,
                format!(
                    "order value {} exceeds maximum {}",
                    order_value, self.limits.max_order_value
                ),
                order_value,
                self.limits.max_order_value,
            ));
        }
        if order_value < self.limits.min_order_value {
            return Err(RiskRejection::limit(
                RiskCheckType::MinOrderValue,
                format!(
                    "order value {} below minimum {}",
                    order_value, self.limits.min_order_value
                ),
                order_value,
                self.limits.min_order_value,
            ));
        }

        // Market orders carry no price of their own
        if order.order_type == OrderType::Limit
            && let Some(price) = order.price
        {
            let deviation = (price - market_price).abs() / market_price;
            if deviation > self.limits.max_price_deviation {
                return Err(RiskRejection::limit(
                    RiskCheckType::PriceDeviation,
                    format!(
                        "price {} deviates {:.4} from market {} (max {})",
                        price, deviation, market_price, self.limits.max_price_deviation
                    ),
                    deviation,
                    self.limits.max_price_deviation,
                ));
            }
        }

        let current_value = position.map(Position::signed_value).unwrap_or_default();
        let new_value = current_value + order_value * order.side.sign();
        if new_value.abs() > self.limits.max_position_value {
            return Err(RiskRejection::limit(
                RiskCheckType::PositionValue,
                format!(
                    "position value {} after order exceeds maximum {}",
                    new_value.abs(),
                    self.limits.max_position_value
                ),
                new_value.abs(),
                self.limits.max_position_value,
            ));
        }

        Ok(())
    }

    /// Validate an open position against leverage, margin and size limits
    pub fn check_position(&self, position: &Position) -> Result<(), RiskRejection> {
        if position.leverage > self.limits.max_leverage {
            return Err(RiskRejection::limit(
                RiskCheckType::Leverage,
                format!(
                    "leverage {} exceeds maximum {}",
                    position.leverage, self.limits.max_leverage
                ),
                Decimal::from(position.leverage),
                Decimal::from(self.limits.max_leverage),
            ));
        }

        if let Some(ratio) = position.margin_ratio()
            && ratio < self.limits.min_margin_ratio
        {
            return Err(RiskRejection::limit(
                RiskCheckType::MarginRatio,
                format!(
                    "margin ratio {:.4} below minimum {}",
                    ratio, self.limits.min_margin_ratio
                ),
                ratio,
                self.limits.min_margin_ratio,
            ));
        }

        let value = position.position_value();
        if value > self.limits.max_position_value {
            return Err(RiskRejection::limit(
                RiskCheckType::PositionValue,
                format!(
                    "position value {} exceeds maximum {}",
                    value, self.limits.max_position_value
                ),
                value,
                self.limits.max_position_value,
            ));
        }

        Ok(())
    }

    /// Add realized PnL to today's running total
    ///
    /// Fails once the day's loss exceeds `max_daily_loss`. The failure is a
    /// report only: the total is still updated and nothing is blocked here.
    pub fn update_pnl(&mut self, delta: Decimal) -> Result<(), RiskRejection> {
        self.roll_day();
        self.daily_pnl += delta;

        if self.daily_pnl < -self.limits.max_daily_loss {
            warn!(
                "[RISK] Daily loss limit breached: {} < -{}",
                self.daily_pnl, self.limits.max_daily_loss
            );
            return Err(RiskRejection::limit(
                RiskCheckType::DailyLossLimit,
                format!(
                    "daily loss {} exceeds limit {}",
                    -self.daily_pnl, self.limits.max_daily_loss
                ),
                -self.daily_pnl,
                self.limits.max_daily_loss,
            ));
        }
        Ok(())
    }

    fn roll_day(&mut self) {
        let today = self.clock.now().date_naive();
        if today > self.last_reset {
            info!(
                "[RISK] Daily reset ({} -> {}): PnL was {}",
                self.last_reset, today, self.daily_pnl
            );
            self.daily_pnl = Decimal::ZERO;
            self.last_reset = today;
        }
    }

    /// Record the capital currently tied up in positions
    pub fn update_used_capital(&mut self, value: Decimal) {
        self.used_capital = value.max(Decimal::ZERO);
    }

    pub fn used_capital(&self) -> Decimal {
        self.used_capital
    }

    pub fn daily_pnl(&self) -> Decimal {
        self.daily_pnl
    }

    pub fn capital_info(&self) -> CapitalInfo {
        let max_available_capital = self.limits.max_available_capital();
        let remaining_capital = (max_available_capital - self.used_capital).max(Decimal::ZERO);
        CapitalInfo {
            total_capital: self.limits.total_capital,
            max_available_capital,
            used_capital: self.used_capital,
            remaining_capital,
            max_single_trade: self.limits.max_order_value.min(remaining_capital),
        }
    }

    pub fn risk_snapshot(&self) -> RiskSnapshot {
        RiskSnapshot {
            limits: self.limits.clone(),
            capital: self.capital_info(),
            daily_pnl: self.daily_pnl,
            last_reset: self.last_reset,
            daily_loss_breached: self.daily_pnl < -self.limits.max_daily_loss,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use meridian_clock::ManualClock;
    use meridian_core::Side;
    use rust_decimal_macros::dec;

    fn engine() -> RiskEngine {
        RiskEngine::new(RiskLimit {
            min_order_value: dec!(100),
            max_order_value: dec!(10_000),
            max_position_value: dec!(50_000),
            max_price_deviation: dec!(0.05),
            ..Default::default()
        })
    }

    #[test]
    fn test_order_value_bounds() {
        let _ = env_logger::try_init();
        let engine = engine();
        let price = dec!(100);

        let order = Order::market("BTC-USDT", Side::Buy, dec!(0.5)); // 50
        let err = engine.check_order(&order, None, price).unwrap_err();
        assert_eq!(err.check, RiskCheckType::MinOrderValue);
        assert!(err.reason.contains("below minimum"));

        let order = Order::market("BTC-USDT", Side::Buy, dec!(150)); // 15_000
        let err = engine.check_order(&order, None, price).unwrap_err();
        assert_eq!(err.check, RiskCheckType::MaxOrderValue);
        assert!(err.reason.contains("exceeds maximum"));

        let order = Order::market("BTC-USDT", Side::Buy, dec!(5)); // 500
        assert!(engine.check_order(&order, None, price).is_ok());
    }

    #[test]
    fn test_order_value_boundaries_off_by_one() {
        let engine = engine();
        let price = dec!(1);

        for (value, accepted) in [
            (dec!(99), false),
            (dec!(100), true),
            (dec!(101), true),
            (dec!(9_999), true),
            (dec!(10_000), true),
            (dec!(10_001), false),
        ] {
            let order = Order::market("BTC-USDT", Side::Buy, value);
            assert_eq!(
                engine.check_order(&order, None, price).is_ok(),
                accepted,
                "order value {}",
                value
            );
        }
    }

    #[test]
    fn test_price_deviation_only_for_limit_orders() {
        let engine = engine();

        // 10% above market
        let order = Order::limit("BTC-USDT", Side::Buy, dec!(1), dec!(110));
        let err = engine.check_order(&order, None, dec!(100)).unwrap_err();
        assert_eq!(err.check, RiskCheckType::PriceDeviation);

        let order = Order::limit("BTC-USDT", Side::Buy, dec!(1), dec!(104));
        assert!(engine.check_order(&order, None, dec!(100)).is_ok());

        let order = Order::market("BTC-USDT", Side::Buy, dec!(1));
        assert!(engine.check_order(&order, None, dec!(100)).is_ok());
    }

    #[test]
    fn test_position_value_after_order() {
        let engine = engine();
        let mut position = Position::flat("BTC-USDT");
        position.quantity = dec!(4);
        position.avg_price = dec!(10_000); // 40_000 long

        let buy = Order::market("BTC-USDT", Side::Buy, dec!(0.9)); // +9_000 -> 49_000
        assert!(engine.check_order(&buy, Some(&position), dec!(10_000)).is_ok());

        let buy = Order::market("BTC-USDT", Side::Buy, dec!(1)); // +10_000 -> 50_000
        assert!(engine.check_order(&buy, Some(&position), dec!(10_000)).is_ok());

        position.quantity = dec!(4.5); // 45_000
        let buy = Order::market("BTC-USDT", Side::Buy, dec!(0.6)); // -> 51_000
        let err = engine
            .check_order(&buy, Some(&position), dec!(10_000))
            .unwrap_err();
        assert_eq!(err.check, RiskCheckType::PositionValue);

        let sell = Order::market("BTC-USDT", Side::Sell, dec!(0.6));
        assert!(engine.check_order(&sell, Some(&position), dec!(10_000)).is_ok());
    }

    #[test]
    fn test_reduction_still_over_cap_is_rejected() {
        let engine = engine();
        let mut position = Position::flat("BTC-USDT");
        position.quantity = dec!(6);
        position.avg_price = dec!(10_000); // 60_000 long, cap 50_000

        let sell = Order::market("BTC-USDT", Side::Sell, dec!(0.5)); // -> 55_000
        let err = engine
            .check_order(&sell, Some(&position), dec!(10_000))
            .unwrap_err();
        assert_eq!(err.check, RiskCheckType::PositionValue);

        let sell = Order::market("BTC-USDT", Side::Sell, dec!(1)); // -> 50_000
        assert!(engine.check_order(&sell, Some(&position), dec!(10_000)).is_ok());
    }

    #[test]
    fn test_short_exposure_counts_towards_position_value() {
        let engine = engine();
        let mut position = Position::flat("BTC-USDT");
        position.quantity = dec!(-4.5);
        position.avg_price = dec!(10_000);

        let sell = Order::market("BTC-USDT", Side::Sell, dec!(0.6));
        assert!(
            engine
                .check_order(&sell, Some(&position), dec!(10_000))
                .is_err()
        );
    }

    #[test]
    fn test_invalid_order_rejected_first() {
        let engine = engine();
        let order = Order::market("BTC-USDT", Side::Buy, dec!(-1));
        let err = engine.check_order(&order, None, dec!(100)).unwrap_err();
        assert_eq!(err.check, RiskCheckType::InvalidOrder);

        let order = Order::market("BTC-USDT", Side::Buy, dec!(1));
        let err = engine.check_order(&order, None, Decimal::ZERO).unwrap_err();
        assert_eq!(err.check, RiskCheckType::MarketPrice);
    }

    #[test]
    fn test_check_position() {
        let engine = RiskEngine::new(RiskLimit {
            max_leverage: 3,
            min_margin_ratio: dec!(0.2),
            max_position_value: dec!(1_000),
            ..Default::default()
        });

        let mut position = Position::flat("BTC-USDT");
        assert!(engine.check_position(&position).is_ok());

        position.quantity = dec!(1);
        position.avg_price = dec!(500);
        position.margin = dec!(500);
        assert!(engine.check_position(&position).is_ok());

        position.leverage = 5;
        let err = engine.check_position(&position).unwrap_err();
        assert_eq!(err.check, RiskCheckType::Leverage);

        position.leverage = 2;
        position.margin = dec!(50); // 10%
        let err = engine.check_position(&position).unwrap_err();
        assert_eq!(err.check, RiskCheckType::MarginRatio);

        position.margin = dec!(2_000);
        position.quantity = dec!(3); // 1_500
        let err = engine.check_position(&position).unwrap_err();
        assert_eq!(err.check, RiskCheckType::PositionValue);
    }

    #[test]
    fn test_daily_loss_reports_but_keeps_counting() {
        let mut engine = RiskEngine::new(RiskLimit {
            max_daily_loss: dec!(1_000),
            ..Default::default()
        });

        assert!(engine.update_pnl(dec!(-600)).is_ok());
        assert!(engine.update_pnl(dec!(-400)).is_ok()); // exactly at the cap
        let err = engine.update_pnl(dec!(-1)).unwrap_err();
        assert_eq!(err.check, RiskCheckType::DailyLossLimit);
        assert_eq!(engine.daily_pnl(), dec!(-1_001));
        assert!(engine.risk_snapshot().daily_loss_breached);

        // Gains bring it back under the cap
        assert!(engine.update_pnl(dec!(500)).is_ok());
    }

    #[test]
    fn test_daily_pnl_resets_on_utc_day_change() {
        let clock = Arc::new(ManualClock::at_ymd_hms(2024, 3, 1, 23, 58, 0));
        let mut engine = RiskEngine::with_clock(
            RiskLimit {
                max_daily_loss: dec!(100),
                ..Default::default()
            },
            clock.clone(),
        );

        assert!(engine.update_pnl(dec!(-150)).is_err());

        clock.advance(Duration::minutes(1));
        assert!(engine.update_pnl(dec!(-1)).is_err());

        clock.advance(Duration::minutes(5));
        assert!(engine.update_pnl(dec!(-20)).is_ok());
        assert_eq!(engine.daily_pnl(), dec!(-20));
        assert_eq!(engine.risk_snapshot().last_reset.to_string(), "2024-03-02");
    }

    #[test]
    fn test_capital_info() {
        let mut engine = RiskEngine::new(RiskLimit {
            total_capital: dec!(10_000),
            max_capital_usage: dec!(0.8),
            reserve_capital: dec!(1_000),
            max_order_value: dec!(2_000),
            ..Default::default()
        });

        let info = engine.capital_info();
        assert_eq!(info.max_available_capital, dec!(7_000));
        assert_eq!(info.remaining_capital, dec!(7_000));
        assert_eq!(info.max_single_trade, dec!(2_000));

        engine.update_used_capital(dec!(6_000));
        let info = engine.capital_info();
        assert_eq!(info.remaining_capital, dec!(1_000));
        assert_eq!(info.max_single_trade, dec!(1_000));

        engine.update_used_capital(dec!(9_000));
        assert_eq!(engine.capital_info().remaining_capital, Decimal::ZERO);
    }
}
