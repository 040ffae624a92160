//! Price Change Strategy
//!
//! Compares the current price with the price one lookback period ago:
//! - Buys when the price rose by more than the threshold
//! - Sells when the price fell by more than the threshold
//! - Holds otherwise, and until a full lookback period has been observed

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::strategy::{Decision, Strategy, StrategyError, TickContext};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceChangeConfig {
    /// Fractional move that triggers a signal (0.01 = 1%)
    pub threshold: Decimal,
    pub lookback_secs: i64,
}

impl Default for PriceChangeConfig {
    fn default() -> Self {
        Self {
            threshold: dec!(0.01),
            lookback_secs: 60,
        }
    }
}

impl PriceChangeConfig {
    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.threshold <= Decimal::ZERO {
            return Err(StrategyError::InvalidConfig(
                "threshold must be positive".to_string(),
            ));
        }
        if self.lookback_secs <= 0 {
            return Err(StrategyError::InvalidConfig(
                "lookback_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct PriceChangeStrategy {
    config: PriceChangeConfig,
    /// (time, price) samples, oldest first
    history: VecDeque<(DateTime<Utc>, Decimal)>,
}

impl PriceChangeStrategy {
    pub fn new(config: PriceChangeConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        Ok(Self {
            config,
            history: VecDeque::new(),
        })
    }

    fn lookback(&self) -> Duration {
        Duration::seconds(self.config.lookback_secs)
    }

    /// Newest sample at least one lookback old; older samples are dropped
    fn reference_price(&mut self, now: DateTime<Utc>) -> Option<Decimal> {
        let cutoff = now - self.lookback();
        while self.history.len() > 1 && self.history[1].0 <= cutoff {
            self.history.pop_front();
        }
        self.history
            .front()
            .filter(|(at, _)| *at <= cutoff)
            .map(|(_, price)| *price)
    }
}

#[async_trait]
impl Strategy for PriceChangeStrategy {
    fn name(&self) -> &str {
        "price-change"
    }

    async fn on_start(&mut self, _symbol: &str) -> Result<(), StrategyError> {
        self.history.clear();
        Ok(())
    }

    async fn decide(&mut self, ctx: &TickContext<'_>) -> Result<Decision, StrategyError> {
        let reference = self.reference_price(ctx.now);
        self.history.push_back((ctx.now, ctx.price));

        let Some(reference) = reference else {
            return Ok(Decision::hold("warming up"));
        };
        if reference <= Decimal::ZERO {
            return Ok(Decision::hold("non-positive reference price"));
        }

        let change = (ctx.price - reference) / reference;
        let decision = if change > self.config.threshold {
            Decision::buy(Decimal::ONE, format!("price up {:.4}", change))
        } else if change < -self.config.threshold {
            Decision::sell(Decimal::ONE, format!("price down {:.4}", change))
        } else {
            Decision::hold(format!("change {:.4} within threshold", change))
        };
        Ok(decision)
    }
}
