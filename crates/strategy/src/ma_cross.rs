//! Moving Average Cross Strategy
//!
//! Simple moving averages over tick prices. A golden cross (fast moves above
//! slow) is a buy, a death cross (fast moves below slow) is a sell.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::strategy::{Decision, Strategy, StrategyError, TickContext};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaCrossConfig {
    pub fast_period: usize,
    pub slow_period: usize,
}

impl Default for MaCrossConfig {
    fn default() -> Self {
        Self {
            fast_period: 5,
            slow_period: 20,
        }
    }
}

impl MaCrossConfig {
    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.fast_period == 0 || self.fast_period >= self.slow_period {
            return Err(StrategyError::InvalidConfig(format!(
                "fast period {} must be non-zero and below slow period {}",
                self.fast_period, self.slow_period
            )));
        }
        Ok(())
    }
}

pub struct MaCrossStrategy {
    config: MaCrossConfig,
    /// Newest last; holds slow_period + 1 prices so the previous averages are known
    prices: VecDeque<Decimal>,
}

impl MaCrossStrategy {
    pub fn new(config: MaCrossConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        Ok(Self {
            prices: VecDeque::with_capacity(config.slow_period + 1),
            config,
        })
    }

    /// Mean of `period` prices ending `offset` samples before the newest
    fn average(&self, period: usize, offset: usize) -> Option<Decimal> {
        let end = self.prices.len().checked_sub(offset)?;
        let start = end.checked_sub(period)?;
        let sum: Decimal = self.prices.range(start..end).sum();
        Some(sum / Decimal::from(period))
    }
}

#[async_trait]
impl Strategy for MaCrossStrategy {
    fn name(&self) -> &str {
        "ma-cross"
    }

    async fn on_start(&mut self, _symbol: &str) -> Result<(), StrategyError> {
        self.prices.clear();
        Ok(())
    }

    async fn decide(&mut self, ctx: &TickContext<'_>) -> Result<Decision, StrategyError> {
        self.prices.push_back(ctx.price);
        while self.prices.len() > self.config.slow_period + 1 {
            self.prices.pop_front();
        }

        let fast = self.config.fast_period;
        let slow = self.config.slow_period;
        let (Some(fast_now), Some(slow_now), Some(fast_prev), Some(slow_prev)) = (
            self.average(fast, 0),
            self.average(slow, 0),
            self.average(fast, 1),
            self.average(slow, 1),
        ) else {
            return Ok(Decision::hold("warming up"));
        };

        let decision = if fast_prev <= slow_prev && fast_now > slow_now {
            Decision::buy(
                Decimal::ONE,
                format!("golden cross fast={} slow={}", fast_now.round_dp(4), slow_now.round_dp(4)),
            )
        } else if fast_prev >= slow_prev && fast_now < slow_now {
            Decision::sell(
                Decimal::ONE,
                format!("death cross fast={} slow={}", fast_now.round_dp(4), slow_now.round_dp(4)),
            )
        } else {
            Decision::hold("no cross")
        };
        Ok(decision)
    }
}
