//! Strategy Trait
//!
//! A strategy is a decision function: given the latest price and context it
//! returns a [`Decision`]. Sizing, risk checks and execution belong to the
//! runtime that drives it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meridian_core::{Position, Side};
use meridian_ports::RecommendedAction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::context::MarketContext;

/// Failure inside a decision function
///
/// The runtime treats any of these as fatal for the running task.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StrategyError {
    #[error("invalid strategy configuration: {0}")]
    InvalidConfig(String),

    #[error("strategy failed: {0}")]
    Failed(String),

    #[error("strategy panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    /// Side to trade, `None` for hold
    pub fn side(&self) -> Option<Side> {
        match self {
            Signal::Buy => Some(Side::Buy),
            Signal::Sell => Some(Side::Sell),
            Signal::Hold => None,
        }
    }
}

impl From<RecommendedAction> for Signal {
    fn from(action: RecommendedAction) -> Self {
        match action {
            RecommendedAction::Buy => Signal::Buy,
            RecommendedAction::Sell => Signal::Sell,
            RecommendedAction::Hold => Signal::Hold,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Signal::Buy => "buy",
            Signal::Sell => "sell",
            Signal::Hold => "hold",
        };
        write!(f, "{}", s)
    }
}

/// Output of one decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub signal: Signal,
    /// 0..=1; rule-based strategies report 1 for any signal
    pub confidence: Decimal,
    pub reason: String,
}

impl Decision {
    pub fn hold(reason: impl Into<String>) -> Self {
        Self {
            signal: Signal::Hold,
            confidence: Decimal::ZERO,
            reason: reason.into(),
        }
    }

    pub fn buy(confidence: Decimal, reason: impl Into<String>) -> Self {
        Self {
            signal: Signal::Buy,
            confidence,
            reason: reason.into(),
        }
    }

    pub fn sell(confidence: Decimal, reason: impl Into<String>) -> Self {
        Self {
            signal: Signal::Sell,
            confidence,
            reason: reason.into(),
        }
    }

    pub fn is_actionable(&self, min_confidence: Decimal) -> bool {
        self.signal != Signal::Hold && self.confidence >= min_confidence
    }
}

/// Everything a strategy sees on a tick
pub struct TickContext<'a> {
    pub symbol: &'a str,
    pub price: Decimal,
    pub now: DateTime<Utc>,
    pub position: &'a Position,
    pub market: &'a MarketContext,
}

/// Strategy trait - implement this for your decision rule
#[async_trait]
pub trait Strategy: Send {
    /// Strategy name for logging and persistence
    fn name(&self) -> &str;

    /// Called once each time the runtime enters Running
    async fn on_start(&mut self, _symbol: &str) -> Result<(), StrategyError> {
        Ok(())
    }

    /// Called on every tick with a fresh price
    async fn decide(&mut self, ctx: &TickContext<'_>) -> Result<Decision, StrategyError>;

    /// Called after the polling task has been torn down
    async fn on_stop(&mut self) -> Result<(), StrategyError> {
        Ok(())
    }
}
