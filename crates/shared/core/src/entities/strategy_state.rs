use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Position;
use crate::values::Symbol;

/// Lifecycle status of a strategy instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyStatus {
    #[default]
    Stopped,
    Running,
    Paused,
    Error,
}

impl fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrategyStatus::Stopped => "stopped",
            StrategyStatus::Running => "running",
            StrategyStatus::Paused => "paused",
            StrategyStatus::Error => "error",
        })
    }
}

/// Persisted state of one (strategy, symbol) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyState {
    pub strategy_name: String,
    pub symbol: Symbol,
    pub position: Position,
    /// Cumulative realized PnL
    pub total_pnl: Decimal,
    pub total_commission: Decimal,
    pub status: StrategyStatus,
    pub last_error: Option<String>,
    pub last_run_time: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl StrategyState {
    /// Fresh state for a strategy that has never run
    pub fn new(strategy_name: impl Into<String>, symbol: impl Into<Symbol>) -> Self {
        let symbol = symbol.into();
        Self {
            strategy_name: strategy_name.into(),
            position: Position::flat(symbol.clone()),
            symbol,
            total_pnl: Decimal::ZERO,
            total_commission: Decimal::ZERO,
            status: StrategyStatus::Stopped,
            last_error: None,
            last_run_time: None,
            updated_at: Utc::now(),
        }
    }
}
