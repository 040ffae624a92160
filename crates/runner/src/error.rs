//! Runtime errors

use meridian_core::StrategyStatus;
use meridian_ports::{ExecutionError, StoreError};
use meridian_risk_manager::RiskRejection;
use meridian_strategy::StrategyError;
use thiserror::Error;

/// Misuse of the lifecycle API, or a collaborator failing during a transition
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuntimeError {
    #[error("strategy is already running")]
    AlreadyRunning,

    #[error("strategy is not running")]
    NotRunning,

    #[error("cannot pause a strategy that is {0}")]
    CannotPause(StrategyStatus),

    #[error("state store: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// A trade intent that was refused; nothing was mutated
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TradeRejected {
    #[error("risk check failed: {0}")]
    Risk(#[from] RiskRejection),

    #[error("no market price for {0}")]
    NoPrice(String),

    #[error("quantity must be positive")]
    InvalidQuantity,

    #[error("execution failed: {0}")]
    Execution(#[from] ExecutionError),
}
