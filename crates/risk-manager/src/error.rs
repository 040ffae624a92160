//! Risk refusals

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCheckType {
    /// Malformed order parameters
    InvalidOrder,
    MarketPrice,
    MinOrderValue,
    MaxOrderValue,
    PriceDeviation,
    PositionValue,
    Leverage,
    MarginRatio,
    DailyLossLimit,
    Capital,
}

/// A refused order, position or PnL update
///
/// Returned synchronously to the caller; no state is mutated when a check
/// refuses.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{reason}")]
pub struct RiskRejection {
    pub check: RiskCheckType,
    pub reason: String,
    pub requested_value: String,
    pub limit_value: String,
}

impl RiskRejection {
    pub fn new(check: RiskCheckType, reason: impl Into<String>) -> Self {
        Self {
            check,
            reason: reason.into(),
            requested_value: String::new(),
            limit_value: String::new(),
        }
    }

    pub(crate) fn limit(
        check: RiskCheckType,
        reason: impl Into<String>,
        requested: Decimal,
        limit: Decimal,
    ) -> Self {
        Self {
            check,
            reason: reason.into(),
            requested_value: requested.to_string(),
            limit_value: limit.to_string(),
        }
    }
}
