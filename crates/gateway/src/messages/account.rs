//! Account pushes

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One currency line of an `account` push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    pub currency: String,
    pub cash_balance: Decimal,
    pub available_balance: Decimal,
    pub equity: Decimal,
    pub updated_at: DateTime<Utc>,
}
