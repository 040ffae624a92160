use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AdvisoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendedAction {
    Buy,
    Sell,
    Hold,
}

/// Output of the advisory function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: RecommendedAction,
    /// 0..=1
    pub confidence: Decimal,
    pub reasoning: String,
    pub produced_at: Option<DateTime<Utc>>,
}

impl Recommendation {
    /// The safe answer used before any advice has been received
    pub fn hold() -> Self {
        Self {
            action: RecommendedAction::Hold,
            confidence: Decimal::ZERO,
            reasoning: "no analysis yet".to_string(),
            produced_at: None,
        }
    }
}

impl Default for Recommendation {
    fn default() -> Self {
        Self::hold()
    }
}

/// One observation in the recent market context handed to the advisor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub volume_24h: Decimal,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Option<Decimal>,
    pub candle_volume: Option<Decimal>,
}

/// Advisory collaborator: an opaque function of price and recent context
///
/// Callers wrap every call in a timeout; implementations may be slow.
#[async_trait]
pub trait Advisor: Send + Sync {
    async fn recommend(
        &self,
        current_price: Decimal,
        context: &[ContextEntry],
    ) -> Result<Recommendation, AdvisoryError>;
}
