//! Strategy selection from configuration

use meridian_ports::Advisor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::advisory::{AdvisoryConfig, AdvisoryStrategy};
use crate::ma_cross::{MaCrossConfig, MaCrossStrategy};
use crate::price_change::{PriceChangeConfig, PriceChangeStrategy};
use crate::strategy::{Strategy, StrategyError};

/// Which decision function to run, with its parameters
///
/// ```json
/// { "kind": "ma_cross", "fast_period": 5, "slow_period": 20 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    PriceChange(PriceChangeConfig),
    MaCross(MaCrossConfig),
    Advisory(AdvisoryConfig),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::MaCross(MaCrossConfig::default())
    }
}

impl StrategyConfig {
    /// Default parameters for a kind name as accepted on the command line
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "price_change" | "price-change" => {
                Some(StrategyConfig::PriceChange(PriceChangeConfig::default()))
            }
            "ma_cross" | "ma-cross" => Some(StrategyConfig::MaCross(MaCrossConfig::default())),
            "advisory" => Some(StrategyConfig::Advisory(AdvisoryConfig::default())),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StrategyConfig::PriceChange(_) => "price_change",
            StrategyConfig::MaCross(_) => "ma_cross",
            StrategyConfig::Advisory(_) => "advisory",
        }
    }

    /// Whether `build` must be given an advisor
    pub fn needs_advisor(&self) -> bool {
        matches!(self, StrategyConfig::Advisory(_))
    }

    /// Construct the strategy; the advisory kind needs an advisor
    pub fn build(
        &self,
        advisor: Option<Arc<dyn Advisor>>,
    ) -> Result<Box<dyn Strategy>, StrategyError> {
        Ok(match self {
            StrategyConfig::PriceChange(config) => {
                Box::new(PriceChangeStrategy::new(config.clone())?)
            }
            StrategyConfig::MaCross(config) => Box::new(MaCrossStrategy::new(config.clone())?),
            StrategyConfig::Advisory(config) => {
                let advisor = advisor.ok_or_else(|| {
                    StrategyError::InvalidConfig("advisory strategy requires an advisor".into())
                })?;
                Box::new(AdvisoryStrategy::new(config.clone(), advisor)?)
            }
        })
    }
}
