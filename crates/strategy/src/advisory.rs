//! Advisory Strategy
//!
//! Delegates the decision to an external [`Advisor`]. The advisor is asked
//! at most once per analysis interval and every call is bounded by a timeout;
//! between calls, and whenever a call fails or times out, the last good
//! recommendation is reused. Before any advice arrives the answer is Hold
//! with zero confidence.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use meridian_ports::{Advisor, Recommendation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::strategy::{Decision, Strategy, StrategyError, TickContext};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryConfig {
    /// Minimum time between advisor calls
    pub analysis_interval_secs: i64,
    pub timeout_ms: u64,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            analysis_interval_secs: 30,
            timeout_ms: 10_000,
        }
    }
}

pub struct AdvisoryStrategy {
    config: AdvisoryConfig,
    advisor: Arc<dyn Advisor>,
    cached: Recommendation,
    last_analysis: Option<DateTime<Utc>>,
}

impl AdvisoryStrategy {
    pub fn new(config: AdvisoryConfig, advisor: Arc<dyn Advisor>) -> Result<Self, StrategyError> {
        if config.timeout_ms == 0 {
            return Err(StrategyError::InvalidConfig(
                "advisory timeout must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            config,
            advisor,
            cached: Recommendation::hold(),
            last_analysis: None,
        })
    }

    /// Last good recommendation
    pub fn cached(&self) -> &Recommendation {
        &self.cached
    }

    fn due(&self, now: DateTime<Utc>) -> bool {
        match self.last_analysis {
            Some(at) => now - at >= Duration::seconds(self.config.analysis_interval_secs),
            None => true,
        }
    }

    async fn refresh(&mut self, ctx: &TickContext<'_>) {
        self.last_analysis = Some(ctx.now);
        let context = ctx.market.entries();
        let timeout = std::time::Duration::from_millis(self.config.timeout_ms);

        match tokio::time::timeout(timeout, self.advisor.recommend(ctx.price, &context)).await {
            Ok(Ok(recommendation)) => {
                log::info!(
                    "[advisory:{}] {:?} confidence={} {}",
                    ctx.symbol,
                    recommendation.action,
                    recommendation.confidence,
                    recommendation.reasoning
                );
                self.cached = Recommendation {
                    produced_at: recommendation.produced_at.or(Some(ctx.now)),
                    ..recommendation
                };
            }
            Ok(Err(e)) => {
                log::warn!("[advisory:{}] advisor failed, using cached: {}", ctx.symbol, e);
            }
            Err(_) => {
                log::warn!(
                    "[advisory:{}] advisor timed out after {}ms, using cached",
                    ctx.symbol,
                    self.config.timeout_ms
                );
            }
        }
    }
}

#[async_trait]
impl Strategy for AdvisoryStrategy {
    fn name(&self) -> &str {
        "advisory"
    }

    async fn decide(&mut self, ctx: &TickContext<'_>) -> Result<Decision, StrategyError> {
        if self.due(ctx.now) {
            self.refresh(ctx).await;
        }

        Ok(Decision {
            signal: self.cached.action.into(),
            confidence: self.cached.confidence,
            reason: self.cached.reasoning.clone(),
        })
    }
}
