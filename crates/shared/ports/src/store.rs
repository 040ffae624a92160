use async_trait::async_trait;
use meridian_core::{StrategyState, TradeRecord};

use crate::error::StoreError;

/// Persistence collaborator for the strategy runtime
///
/// Schema and query mechanics live behind this trait. One state row exists
/// per (strategy, symbol); trade records are append-only.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load_strategy_state(
        &self,
        strategy_name: &str,
        symbol: &str,
    ) -> Result<Option<StrategyState>, StoreError>;

    async fn save_strategy_state(&self, state: &StrategyState) -> Result<(), StoreError>;

    async fn append_trade_record(&self, record: &TradeRecord) -> Result<(), StoreError>;
}
