//! In-memory persistence
//!
//! Stands in for the external state store in the binary and in tests.

use async_trait::async_trait;
use dashmap::DashMap;
use meridian_core::{StrategyState, TradeRecord};
use meridian_ports::{StateStore, StoreError};
use parking_lot::RwLock;

#[derive(Default)]
pub struct InMemoryStateStore {
    /// Keyed by (strategy name, symbol)
    states: DashMap<(String, String), StrategyState>,
    trades: RwLock<Vec<TradeRecord>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a state row, as if persisted by an earlier run
    pub fn insert_state(&self, state: StrategyState) {
        self.states
            .insert((state.strategy_name.clone(), state.symbol.clone()), state);
    }

    pub fn state(&self, strategy_name: &str, symbol: &str) -> Option<StrategyState> {
        self.states
            .get(&(strategy_name.to_string(), symbol.to_string()))
            .map(|s| s.clone())
    }

    pub fn trades(&self) -> Vec<TradeRecord> {
        self.trades.read().clone()
    }

    pub fn trade_count(&self) -> usize {
        self.trades.read().len()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load_strategy_state(
        &self,
        strategy_name: &str,
        symbol: &str,
    ) -> Result<Option<StrategyState>, StoreError> {
        Ok(self.state(strategy_name, symbol))
    }

    async fn save_strategy_state(&self, state: &StrategyState) -> Result<(), StoreError> {
        self.insert_state(state.clone());
        Ok(())
    }

    async fn append_trade_record(&self, record: &TradeRecord) -> Result<(), StoreError> {
        self.trades.write().push(record.clone());
        Ok(())
    }
}
