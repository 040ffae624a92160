//! Events published to the fan-out, one topic per symbol

use chrono::{DateTime, Utc};
use meridian_broadcast::BroadcastFanout;
use meridian_core::{MarketSnapshot, Position, StrategyStatus, TradeRecord};
use meridian_risk_manager::RiskSnapshot;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeEventKind {
    /// Exactly one per lifecycle transition
    StateChange,
    /// After every tick and every manual trade
    Update,
}

/// Full view of one strategy instance at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSnapshot {
    pub strategy_name: String,
    pub symbol: String,
    pub status: StrategyStatus,
    pub last_error: Option<String>,
    pub position: Position,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub total_commission: Decimal,
    pub risk: RiskSnapshot,
    pub market: MarketSnapshot,
    pub last_trade: Option<TradeRecord>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeEvent {
    pub kind: RuntimeEventKind,
    pub snapshot: RuntimeSnapshot,
}

impl RuntimeEvent {
    pub fn state_change(snapshot: RuntimeSnapshot) -> Self {
        Self {
            kind: RuntimeEventKind::StateChange,
            snapshot,
        }
    }

    pub fn update(snapshot: RuntimeSnapshot) -> Self {
        Self {
            kind: RuntimeEventKind::Update,
            snapshot,
        }
    }

    pub fn topic(&self) -> &str {
        &self.snapshot.symbol
    }
}

/// Where the runtime sends its events
///
/// Publishing never blocks the caller; delivery happens elsewhere.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: RuntimeEvent);
}

impl EventPublisher for BroadcastFanout<RuntimeEvent> {
    fn publish(&self, event: RuntimeEvent) {
        let topic = event.topic().to_string();
        BroadcastFanout::publish(self, &topic, event);
    }
}
