//! Meridian Runner - Strategy Runtime
//!
//! Hosts one strategy per symbol on top of the market cache and the
//! exchange client:
//!
//! - **Lifecycle**: pure state machine for start / stop / pause / fail
//! - **Runtime**: the supervised polling task, trade execution and fills
//! - **Events**: snapshots published to the broadcast fan-out
//! - **Store**: in-memory persistence of strategy state and trades
//! - **Paper**: immediate-fill executor for running without live orders
//!
//! ## Architecture
//!
//! ```text
//!   ┌────────────────┐  pushes  ┌──────────────────┐
//!   │ ExchangeClient │─────────►│ MarketDispatcher │──► MarketStateCache
//!   └──────┬─────────┘          └────────┬─────────┘
//!          │ orders                      │ account updates
//!          ▼                             ▼
//!   ┌──────────────┐  execute   ┌────────────────┐  events  ┌───────────┐
//!   │ OrderExecutor│◄───────────│ StrategyRuntime│─────────►│  Fan-out  │
//!   └──────────────┘            └────────┬───────┘          └───────────┘
//!                                        │ state, trades
//!                                        ▼
//!                                 ┌────────────┐
//!                                 │ StateStore │
//!                                 └────────────┘
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod paper;
pub mod runtime;
pub mod store;

pub use config::{
    AppConfig, ConfigError, RuntimeConfig, load_config, load_config_from_str, load_default_config,
};
pub use error::{RuntimeError, TradeRejected};
pub use events::{EventPublisher, RuntimeEvent, RuntimeEventKind, RuntimeSnapshot};
pub use lifecycle::{Effect, LifecycleEvent, Transition, transition};
pub use paper::PaperExecutor;
pub use runtime::{RuntimeDeps, StrategyRuntime, TradeOutcome};
pub use store::InMemoryStateStore;
