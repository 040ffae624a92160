//! Meridian Market State
//!
//! Keeps the latest market view for every subscribed instrument:
//! - Local order book replicas rebuilt from snapshots and deltas
//! - Bounded trade and candle buffers
//! - A dispatch handler that plugs into the protocol client
//!
//! ## Architecture
//!
//! ```text
//! ProtocolClient ──► MarketDispatcher ──┬──► MarketStateCache ──► snapshot()
//!                                       │
//!                                       └──► AccountUpdate (mpsc) ──► StrategyRuntime
//! ```

pub mod cache;
pub mod dispatch;
pub mod orderbook;

pub use cache::{MarketCacheConfig, MarketStateCache};
pub use dispatch::{AccountUpdate, MarketDispatcher};
pub use orderbook::LocalOrderBook;
