//! Meridian Strategies
//!
//! Decision functions driven by the strategy runtime:
//! - [`Strategy`] trait: price and context in, [`Decision`] out
//! - [`MarketContext`]: the rolling window handed to advisors
//! - Built-in rule strategies (price change, moving average cross)
//! - [`AdvisoryStrategy`]: wraps an external advisor with a timeout and cache
//!
//! ## Architecture
//!
//! ```text
//!  MarketStateCache ──► price, ticker, candle
//!                              │
//!                              ▼
//!                       ┌──────────────┐
//!  MarketContext ──────►│   Strategy   │──► Decision { signal, confidence }
//!                       └──────────────┘            │
//!                                                   ▼
//!                                StrategyRuntime (sizing, risk, ledger)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meridian_strategy::{MaCrossConfig, StrategyConfig};
//!
//! let strategy = StrategyConfig::MaCross(MaCrossConfig::default()).build(None)?;
//! ```

pub mod advisory;
pub mod config;
pub mod context;
pub mod ma_cross;
pub mod price_change;
pub mod strategy;

pub use advisory::{AdvisoryConfig, AdvisoryStrategy};
pub use config::StrategyConfig;
pub use context::MarketContext;
pub use ma_cross::{MaCrossConfig, MaCrossStrategy};
pub use price_change::{PriceChangeConfig, PriceChangeStrategy};
pub use strategy::{Decision, Signal, Strategy, StrategyError, TickContext};
