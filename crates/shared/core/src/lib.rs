//! Meridian Core Domain
//!
//! Pure domain types for the Meridian trading system.
//! This crate contains no async, no I/O, and is 100% unit testable.
//!
//! Money is always [`rust_decimal::Decimal`]; nothing in the workspace does
//! price, quantity or PnL arithmetic in binary floating point.

pub mod entities;
pub mod market;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    Order, OrderId, OrderStatus, OrderType, Position, Side, StrategyState, StrategyStatus,
    TradeRecord,
};
pub use market::{
    BookLevel, Candle, CandleInterval, MarketSnapshot, Ticker, Trade, UnknownInterval,
};
pub use values::{Symbol, Timestamp};
