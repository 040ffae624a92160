//! Meridian Risk Manager
//!
//! Pure validation and capital accounting for a single strategy instance.
//! Nothing here performs I/O; every check is synchronous and returns a typed
//! refusal instead of panicking or mutating state.
//!
//! ## Checks
//!
//! ```text
//!            ┌──────────────────────────────────────────────┐
//! Order ───► │ check_order                                  │
//!            │   min/max order value                        │
//!            │   price deviation vs market (limit orders)   │
//!            │   position value after the order             │
//!            └──────────────────────────────────────────────┘
//!            ┌──────────────────────────────────────────────┐
//! Position ► │ check_position                               │
//!            │   leverage, margin ratio, position value     │
//!            └──────────────────────────────────────────────┘
//!            ┌──────────────────────────────────────────────┐
//! PnL ─────► │ update_pnl                                   │
//!            │   daily running total, reset on UTC day      │
//!            └──────────────────────────────────────────────┘
//! ```
//!
//! Capital accounting (`update_used_capital`) is explicit: the caller reports
//! used capital after each fill. The engine never reads the ledger itself.

pub mod engine;
pub mod error;
pub mod parameters;

// Re-export main types
pub use engine::{CapitalInfo, RiskEngine, RiskSnapshot};
pub use error::{RiskCheckType, RiskRejection};
pub use parameters::RiskLimit;
