//! Meridian Order Manager
//!
//! Bookkeeping owned by a single strategy instance:
//! - **Position Ledger**: signed quantity, average entry price, realized PnL
//!   and commission, one [`TradeRecord`](meridian_core::TradeRecord) per fill
//! - **Order Tracker**: ephemeral orders between submission and final fill
//!
//! ## Flow
//!
//! ```text
//! Risk-approved Order ──► OrderTracker (Pending → Submitted)
//!                               │
//! Venue fills ──────────────────┤ update_fill (Partial → Filled)
//!                               ▼
//!                        PositionLedger::apply_fill ──► TradeRecord
//! ```
//!
//! All arithmetic is synchronous `Decimal` math; nothing here awaits.

pub mod ledger;
pub mod tracker;

// Re-export main types
pub use ledger::PositionLedger;
pub use tracker::{FillUpdate, OrderTracker};
