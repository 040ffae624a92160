//! Wire message types
//!
//! Outbound control requests are `{"op": .., "args": [..]}` envelopes.
//! Inbound pushes are decoded by [`crate::parser`] into [`InboundMessage`].

pub mod account;
pub mod envelope;
pub mod market_data;
pub mod order;

pub use account::BalanceUpdate;
pub use envelope::{InboundMessage, OpRequest, Response};
pub use market_data::{BookAction, BookUpdate, CandleUpdate};
pub use order::{OrderRequest, OrderUpdate};
