//! Meridian Ports
//!
//! Port definitions (traits) for the Meridian trading system.
//! These define the boundaries between domain logic and infrastructure:
//!
//! - [`Clock`]: time source (system time in production, manual in tests)
//! - [`StateStore`]: persistence collaborator for strategy state and trades
//! - [`Advisor`]: opaque advisory function producing buy/sell/hold
//! - [`OrderExecutor`]: where validated orders go (paper or venue)

mod advisor;
mod clock;
mod error;
mod executor;
mod store;

pub use advisor::{Advisor, ContextEntry, Recommendation, RecommendedAction};
pub use clock::Clock;
pub use error::{AdvisoryError, ExecutionError, StoreError};
pub use executor::{Execution, OrderExecutor};
pub use store::StateStore;
