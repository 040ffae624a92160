//! Meridian Clock Infrastructure
//!
//! Two implementations of the [`Clock`] port:
//!
//! - [`SystemClock`]: wall-clock UTC for production
//! - [`ManualClock`]: frozen time that tests move forward explicitly, used to
//!   cross UTC day boundaries in risk tests without waiting for midnight
//!
//! ```ignore
//! use meridian_clock::{Clock, ManualClock};
//! use chrono::Duration;
//!
//! let clock = ManualClock::at_ymd_hms(2024, 3, 1, 23, 59, 0);
//! clock.advance(Duration::minutes(2)); // now 2024-03-02 00:01
//! ```

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use meridian_ports::Clock;
