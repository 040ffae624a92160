use chrono::{Duration, TimeZone, Utc};
use meridian_core::Timestamp;
use meridian_ports::Clock;
use parking_lot::RwLock;

/// Clock that only moves when told to
pub struct ManualClock {
    now: RwLock<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Start at a given UTC wall time; falls back to the epoch for invalid input
    pub fn at_ymd_hms(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        let start = Utc
            .with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .unwrap_or_default();
        Self::new(start)
    }

    pub fn advance(&self, by: Duration) {
        *self.now.write() += by;
    }

    pub fn set(&self, to: Timestamp) {
        *self.now.write() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.read()
    }

    fn name(&self) -> &str {
        "ManualClock"
    }
}
