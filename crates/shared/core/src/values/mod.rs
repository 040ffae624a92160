use chrono::{DateTime, Utc};

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Exchange instrument identifier, e.g. `BTC-USDT`
pub type Symbol = String;
