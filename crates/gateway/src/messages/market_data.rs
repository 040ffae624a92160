//! Market data pushes

use chrono::{DateTime, Utc};
use meridian_core::{BookLevel, Candle, CandleInterval, Symbol};
use serde::{Deserialize, Serialize};

/// Whether a book push replaces the book or patches it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookAction {
    Snapshot,
    Update,
}

/// Order book push for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookUpdate {
    pub symbol: Symbol,
    pub action: BookAction,
    /// Changed bid levels (size 0 means remove the level)
    pub bids: Vec<BookLevel>,
    /// Changed ask levels (size 0 means remove the level)
    pub asks: Vec<BookLevel>,
    pub checksum: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

impl BookUpdate {
    pub fn is_snapshot(&self) -> bool {
        self.action == BookAction::Snapshot
    }
}

/// Candle push for one instrument and interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleUpdate {
    pub symbol: Symbol,
    pub interval: CandleInterval,
    pub candles: Vec<Candle>,
}
