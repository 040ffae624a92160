//! Rolling market context handed to decision functions

use chrono::{DateTime, Utc};
use meridian_core::{Candle, Ticker};
use meridian_ports::ContextEntry;
use rust_decimal::Decimal;
use std::collections::VecDeque;

pub const DEFAULT_CONTEXT_LEN: usize = 10;

/// The most recent observations, oldest first
#[derive(Debug, Clone)]
pub struct MarketContext {
    entries: VecDeque<ContextEntry>,
    capacity: usize,
}

impl Default for MarketContext {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_LEN)
    }
}

impl MarketContext {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Record a tick's price with whatever ticker and candle data is cached
    pub fn observe(
        &mut self,
        now: DateTime<Utc>,
        price: Decimal,
        ticker: Option<&Ticker>,
        candle: Option<&Candle>,
    ) {
        self.push(ContextEntry {
            timestamp: now,
            price,
            volume_24h: ticker.map(|t| t.volume_24h).unwrap_or_default(),
            open: candle.map(|c| c.open),
            high: candle.map(|c| c.high),
            low: candle.map(|c| c.low),
            close: candle.map(|c| c.close),
            candle_volume: candle.map(|c| c.volume),
        });
    }

    pub fn push(&mut self, entry: ContextEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Contiguous copy for collaborators that take a slice
    pub fn entries(&self) -> Vec<ContextEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&ContextEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
