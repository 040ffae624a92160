//! Local Order Book Replica
//!
//! Rebuilt from snapshots and patched by deltas pushed on the `books`
//! channels. Zero-size levels are removed, everything else is upserted, and
//! the book is trimmed to a fixed depth per side.

use chrono::{DateTime, Utc};
use meridian_core::BookLevel;
use meridian_gateway::BookUpdate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Order book for a single instrument
///
/// Uses BTreeMap for price levels to maintain sorted order.
/// Bids are read highest first, asks lowest first.
#[derive(Debug, Clone)]
pub struct LocalOrderBook {
    symbol: String,
    bids: BTreeMap<Decimal, BookLevel>,
    asks: BTreeMap<Decimal, BookLevel>,
    /// Levels kept per side
    max_depth: usize,
    /// Venue checksum from the last push
    checksum: Option<i64>,
    last_update: Option<DateTime<Utc>>,
}

impl LocalOrderBook {
    pub fn new(symbol: impl Into<String>, max_depth: usize) -> Self {
        Self {
            symbol: symbol.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            max_depth: max_depth.max(1),
            checksum: None,
            last_update: None,
        }
    }

    /// Apply a snapshot or delta; pushes for another symbol are ignored
    ///
    /// A delta received before any snapshot is applied to the empty book.
    pub fn apply(&mut self, update: &BookUpdate) -> bool {
        if update.symbol != self.symbol {
            return false;
        }

        if update.is_snapshot() {
            self.bids.clear();
            self.asks.clear();
        }
        Self::merge(&mut self.bids, &update.bids);
        Self::merge(&mut self.asks, &update.asks);
        self.trim();

        self.checksum = update.checksum;
        self.last_update = Some(update.timestamp);
        true
    }

    fn merge(side: &mut BTreeMap<Decimal, BookLevel>, levels: &[BookLevel]) {
        for level in levels {
            if level.size.is_zero() {
                side.remove(&level.price);
            } else {
                side.insert(level.price, *level);
            }
        }
    }

    /// Drop the levels furthest from the touch
    fn trim(&mut self) {
        while self.bids.len() > self.max_depth {
            self.bids.pop_first();
        }
        while self.asks.len() > self.max_depth {
            self.asks.pop_last();
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn checksum(&self) -> Option<i64> {
        self.checksum
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    // === Price Queries ===

    pub fn best_bid(&self) -> Option<BookLevel> {
        self.bids.values().next_back().copied()
    }

    pub fn best_ask(&self) -> Option<BookLevel> {
        self.asks.values().next().copied()
    }

    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / Decimal::TWO),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    // === Level Queries ===

    /// Top N bid levels (highest prices first)
    pub fn top_bids(&self, n: usize) -> Vec<BookLevel> {
        self.bids.values().rev().take(n).copied().collect()
    }

    /// Top N ask levels (lowest prices first)
    pub fn top_asks(&self, n: usize) -> Vec<BookLevel> {
        self.asks.values().take(n).copied().collect()
    }

    pub fn bid_size_at(&self, price: Decimal) -> Decimal {
        self.bids.get(&price).map(|l| l.size).unwrap_or(Decimal::ZERO)
    }

    pub fn ask_size_at(&self, price: Decimal) -> Decimal {
        self.asks.get(&price).map(|l| l.size).unwrap_or(Decimal::ZERO)
    }

    /// Number of (bid, ask) levels held
    pub fn depth(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    pub fn is_two_sided(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }
}
