//! Market State Cache
//!
//! Latest view of every subscribed instrument: book, ticker, recent trades
//! and candles per interval. Written only by the dispatch path, read by
//! strategies, the runtime and the fan-out.
//!
//! ```text
//! MarketDispatcher ──► apply_*() ──► DashMap<Symbol, SymbolState>
//!                                          │
//! Strategy / Runtime ◄── ticker(), snapshot(), candles() ◄┘
//! ```

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use meridian_core::{BookLevel, Candle, CandleInterval, MarketSnapshot, Symbol, Ticker, Trade};
use meridian_gateway::{BookUpdate, CandleUpdate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::orderbook::LocalOrderBook;

/// Buffer bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketCacheConfig {
    pub max_trades: usize,
    /// Per interval
    pub max_candles: usize,
    /// Per book side
    pub max_book_levels: usize,
}

impl Default for MarketCacheConfig {
    fn default() -> Self {
        Self {
            max_trades: 1000,
            max_candles: 1000,
            max_book_levels: 200,
        }
    }
}

struct SymbolState {
    book: LocalOrderBook,
    ticker: Option<Ticker>,
    trades: VecDeque<Trade>,
    candles: HashMap<CandleInterval, VecDeque<Candle>>,
    updated_at: DateTime<Utc>,
}

impl SymbolState {
    fn new(symbol: &str, config: &MarketCacheConfig) -> Self {
        Self {
            book: LocalOrderBook::new(symbol, config.max_book_levels),
            ticker: None,
            trades: VecDeque::new(),
            candles: HashMap::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Per-symbol market state, sharded so symbols never block each other
pub struct MarketStateCache {
    config: MarketCacheConfig,
    symbols: DashMap<Symbol, SymbolState>,
}

impl Default for MarketStateCache {
    fn default() -> Self {
        Self::new(MarketCacheConfig::default())
    }
}

impl MarketStateCache {
    pub fn new(config: MarketCacheConfig) -> Self {
        Self {
            config,
            symbols: DashMap::new(),
        }
    }

    pub fn config(&self) -> &MarketCacheConfig {
        &self.config
    }

    fn with_state<R>(&self, symbol: &str, f: impl FnOnce(&mut SymbolState) -> R) -> R {
        let mut entry = self
            .symbols
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolState::new(symbol, &self.config));
        entry.updated_at = Utc::now();
        f(&mut entry)
    }

    // === Writes ===

    pub fn apply_ticker(&self, ticker: Ticker) {
        let symbol = ticker.symbol.clone();
        self.with_state(&symbol, |state| state.ticker = Some(ticker));
    }

    pub fn apply_book(&self, update: &BookUpdate) {
        self.with_state(&update.symbol, |state| {
            state.book.apply(update);
        });
    }

    /// Append trade prints, evicting the oldest past the bound
    pub fn apply_trades(&self, trades: Vec<Trade>) {
        let max = self.config.max_trades;
        for trade in trades {
            let symbol = trade.symbol.clone();
            self.with_state(&symbol, |state| {
                state.trades.push_back(trade);
                while state.trades.len() > max {
                    state.trades.pop_front();
                }
            });
        }
    }

    /// Merge candles; a bar with the same open time as the newest replaces it
    pub fn apply_candles(&self, update: CandleUpdate) {
        let max = self.config.max_candles;
        self.with_state(&update.symbol, |state| {
            let series = state.candles.entry(update.interval).or_default();
            for candle in update.candles {
                match series.back().map(|c| c.timestamp) {
                    Some(newest) if newest >= candle.timestamp => {
                        // Forming bar update or late correction of an older bar
                        if let Some(existing) =
                            series.iter_mut().rev().find(|c| c.timestamp == candle.timestamp)
                        {
                            *existing = candle;
                        }
                    }
                    _ => series.push_back(candle),
                }
                while series.len() > max {
                    series.pop_front();
                }
            }
        });
    }

    // === Reads ===

    pub fn ticker(&self, symbol: &str) -> Option<Ticker> {
        self.symbols.get(symbol).and_then(|s| s.ticker.clone())
    }

    /// Ticker last price, falling back to the newest trade print
    pub fn last_price(&self, symbol: &str) -> Option<Decimal> {
        let state = self.symbols.get(symbol)?;
        state
            .ticker
            .as_ref()
            .map(|t| t.last)
            .or_else(|| state.trades.back().map(|t| t.price))
    }

    /// Best bid and best ask
    pub fn book_top(&self, symbol: &str) -> (Option<BookLevel>, Option<BookLevel>) {
        match self.symbols.get(symbol) {
            Some(state) => (state.book.best_bid(), state.book.best_ask()),
            None => (None, None),
        }
    }

    pub fn best_bid(&self, symbol: &str) -> Option<Decimal> {
        self.book_top(symbol).0.map(|l| l.price)
    }

    pub fn best_ask(&self, symbol: &str) -> Option<Decimal> {
        self.book_top(symbol).1.map(|l| l.price)
    }

    pub fn mid_price(&self, symbol: &str) -> Option<Decimal> {
        self.symbols.get(symbol).and_then(|s| s.book.mid_price())
    }

    /// Newest `n` trades, oldest first
    pub fn recent_trades(&self, symbol: &str, n: usize) -> Vec<Trade> {
        self.symbols
            .get(symbol)
            .map(|s| tail(&s.trades, n))
            .unwrap_or_default()
    }

    /// Newest `n` candles for an interval, oldest first
    pub fn candles(&self, symbol: &str, interval: CandleInterval, n: usize) -> Vec<Candle> {
        self.symbols
            .get(symbol)
            .and_then(|s| s.candles.get(&interval).map(|series| tail(series, n)))
            .unwrap_or_default()
    }

    pub fn latest_candle(&self, symbol: &str, interval: CandleInterval) -> Option<Candle> {
        self.symbols
            .get(symbol)
            .and_then(|s| s.candles.get(&interval).and_then(|c| c.back().cloned()))
    }

    /// Copy of everything held for `symbol`, book truncated to `depth` levels
    ///
    /// An unknown symbol yields an empty snapshot.
    pub fn snapshot(&self, symbol: &str, depth: usize) -> MarketSnapshot {
        let Some(state) = self.symbols.get(symbol) else {
            return MarketSnapshot::empty(symbol);
        };

        let candles: BTreeMap<_, _> = state
            .candles
            .iter()
            .map(|(interval, series)| (*interval, series.iter().cloned().collect()))
            .collect();

        MarketSnapshot {
            symbol: symbol.to_string(),
            timestamp: state.updated_at,
            bids: state.book.top_bids(depth),
            asks: state.book.top_asks(depth),
            ticker: state.ticker.clone(),
            recent_trades: state.trades.iter().cloned().collect(),
            candles,
        }
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.symbols.iter().map(|e| e.key().clone()).collect()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains_key(symbol)
    }
}

fn tail<T: Clone>(items: &VecDeque<T>, n: usize) -> Vec<T> {
    let skip = items.len().saturating_sub(n);
    items.iter().skip(skip).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::Side;
    use rust_decimal_macros::dec;

    fn trade(id: u32, price: Decimal) -> Trade {
        Trade {
            symbol: "BTC-USDT".into(),
            trade_id: id.to_string(),
            price,
            size: dec!(0.1),
            side: Side::Buy,
            timestamp: Utc::now(),
        }
    }

    fn candle(minute: i64, close: Decimal, confirmed: bool) -> Candle {
        Candle {
            timestamp: DateTime::from_timestamp(minute * 60, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
            confirmed,
        }
    }

    #[test]
    fn test_trade_buffer_is_bounded() {
        let cache = MarketStateCache::new(MarketCacheConfig {
            max_trades: 3,
            ..Default::default()
        });
        cache.apply_trades((1..=5).map(|i| trade(i, Decimal::from(i))).collect());

        let trades = cache.recent_trades("BTC-USDT", 10);
        assert_eq!(trades.len(), 3);
        assert_eq!(trades[0].trade_id, "3");
        assert_eq!(cache.recent_trades("BTC-USDT", 1)[0].trade_id, "5");
    }

    #[test]
    fn test_forming_candle_is_replaced() {
        let cache = MarketStateCache::default();
        let interval = CandleInterval::OneMinute;
        cache.apply_candles(CandleUpdate {
            symbol: "BTC-USDT".into(),
            interval,
            candles: vec![candle(1, dec!(100), true), candle(2, dec!(101), false)],
        });
        cache.apply_candles(CandleUpdate {
            symbol: "BTC-USDT".into(),
            interval,
            candles: vec![candle(2, dec!(102), true)],
        });

        let series = cache.candles("BTC-USDT", interval, 10);
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].close, dec!(102));
        assert!(series[1].confirmed);
    }

    #[test]
    fn test_candle_buffer_is_bounded() {
        let cache = MarketStateCache::new(MarketCacheConfig {
            max_candles: 2,
            ..Default::default()
        });
        cache.apply_candles(CandleUpdate {
            symbol: "BTC-USDT".into(),
            interval: CandleInterval::FiveMinutes,
            candles: (0..4).map(|m| candle(m * 5, Decimal::from(m), true)).collect(),
        });

        let series = cache.candles("BTC-USDT", CandleInterval::FiveMinutes, 10);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].close, dec!(2));
        assert!(cache.candles("BTC-USDT", CandleInterval::OneDay, 10).is_empty());
    }

    #[test]
    fn test_last_price_falls_back_to_trades() {
        let cache = MarketStateCache::default();
        assert_eq!(cache.last_price("BTC-USDT"), None);

        cache.apply_trades(vec![trade(1, dec!(50000))]);
        assert_eq!(cache.last_price("BTC-USDT"), Some(dec!(50000)));
    }

    #[test]
    fn test_unknown_symbol_snapshot_is_empty() {
        let cache = MarketStateCache::default();
        let snapshot = cache.snapshot("DOGE-USDT", 5);
        assert_eq!(snapshot.symbol, "DOGE-USDT");
        assert!(snapshot.bids.is_empty());
        assert!(snapshot.ticker.is_none());
        assert!(!cache.contains("DOGE-USDT"));
    }
}
