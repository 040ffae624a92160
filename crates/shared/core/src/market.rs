//! Market data value types
//!
//! Written only by the protocol client's dispatch path, read by everyone else.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::entities::Side;
use crate::values::Symbol;

/// A single price level in an order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub size: Decimal,
    /// Number of orders resting at this level
    pub order_count: u32,
}

impl BookLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self {
            price,
            size,
            order_count: 0,
        }
    }
}

/// Latest 24h ticker for an instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: Symbol,
    pub last: Decimal,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub open_24h: Decimal,
    pub high_24h: Decimal,
    pub low_24h: Decimal,
    pub volume_24h: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Ticker {
    /// Change since the 24h open, as a fraction
    pub fn change_24h(&self) -> Option<Decimal> {
        if self.open_24h.is_zero() {
            None
        } else {
            Some((self.last - self.open_24h) / self.open_24h)
        }
    }
}

/// A public trade print
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: Symbol,
    pub trade_id: String,
    pub price: Decimal,
    pub size: Decimal,
    pub side: Side,
    pub timestamp: DateTime<Utc>,
}

/// OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// False while the bar is still forming
    pub confirmed: bool,
}

/// Candle intervals supported by the venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CandleInterval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "3m")]
    ThreeMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1H")]
    OneHour,
    #[serde(rename = "2H")]
    TwoHours,
    #[serde(rename = "4H")]
    FourHours,
    #[serde(rename = "6H")]
    SixHours,
    #[serde(rename = "12H")]
    TwelveHours,
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "1W")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
}

impl CandleInterval {
    pub const ALL: [CandleInterval; 13] = [
        CandleInterval::OneMinute,
        CandleInterval::ThreeMinutes,
        CandleInterval::FiveMinutes,
        CandleInterval::FifteenMinutes,
        CandleInterval::ThirtyMinutes,
        CandleInterval::OneHour,
        CandleInterval::TwoHours,
        CandleInterval::FourHours,
        CandleInterval::SixHours,
        CandleInterval::TwelveHours,
        CandleInterval::OneDay,
        CandleInterval::OneWeek,
        CandleInterval::OneMonth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CandleInterval::OneMinute => "1m",
            CandleInterval::ThreeMinutes => "3m",
            CandleInterval::FiveMinutes => "5m",
            CandleInterval::FifteenMinutes => "15m",
            CandleInterval::ThirtyMinutes => "30m",
            CandleInterval::OneHour => "1H",
            CandleInterval::TwoHours => "2H",
            CandleInterval::FourHours => "4H",
            CandleInterval::SixHours => "6H",
            CandleInterval::TwelveHours => "12H",
            CandleInterval::OneDay => "1D",
            CandleInterval::OneWeek => "1W",
            CandleInterval::OneMonth => "1M",
        }
    }

    /// Channel name on the wire, e.g. `candle1m`
    pub fn channel(&self) -> String {
        format!("candle{}", self.as_str())
    }

    /// Parse the interval out of a `candle{interval}` channel name
    pub fn from_channel(channel: &str) -> Option<Self> {
        channel.strip_prefix("candle")?.parse().ok()
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an interval string the venue does not support
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownInterval(pub String);

impl fmt::Display for UnknownInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown candle interval: {}", self.0)
    }
}

impl std::error::Error for UnknownInterval {}

impl FromStr for CandleInterval {
    type Err = UnknownInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CandleInterval::ALL
            .iter()
            .find(|interval| interval.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownInterval(s.to_string()))
    }
}

/// Everything the cache knows about one symbol at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    /// Best bid first
    pub bids: Vec<BookLevel>,
    /// Best ask first
    pub asks: Vec<BookLevel>,
    pub ticker: Option<Ticker>,
    /// Oldest first
    pub recent_trades: Vec<Trade>,
    /// Oldest first per interval
    pub candles: BTreeMap<CandleInterval, Vec<Candle>>,
}

impl MarketSnapshot {
    pub fn empty(symbol: impl Into<Symbol>) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp: Utc::now(),
            bids: Vec::new(),
            asks: Vec::new(),
            ticker: None,
            recent_trades: Vec::new(),
            candles: BTreeMap::new(),
        }
    }

    /// Last traded price, falling back to the latest trade print
    pub fn last_price(&self) -> Option<Decimal> {
        self.ticker
            .as_ref()
            .map(|t| t.last)
            .or_else(|| self.recent_trades.last().map(|t| t.price))
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_interval_parsing_is_case_sensitive() {
        assert_eq!("1m".parse::<CandleInterval>(), Ok(CandleInterval::OneMinute));
        assert_eq!("1M".parse::<CandleInterval>(), Ok(CandleInterval::OneMonth));
        assert!("2m".parse::<CandleInterval>().is_err());
    }

    #[test]
    fn test_interval_channel_names() {
        assert_eq!(CandleInterval::FourHours.channel(), "candle4H");
        assert_eq!(
            CandleInterval::from_channel("candle15m"),
            Some(CandleInterval::FifteenMinutes)
        );
        assert_eq!(CandleInterval::from_channel("tickers"), None);
    }

    #[test]
    fn test_snapshot_last_price_falls_back_to_trades() {
        let mut snapshot = MarketSnapshot::empty("BTC-USDT");
        assert_eq!(snapshot.last_price(), None);

        snapshot.recent_trades.push(Trade {
            symbol: "BTC-USDT".to_string(),
            trade_id: "1".to_string(),
            price: dec!(42000.5),
            size: dec!(0.1),
            side: Side::Buy,
            timestamp: Utc::now(),
        });
        assert_eq!(snapshot.last_price(), Some(dec!(42000.5)));
    }
}
