//! Subscription bookkeeping
//!
//! A subscription is identified by its canonical key: the channel followed by
//! the sorted `k=v` parameters, joined with `:`. The active set is what gets
//! replayed after a reconnect.

use meridian_core::CandleInterval;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::config::Endpoint;
use crate::error::{GatewayError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    channel: String,
    /// Sorted so the canonical key is order-independent
    params: BTreeMap<String, String>,
}

impl Subscription {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn ticker(inst_id: &str) -> Self {
        Self::new("tickers").param("instId", inst_id)
    }

    pub fn books(inst_id: &str) -> Self {
        Self::new("books").param("instId", inst_id)
    }

    pub fn trades(inst_id: &str) -> Self {
        Self::new("trades").param("instId", inst_id)
    }

    pub fn candles(inst_id: &str, interval: CandleInterval) -> Self {
        Self::new(interval.channel()).param("instId", inst_id)
    }

    /// Order updates for an instrument type (`SPOT`, `SWAP`, ...)
    pub fn orders(inst_type: &str) -> Self {
        Self::new("orders").param("instType", inst_type)
    }

    pub fn account(ccy: &str) -> Self {
        Self::new("account").param("ccy", ccy)
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// `channel:k1=v1:k2=v2` with parameters in key order
    pub fn key(&self) -> String {
        let mut key = self.channel.clone();
        for (k, v) in &self.params {
            key.push(':');
            key.push_str(k);
            key.push('=');
            key.push_str(v);
        }
        key
    }

    pub fn endpoint(&self) -> Option<Endpoint> {
        Endpoint::for_channel(&self.channel)
    }

    /// Reject malformed parameters before any I/O happens
    pub fn validate(&self) -> Result<()> {
        if self.channel.is_empty() {
            return Err(GatewayError::Validation("channel is empty".into()));
        }
        let endpoint = self.endpoint().ok_or_else(|| {
            GatewayError::Validation(format!("unknown channel '{}'", self.channel))
        })?;

        if endpoint == Endpoint::Business && CandleInterval::from_channel(&self.channel).is_none() {
            return Err(GatewayError::Validation(format!(
                "unknown candle interval in '{}'",
                self.channel
            )));
        }

        let required = match self.channel.as_str() {
            "orders" | "positions" => Some("instType"),
            "account" => Some("ccy"),
            "balance_and_position" => None,
            _ => Some("instId"),
        };
        if let Some(field) = required
            && self.get(field).is_none_or(str::is_empty)
        {
            return Err(GatewayError::Validation(format!(
                "channel '{}' requires '{}'",
                self.channel, field
            )));
        }
        Ok(())
    }

    /// The `args` entry sent on the wire
    pub fn to_arg(&self) -> Value {
        let mut arg = Map::new();
        arg.insert("channel".into(), Value::String(self.channel.clone()));
        for (k, v) in &self.params {
            arg.insert(k.clone(), Value::String(v.clone()));
        }
        Value::Object(arg)
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Active subscriptions keyed by canonical key
#[derive(Debug, Default, Clone)]
pub struct SubscriptionSet {
    entries: HashMap<String, Subscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if an equivalent subscription was already active
    pub fn insert(&mut self, subscription: Subscription) -> bool {
        let key = subscription.key();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, subscription);
        true
    }

    /// Returns false if nothing matching was active
    pub fn remove(&mut self, subscription: &Subscription) -> bool {
        self.entries.remove(&subscription.key()).is_some()
    }

    pub fn contains(&self, subscription: &Subscription) -> bool {
        self.entries.contains_key(&subscription.key())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.entries.values()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_order_independent() {
        let a = Subscription::new("orders")
            .param("instType", "SPOT")
            .param("instId", "BTC-USDT");
        let b = Subscription::new("orders")
            .param("instId", "BTC-USDT")
            .param("instType", "SPOT");
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key(), "orders:instId=BTC-USDT:instType=SPOT");
    }

    #[test]
    fn test_set_is_idempotent() {
        let mut set = SubscriptionSet::new();
        assert!(set.insert(Subscription::ticker("BTC-USDT")));
        assert!(!set.insert(Subscription::ticker("BTC-USDT")));
        assert_eq!(set.len(), 1);

        assert!(set.remove(&Subscription::ticker("BTC-USDT")));
        assert!(!set.remove(&Subscription::ticker("BTC-USDT")));
        assert!(set.is_empty());
    }

    #[test]
    fn test_validation() {
        assert!(Subscription::ticker("BTC-USDT").validate().is_ok());
        assert!(Subscription::candles("BTC-USDT", CandleInterval::OneHour).validate().is_ok());
        assert!(Subscription::orders("SPOT").validate().is_ok());

        let missing_inst = Subscription::new("tickers");
        assert!(matches!(missing_inst.validate(), Err(GatewayError::Validation(_))));

        let bad_interval = Subscription::new("candle7m").param("instId", "BTC-USDT");
        assert!(matches!(bad_interval.validate(), Err(GatewayError::Validation(_))));

        let no_ccy = Subscription::new("account");
        assert!(no_ccy.validate().is_err());

        assert!(Subscription::new("").validate().is_err());
        assert!(Subscription::new("mystery").param("instId", "X").validate().is_err());
    }

    #[test]
    fn test_wire_arg() {
        let arg = Subscription::books("ETH-USDT").to_arg();
        assert_eq!(arg["channel"], "books");
        assert_eq!(arg["instId"], "ETH-USDT");
    }
}
