//! Client configuration
//!
//! Durations are stored as milliseconds so the struct round-trips through
//! the JSON config file unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{GatewayError, Result};

const LIVE_BASE: &str = "wss://ws.okx.com:8443/ws/v5";
const TESTNET_BASE: &str = "wss://wspap.okx.com:8443/ws/v5";
const TESTNET_SUFFIX: &str = "?brokerId=9999";

/// One of the venue's websocket endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// Tickers, books, trades
    Public,
    /// Orders, positions, account; requires login
    Private,
    /// Candles
    Business,
}

impl Endpoint {
    pub const ALL: [Endpoint; 3] = [Endpoint::Public, Endpoint::Private, Endpoint::Business];

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Public => "public",
            Endpoint::Private => "private",
            Endpoint::Business => "business",
        }
    }

    pub fn requires_login(&self) -> bool {
        matches!(self, Endpoint::Private)
    }

    /// Which endpoint serves a channel, `None` for channels we don't know
    pub fn for_channel(channel: &str) -> Option<Endpoint> {
        match channel {
            "tickers" | "books" | "books5" | "books50-l2-tbt" | "bbo-tbt" | "trades" => {
                Some(Endpoint::Public)
            }
            "orders" | "positions" | "account" | "balance_and_position" => Some(Endpoint::Private),
            c if c.starts_with("candle") => Some(Endpoint::Business),
            _ => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection and timing settings shared by every endpoint client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Use the demo-trading hosts
    pub testnet: bool,
    /// Overrides for the endpoint URLs (mostly for tests)
    pub public_url: Option<String>,
    pub private_url: Option<String>,
    pub business_url: Option<String>,
    pub heartbeat_interval_ms: u64,
    /// Silence tolerated after a ping before the link is declared dead
    pub heartbeat_grace_ms: u64,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub login_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub resubscribe_delay_ms: u64,
    pub outbound_queue: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            testnet: false,
            public_url: None,
            private_url: None,
            business_url: None,
            heartbeat_interval_ms: 25_000,
            heartbeat_grace_ms: 10_000,
            reconnect_delay_ms: 5_000,
            max_reconnect_attempts: 5,
            login_timeout_ms: 10_000,
            request_timeout_ms: 10_000,
            resubscribe_delay_ms: 100,
            outbound_queue: 256,
        }
    }
}

impl ClientConfig {
    pub fn testnet() -> Self {
        Self {
            testnet: true,
            ..Self::default()
        }
    }

    /// URL for an endpoint, honouring overrides and the testnet flag
    pub fn url(&self, endpoint: Endpoint) -> String {
        let explicit = match endpoint {
            Endpoint::Public => &self.public_url,
            Endpoint::Private => &self.private_url,
            Endpoint::Business => &self.business_url,
        };
        if let Some(url) = explicit {
            return url.clone();
        }
        if self.testnet {
            format!("{}/{}{}", TESTNET_BASE, endpoint.as_str(), TESTNET_SUFFIX)
        } else {
            format!("{}/{}", LIVE_BASE, endpoint.as_str())
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_grace(&self) -> Duration {
        Duration::from_millis(self.heartbeat_grace_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_millis(self.login_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn resubscribe_delay(&self) -> Duration {
        Duration::from_millis(self.resubscribe_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval_ms == 0 {
            return Err(GatewayError::Validation(
                "heartbeat_interval_ms must be positive".into(),
            ));
        }
        if self.heartbeat_grace_ms == 0 {
            return Err(GatewayError::Validation(
                "heartbeat_grace_ms must be positive".into(),
            ));
        }
        if self.outbound_queue == 0 {
            return Err(GatewayError::Validation(
                "outbound_queue must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// API credentials for the private endpoint
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
    pub passphrase: String,
}

impl Credentials {
    pub const API_KEY_VAR: &'static str = "OKX_API_KEY";
    pub const SECRET_KEY_VAR: &'static str = "OKX_SECRET_KEY";
    pub const PASSPHRASE_VAR: &'static str = "OKX_PASSPHRASE";

    pub fn new(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            passphrase: passphrase.into(),
        }
    }

    /// Read credentials from the environment
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| GatewayError::Validation(format!("{} is not set", name)))
        };
        Ok(Self::new(
            var(Self::API_KEY_VAR)?,
            var(Self::SECRET_KEY_VAR)?,
            var(Self::PASSPHRASE_VAR)?,
        ))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("secret_key", &"<redacted>")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}
