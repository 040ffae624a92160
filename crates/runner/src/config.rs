//! Runtime and application configuration
//!
//! Loaded from JSON; every section has production defaults so a file only
//! needs the values it changes.

use meridian_broadcast::FanoutConfig;
use meridian_gateway::ClientConfig;
use meridian_market::MarketCacheConfig;
use meridian_risk_manager::RiskLimit;
use meridian_strategy::StrategyConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings for one strategy runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub tick_interval_ms: u64,
    pub commission_rate: Decimal,
    /// Quantity opened on each signal, before capital caps
    pub trade_quantity: Decimal,
    /// Signals below this confidence are ignored
    pub min_confidence: Decimal,
    pub min_trade_interval_secs: i64,
    /// Book levels per side in published snapshots
    pub snapshot_depth: usize,
    pub strategy: StrategyConfig,
    pub risk: RiskLimit,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            commission_rate: dec!(0.001),
            trade_quantity: dec!(0.01),
            min_confidence: dec!(0.8),
            min_trade_interval_secs: 30,
            snapshot_depth: 5,
            strategy: StrategyConfig::default(),
            risk: RiskLimit::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn min_trade_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.min_trade_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be positive".into()));
        }
        if self.trade_quantity <= Decimal::ZERO {
            return Err(ConfigError::Invalid("trade_quantity must be positive".into()));
        }
        if self.commission_rate < Decimal::ZERO {
            return Err(ConfigError::Invalid("commission_rate must not be negative".into()));
        }
        if self.min_confidence < Decimal::ZERO || self.min_confidence > Decimal::ONE {
            return Err(ConfigError::Invalid("min_confidence must be within 0..=1".into()));
        }
        if let Some(reason) = self.risk.invalid_reason() {
            return Err(ConfigError::Invalid(reason));
        }
        Ok(())
    }
}

/// Everything the `meridian` binary needs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub symbol: String,
    pub client: ClientConfig,
    pub market: MarketCacheConfig,
    pub fanout: FanoutConfig,
    pub runtime: RuntimeConfig,
    /// Route orders to the venue instead of the paper executor
    pub live_execution: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC-USDT".to_string(),
            client: ClientConfig::default(),
            market: MarketCacheConfig::default(),
            fanout: FanoutConfig::default(),
            runtime: RuntimeConfig::default(),
            live_execution: false,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.is_empty() {
            return Err(ConfigError::Invalid("symbol must not be empty".into()));
        }
        self.client
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.runtime.validate()
    }
}

/// Load configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Load configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = serde_json::from_str(json)?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<AppConfig, ConfigError> {
    load_config_from_str(include_str!("../config/default.json"))
}
