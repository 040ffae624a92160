//! Error types for the gateway crate

use thiserror::Error;

/// Protocol client errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Transport failure. Drives reconnection; surfaced only once retries run out.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Login refused or not acknowledged in time. Never retried automatically.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Malformed subscription or request parameters
    #[error("Invalid request: {0}")]
    Validation(String),

    /// One inbound message could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Timeout waiting for {0}")]
    Timeout(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Not connected")]
    NotConnected,

    /// The venue answered a request with a non-zero code
    #[error("Request failed with code {code}: {msg}")]
    Request { code: String, msg: String },
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Parse(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for GatewayError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        GatewayError::Connection(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
