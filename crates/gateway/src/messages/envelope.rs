//! Request/response envelopes and the typed inbound message

use meridian_core::{Ticker, Trade};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{BalanceUpdate, BookUpdate, CandleUpdate, OrderUpdate};
use crate::error::Result;

/// Client -> server control message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub op: String,
    pub args: Vec<Value>,
}

impl OpRequest {
    pub fn new(op: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            id: None,
            op: op.into(),
            args,
        }
    }

    pub fn subscribe(arg: Value) -> Self {
        Self::new("subscribe", vec![arg])
    }

    pub fn unsubscribe(arg: Value) -> Self {
        Self::new("unsubscribe", vec![arg])
    }

    /// Attach a correlation id; the venue echoes it in the response
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Server answer to an [`OpRequest`] that carried an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    #[serde(default)]
    pub op: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Vec<Value>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        self.code == "0"
    }
}

/// A decoded message routed to the [`crate::MessageHandler`]
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Ticker(Ticker),
    Book(BookUpdate),
    Trades(Vec<Trade>),
    Candles(CandleUpdate),
    Orders(Vec<OrderUpdate>),
    Balances(Vec<BalanceUpdate>),
    /// Subscribe/unsubscribe acknowledgement
    SubscriptionAck {
        event: String,
        channel: String,
        inst_id: Option<String>,
    },
    /// `{"event":"error"}` from the venue
    Error { code: String, msg: String },
}

impl InboundMessage {
    /// Instrument the message belongs to, if it is instrument-scoped
    pub fn symbol(&self) -> Option<&str> {
        match self {
            InboundMessage::Ticker(t) => Some(&t.symbol),
            InboundMessage::Book(b) => Some(&b.symbol),
            InboundMessage::Trades(trades) => trades.first().map(|t| t.symbol.as_str()),
            InboundMessage::Candles(c) => Some(&c.symbol),
            InboundMessage::SubscriptionAck { inst_id, .. } => inst_id.as_deref(),
            _ => None,
        }
    }
}
