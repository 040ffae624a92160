//! Meridian Gateway
//!
//! Exchange protocol client. Provides:
//! - One [`ProtocolClient`] per websocket endpoint (public, private, business)
//! - Signed login, heartbeat-silence liveness, bounded fixed-delay reconnect
//! - An idempotent subscription set replayed after every (re)connect
//! - Typed dispatch of pushes to a [`MessageHandler`]
//! - Order placement through [`GatewayOrderExecutor`]
//!
//! ## Architecture
//!
//! ```text
//!        Venue (public / private / business)
//!               │  text frames
//!        ┌──────▼───────┐
//!        │  Connector   │  tokio-tungstenite, or in-memory in tests
//!        └──────┬───────┘
//!        ┌──────▼───────┐   subscribe / unsubscribe / send
//!        │ProtocolClient│◄──────────────────────────────
//!        └──────┬───────┘
//!               │ InboundMessage
//!        ┌──────▼───────┐
//!        │MessageHandler│  market cache, account updates
//!        └──────────────┘
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod exchange;
pub mod executor;
pub mod handler;
pub mod messages;
pub mod parser;
pub mod subscription;
pub mod transport;

// Re-export commonly used types
pub use client::{ClientEvent, EventSender, ProtocolClient};
pub use config::{ClientConfig, Credentials, Endpoint};
pub use error::{GatewayError, Result};
pub use exchange::ExchangeClient;
pub use executor::GatewayOrderExecutor;
pub use handler::{IgnoreMessages, MessageHandler};
pub use messages::{
    BalanceUpdate, BookAction, BookUpdate, CandleUpdate, InboundMessage, OpRequest, OrderRequest,
    OrderUpdate, Response,
};
pub use subscription::{Subscription, SubscriptionSet};
pub use transport::{Connector, Frame, FrameSink, FrameStream, WsConnector};
