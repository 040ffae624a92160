//! Transport abstraction layer
//!
//! The protocol client never touches a socket directly: it asks a
//! [`Connector`] for a frame sink and a frame stream. The production
//! connector speaks websocket through tokio-tungstenite; tests plug in an
//! in-memory connector.

pub mod ws;

pub use ws::WsConnector;

use async_trait::async_trait;
use futures::{Sink, Stream};
use std::pin::Pin;

use crate::error::{GatewayError, Result};

/// One websocket frame, reduced to what the client cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// Ping/pong/binary. Carries no payload we use but still proves liveness.
    Control,
    Close,
}

impl Frame {
    pub fn text(text: impl Into<String>) -> Self {
        Frame::Text(text.into())
    }
}

pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = GatewayError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame>> + Send>>;

/// Opens a duplex connection to a URL
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Ensure the trait is object-safe
    fn _assert_object_safe(_: &dyn Connector) {}
}
