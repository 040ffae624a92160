//! Delivery targets

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("subscriber is gone")]
    Closed,

    #[error("delivery failed: {0}")]
    Failed(String),
}

/// A subscriber endpoint; an error removes it from its topic
#[async_trait]
pub trait Sink<M>: Send + Sync + 'static {
    async fn deliver(&self, message: M) -> Result<(), SinkError>;
}

/// Delivers into a bounded tokio channel, for transport adapters
///
/// Never waits on the reader: while the channel is full new messages are
/// skipped, and only a closed channel is an error.
pub struct ChannelSink<M> {
    tx: mpsc::Sender<M>,
}

impl<M: Send + 'static> ChannelSink<M> {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<M>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn from_sender(tx: mpsc::Sender<M>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl<M: Send + 'static> Sink<M> for ChannelSink<M> {
    async fn deliver(&self, message: M) -> Result<(), SinkError> {
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                log::debug!("[fanout] channel sink full, message skipped");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(SinkError::Closed),
        }
    }
}
