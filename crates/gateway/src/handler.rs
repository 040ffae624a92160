//! Dispatch target for decoded pushes

use crate::config::Endpoint;
use crate::messages::InboundMessage;

/// Receives every decoded message, in arrival order, from the session task
///
/// Called inline on the receive path, so implementations must not block.
pub trait MessageHandler: Send + Sync + 'static {
    fn handle(&self, endpoint: Endpoint, message: InboundMessage);
}

impl<F> MessageHandler for F
where
    F: Fn(Endpoint, InboundMessage) + Send + Sync + 'static,
{
    fn handle(&self, endpoint: Endpoint, message: InboundMessage) {
        self(endpoint, message)
    }
}

/// Discards everything; for clients used only for requests
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreMessages;

impl MessageHandler for IgnoreMessages {
    fn handle(&self, endpoint: Endpoint, message: InboundMessage) {
        log::trace!("[ws:{}] ignored {:?}", endpoint, message);
    }
}
