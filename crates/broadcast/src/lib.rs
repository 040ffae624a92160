//! Meridian Broadcast
//!
//! Delivers runtime and market updates to external subscribers, one topic
//! per symbol. Delivery is freshest-wins: a subscriber sees the newest
//! message of each batch window, never a backlog.

pub mod fanout;
pub mod sink;

pub use fanout::{BroadcastFanout, FanoutConfig, SubscriptionHandle};
pub use sink::{ChannelSink, Sink, SinkError};
