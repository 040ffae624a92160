//! Scripted in-memory venue for protocol client tests

#![allow(dead_code)]

use async_trait::async_trait;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use futures::{SinkExt, StreamExt};
use meridian_gateway::{Connector, Frame, FrameSink, FrameStream, GatewayError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// The venue side of one accepted connection
pub struct ServerEnd {
    pub received: UnboundedReceiver<Frame>,
    pub push: UnboundedSender<Result<Frame, GatewayError>>,
}

impl ServerEnd {
    /// Next text frame from the client, skipping heartbeat pings
    pub async fn next_request(&mut self) -> serde_json::Value {
        loop {
            match self.received.next().await {
                Some(Frame::Text(text)) if text == "ping" => continue,
                Some(Frame::Text(text)) => return serde_json::from_str(&text).unwrap(),
                Some(_) => continue,
                None => panic!("client closed the connection"),
            }
        }
    }

    /// Next raw frame, including pings
    pub async fn next_frame(&mut self) -> Option<Frame> {
        self.received.next().await
    }

    pub fn send_text(&self, text: &str) {
        self.push.unbounded_send(Ok(Frame::text(text))).unwrap();
    }
}

pub struct MockConnector {
    accepted: mpsc::UnboundedSender<ServerEnd>,
    refuse: AtomicUsize,
    attempts: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            accepted: tx,
            refuse: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
        });
        (connector, rx)
    }

    /// Refuse the next `n` connection attempts
    pub fn refuse_next(&self, n: usize) {
        self.refuse.store(n, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &str) -> Result<(FrameSink, FrameStream), GatewayError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(GatewayError::Connection("connection refused".into()));
        }

        let (client_tx, server_rx) = unbounded::<Frame>();
        let (server_tx, client_rx) = unbounded::<Result<Frame, GatewayError>>();
        let _ = self.accepted.send(ServerEnd {
            received: server_rx,
            push: server_tx,
        });

        let sink = client_tx.sink_map_err(|e| GatewayError::Connection(e.to_string()));
        Ok((Box::pin(sink), Box::pin(client_rx)))
    }
}

pub fn ticker_push(symbol: &str, last: &str) -> String {
    format!(
        r#"{{"arg":{{"channel":"tickers","instId":"{0}"}},"data":[{{"instId":"{0}","last":"{1}","bidPx":"{1}","askPx":"{1}","open24h":"{1}","high24h":"{1}","low24h":"{1}","vol24h":"10","ts":"1700000000000"}}]}}"#,
        symbol, last
    )
}
