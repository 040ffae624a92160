//! Protocol client for one endpoint
//!
//! ```text
//!   subscribe / send ──► outbound queue ─────────────┐
//!                                                    ▼
//!   Connector ──► (sink, stream) ──► session task: select {
//!                                      inbound frame  → dispatch → MessageHandler
//!                                      outbound item  → sink
//!                                      heartbeat tick → "ping", arm silence deadline
//!                                      silence        → connection lost → reconnect
//!                                      shutdown       → close sink, exit
//!                                    }
//! ```
//!
//! The subscription set survives reconnects and is replayed, one request at a
//! time, every time a session becomes active. Any inbound frame counts as
//! liveness; `pong` is not matched against individual pings.

use chrono::Utc;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, sleep, sleep_until, timeout};

use crate::auth;
use crate::config::{ClientConfig, Credentials, Endpoint};
use crate::error::{GatewayError, Result};
use crate::handler::MessageHandler;
use crate::messages::{InboundMessage, OpRequest, Response};
use crate::parser::{self, Classified};
use crate::subscription::{Subscription, SubscriptionSet};
use crate::transport::{Connector, Frame, FrameSink, FrameStream};

/// Connection lifecycle notifications for the owner of a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Connected,
    Reconnecting { attempt: u32 },
    Reconnected,
    /// Reconnect attempts exhausted; the client is now idle
    ConnectionLost(String),
    /// Login refused during a reconnect; never retried
    AuthenticationFailed(String),
}

pub type EventSender = mpsc::UnboundedSender<(Endpoint, ClientEvent)>;

/// State shared between the client handle and its session task
#[derive(Default)]
struct Shared {
    subscriptions: Mutex<SubscriptionSet>,
    /// Present only while a session is active
    outbound: Mutex<Option<mpsc::Sender<String>>>,
    pending: DashMap<String, oneshot::Sender<Response>>,
    next_id: AtomicU64,
}

/// Everything the session task needs, cloned into it on connect
#[derive(Clone)]
struct Link {
    endpoint: Endpoint,
    url: String,
    config: ClientConfig,
    credentials: Option<Credentials>,
    connector: Arc<dyn Connector>,
    handler: Arc<dyn MessageHandler>,
    events: Option<EventSender>,
    shared: Arc<Shared>,
}

enum Exit {
    Shutdown,
    Lost(String),
}

struct Session {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct ProtocolClient {
    link: Link,
    session: tokio::sync::Mutex<Option<Session>>,
}

impl ProtocolClient {
    pub fn new(
        endpoint: Endpoint,
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        let url = config.url(endpoint);
        Self {
            link: Link {
                endpoint,
                url,
                config,
                credentials: None,
                connector,
                handler,
                events: None,
                shared: Arc::new(Shared {
                    next_id: AtomicU64::new(1),
                    ..Shared::default()
                }),
            },
            session: tokio::sync::Mutex::new(None),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.link.credentials = Some(credentials);
        self
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.link.events = Some(events);
        self
    }

    pub fn endpoint(&self) -> Endpoint {
        self.link.endpoint
    }

    pub fn url(&self) -> &str {
        &self.link.url
    }

    pub fn is_connected(&self) -> bool {
        self.link.shared.outbound.lock().is_some()
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.link.shared.subscriptions.lock().iter().cloned().collect()
    }

    /// Canonical keys of the active subscriptions
    pub fn subscription_keys(&self) -> HashSet<String> {
        self.link
            .shared
            .subscriptions
            .lock()
            .keys()
            .map(str::to_string)
            .collect()
    }

    /// Open the connection, log in if the endpoint needs it, and replay the
    /// subscription set
    ///
    /// A transport failure here is returned as `Connection`; automatic
    /// reconnection only applies once a session was established.
    pub async fn connect(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if let Some(existing) = session.as_ref() {
            if !existing.task.is_finished() {
                return Ok(());
            }
            if let Some(old) = session.take() {
                let _ = old.task.await;
            }
        }

        let link = self.link.clone();
        let (mut sink, stream) = link.establish().await.inspect_err(|e| {
            log::error!("[ws:{}] connect to {} failed: {}", link.endpoint, link.url, e);
        })?;
        let outbound = match link.activate(&mut sink).await {
            Ok(outbound) => outbound,
            Err(e) => {
                link.deactivate();
                return Err(e);
            }
        };

        log::info!("[ws:{}] connected to {}", link.endpoint, link.url);
        link.emit(ClientEvent::Connected);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(link.run(sink, stream, outbound, shutdown_rx));
        *session = Some(Session {
            shutdown: shutdown_tx,
            task,
        });
        Ok(())
    }

    /// Stop the session task, close the socket and forget all subscriptions
    ///
    /// Returns only after the session task has terminated.
    pub async fn disconnect(&self) {
        let mut session = self.session.lock().await;
        if let Some(session) = session.take() {
            let _ = session.shutdown.send(true);
            if let Err(e) = session.task.await {
                log::error!("[ws:{}] session task failed: {}", self.link.endpoint, e);
            }
        }
        self.link.deactivate();
        self.link.shared.subscriptions.lock().clear();
    }

    /// Idempotent by canonical key. While disconnected the subscription is
    /// recorded and sent on the next connect.
    pub async fn subscribe(&self, subscription: Subscription) -> Result<()> {
        self.check(&subscription)?;
        let sender = {
            let mut subscriptions = self.link.shared.subscriptions.lock();
            if !subscriptions.insert(subscription.clone()) {
                return Ok(());
            }
            self.link.shared.outbound.lock().clone()
        };
        log::info!("[ws:{}] subscribe {}", self.link.endpoint, subscription);
        if let Some(sender) = sender {
            let request = OpRequest::subscribe(subscription.to_arg()).to_json()?;
            if sender.send(request).await.is_err() {
                log::debug!(
                    "[ws:{}] session ended, {} will be replayed",
                    self.link.endpoint,
                    subscription
                );
            }
        }
        Ok(())
    }

    pub async fn unsubscribe(&self, subscription: &Subscription) -> Result<()> {
        self.check(subscription)?;
        let sender = {
            let mut subscriptions = self.link.shared.subscriptions.lock();
            if !subscriptions.remove(subscription) {
                return Ok(());
            }
            self.link.shared.outbound.lock().clone()
        };
        log::info!("[ws:{}] unsubscribe {}", self.link.endpoint, subscription);
        if let Some(sender) = sender {
            let request = OpRequest::unsubscribe(subscription.to_arg()).to_json()?;
            let _ = sender.send(request).await;
        }
        Ok(())
    }

    /// Send an id-tagged request and wait for the matching response
    pub async fn send(&self, op: &str, args: Vec<Value>) -> Result<Response> {
        let shared = &self.link.shared;
        let sender = shared
            .outbound
            .lock()
            .clone()
            .ok_or(GatewayError::NotConnected)?;

        let id = shared.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let request = OpRequest::new(op, args).with_id(id.clone()).to_json()?;
        let (tx, rx) = oneshot::channel();
        shared.pending.insert(id.clone(), tx);

        if sender.send(request).await.is_err() {
            shared.pending.remove(&id);
            return Err(GatewayError::ChannelClosed);
        }

        let response = match timeout(self.link.config.request_timeout(), rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(GatewayError::ChannelClosed),
            Err(_) => {
                shared.pending.remove(&id);
                return Err(GatewayError::Timeout(format!("{} response", op)));
            }
        };

        if !response.is_success() {
            return Err(GatewayError::Request {
                code: response.code,
                msg: response.msg,
            });
        }
        Ok(response)
    }

    fn check(&self, subscription: &Subscription) -> Result<()> {
        subscription.validate()?;
        match subscription.endpoint() {
            Some(endpoint) if endpoint == self.link.endpoint => Ok(()),
            _ => Err(GatewayError::Validation(format!(
                "channel '{}' is not served by the {} endpoint",
                subscription.channel(),
                self.link.endpoint
            ))),
        }
    }
}

impl Link {
    fn emit(&self, event: ClientEvent) {
        if let Some(events) = &self.events {
            let _ = events.send((self.endpoint, event));
        }
    }

    /// Connect and, for private endpoints, complete the login handshake
    async fn establish(&self) -> Result<(FrameSink, FrameStream)> {
        let (mut sink, mut stream) = self.connector.connect(&self.url).await?;
        if self.endpoint.requires_login() {
            let credentials = self.credentials.as_ref().ok_or_else(|| {
                GatewayError::Authentication("no credentials configured".into())
            })?;
            self.login(credentials, &mut sink, &mut stream).await?;
        }
        Ok((sink, stream))
    }

    async fn login(
        &self,
        credentials: &Credentials,
        sink: &mut FrameSink,
        stream: &mut FrameStream,
    ) -> Result<()> {
        let timestamp = Utc::now().timestamp().to_string();
        let request = auth::login_request(credentials, &timestamp)?;
        sink.send(Frame::Text(request.to_json()?)).await?;

        let acknowledged = async {
            while let Some(frame) = stream.next().await {
                let text = match frame {
                    Ok(Frame::Text(text)) => text,
                    Ok(Frame::Control) => continue,
                    Ok(Frame::Close) => break,
                    Err(e) => return Err(e),
                };
                match parser::classify(&text) {
                    Ok(Classified::Login { code, .. }) if code == "0" => return Ok(()),
                    Ok(Classified::Login { code, msg })
                    | Ok(Classified::Message(InboundMessage::Error { code, msg })) => {
                        return Err(GatewayError::Authentication(format!("{} {}", code, msg)));
                    }
                    Ok(_) => {}
                    Err(e) => log::warn!("[ws:{}] ignoring frame during login: {}", self.endpoint, e),
                }
            }
            Err(GatewayError::Connection("closed during login".into()))
        };

        match timeout(self.config.login_timeout(), acknowledged).await {
            Ok(result) => {
                if result.is_ok() {
                    log::info!("[ws:{}] logged in", self.endpoint);
                }
                result
            }
            Err(_) => Err(GatewayError::Authentication(format!(
                "login not acknowledged within {:?}",
                self.config.login_timeout()
            ))),
        }
    }

    /// Install a fresh outbound queue and replay the subscription set
    ///
    /// The snapshot and the queue are taken under the subscription lock, so
    /// a concurrent `subscribe` either lands in the snapshot or in the queue.
    async fn activate(&self, sink: &mut FrameSink) -> Result<mpsc::Receiver<String>> {
        let (tx, rx) = mpsc::channel(self.config.outbound_queue.max(1));
        let snapshot: Vec<Subscription> = {
            let subscriptions = self.shared.subscriptions.lock();
            *self.shared.outbound.lock() = Some(tx);
            subscriptions.iter().cloned().collect()
        };

        for (i, subscription) in snapshot.iter().enumerate() {
            if i > 0 {
                sleep(self.config.resubscribe_delay()).await;
            }
            let request = OpRequest::subscribe(subscription.to_arg()).to_json()?;
            sink.send(Frame::Text(request)).await?;
        }
        if !snapshot.is_empty() {
            log::info!(
                "[ws:{}] restored {} subscription(s)",
                self.endpoint,
                snapshot.len()
            );
        }
        Ok(rx)
    }

    /// Drop the outbound queue and fail every in-flight request
    fn deactivate(&self) {
        self.shared.outbound.lock().take();
        self.shared.pending.clear();
    }

    async fn run(
        self,
        mut sink: FrameSink,
        mut stream: FrameStream,
        mut outbound: mpsc::Receiver<String>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let reason = match self
                .drive(&mut sink, &mut stream, &mut outbound, &mut shutdown)
                .await
            {
                Exit::Shutdown => {
                    self.deactivate();
                    if let Err(e) = sink.close().await {
                        log::debug!("[ws:{}] close: {}", self.endpoint, e);
                    }
                    log::info!("[ws:{}] disconnected", self.endpoint);
                    return;
                }
                Exit::Lost(reason) => reason,
            };

            self.deactivate();
            log::warn!("[ws:{}] connection lost: {}", self.endpoint, reason);

            match self.reconnect(&reason, &mut shutdown).await {
                Some((new_sink, new_stream, new_outbound)) => {
                    sink = new_sink;
                    stream = new_stream;
                    outbound = new_outbound;
                    log::info!("[ws:{}] reconnected", self.endpoint);
                    self.emit(ClientEvent::Reconnected);
                }
                None => return,
            }
        }
    }

    async fn drive(
        &self,
        sink: &mut FrameSink,
        stream: &mut FrameStream,
        outbound: &mut mpsc::Receiver<String>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Exit {
        let interval = self.config.heartbeat_interval();
        let grace = self.config.heartbeat_grace();
        let mut heartbeat = tokio::time::interval_at(Instant::now() + interval, interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Armed by a ping, cleared by any inbound frame
        let mut deadline: Option<Instant> = None;

        loop {
            let silence = async move {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = shutdown.changed() => return Exit::Shutdown,

                frame = stream.next() => match frame {
                    Some(Ok(Frame::Text(text))) => {
                        deadline = None;
                        self.dispatch(&text);
                    }
                    Some(Ok(Frame::Control)) => deadline = None,
                    Some(Ok(Frame::Close)) | None => return Exit::Lost("closed by peer".into()),
                    Some(Err(e)) => return Exit::Lost(e.to_string()),
                },

                Some(request) = outbound.recv() => {
                    if let Err(e) = sink.send(Frame::Text(request)).await {
                        return Exit::Lost(e.to_string());
                    }
                }

                _ = heartbeat.tick() => {
                    if let Err(e) = sink.send(Frame::text("ping")).await {
                        return Exit::Lost(e.to_string());
                    }
                    if deadline.is_none() {
                        deadline = Some(Instant::now() + grace);
                    }
                }

                _ = silence => {
                    return Exit::Lost(format!("no traffic within {:?} of heartbeat", grace));
                }
            }
        }
    }

    /// Fixed delay, bounded attempts. `None` means the session is over.
    async fn reconnect(
        &self,
        reason: &str,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<(FrameSink, FrameStream, mpsc::Receiver<String>)> {
        let attempts = self.config.max_reconnect_attempts;
        for attempt in 1..=attempts {
            self.emit(ClientEvent::Reconnecting { attempt });
            log::info!(
                "[ws:{}] reconnect attempt {}/{} in {:?}",
                self.endpoint,
                attempt,
                attempts,
                self.config.reconnect_delay()
            );

            tokio::select! {
                _ = shutdown.changed() => return None,
                _ = sleep(self.config.reconnect_delay()) => {}
            }

            let established = tokio::select! {
                _ = shutdown.changed() => return None,
                established = self.establish() => established,
            };

            match established {
                Ok((mut sink, stream)) => match self.activate(&mut sink).await {
                    Ok(outbound) => return Some((sink, stream, outbound)),
                    Err(e) => {
                        self.deactivate();
                        log::warn!("[ws:{}] resubscribe failed: {}", self.endpoint, e);
                    }
                },
                Err(GatewayError::Authentication(msg)) => {
                    log::error!("[ws:{}] authentication failed: {}", self.endpoint, msg);
                    self.emit(ClientEvent::AuthenticationFailed(msg));
                    return None;
                }
                Err(e) => {
                    log::warn!("[ws:{}] attempt {} failed: {}", self.endpoint, attempt, e);
                }
            }
        }

        log::error!(
            "[ws:{}] giving up after {} reconnect attempts",
            self.endpoint,
            attempts
        );
        self.emit(ClientEvent::ConnectionLost(reason.to_string()));
        None
    }

    fn dispatch(&self, text: &str) {
        match parser::classify(text) {
            Ok(Classified::Pong) => log::trace!("[ws:{}] pong", self.endpoint),
            Ok(Classified::Login { code, .. }) => {
                log::debug!("[ws:{}] late login ack (code {})", self.endpoint, code)
            }
            Ok(Classified::Response(response)) => match self.shared.pending.remove(&response.id) {
                Some((_, waiter)) => {
                    let _ = waiter.send(response);
                }
                None => log::debug!(
                    "[ws:{}] response for unknown request {}",
                    self.endpoint,
                    response.id
                ),
            },
            Ok(Classified::Message(message)) => {
                if let InboundMessage::Error { code, msg } = &message {
                    log::warn!("[ws:{}] venue error {}: {}", self.endpoint, code, msg);
                }
                self.handler.handle(self.endpoint, message);
            }
            Err(e) => {
                let preview: String = text.chars().take(120).collect();
                log::warn!(
                    "[ws:{}] dropping malformed message ({}): {}",
                    self.endpoint,
                    e,
                    preview
                );
            }
        }
    }
}
