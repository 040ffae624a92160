//! Broadcast Fan-out
//!
//! One queue and one worker per topic. The worker collects whatever arrives
//! within the batch window (or up to the batch size), keeps only the newest
//! message and delivers it to every subscriber of the topic.
//!
//! ```text
//! publish(topic) ──► queue ──► worker ──┬──► sink A
//!                              (latest) ├──► sink B     (global semaphore)
//!                                       └──► sink C
//! ```
//!
//! A sink that fails, or does not finish a delivery within the delivery
//! timeout, is dropped. When a topic has no sinks left its queue is closed and
//! its worker exits.

use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout, timeout_at};

use crate::sink::Sink;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    pub batch_window_ms: u64,
    pub max_batch_size: usize,
    /// Across all topics
    pub max_concurrent_deliveries: usize,
    /// Per sink and message
    pub delivery_timeout_ms: u64,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            batch_window_ms: 100,
            max_batch_size: 10,
            max_concurrent_deliveries: 100,
            delivery_timeout_ms: 5_000,
        }
    }
}

impl FanoutConfig {
    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

/// Returned by [`BroadcastFanout::subscribe`]; pass back to unsubscribe
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub topic: String,
    pub id: u64,
}

type SinkMap<M> = Arc<Mutex<HashMap<u64, Arc<dyn Sink<M>>>>>;
type TopicMap<M> = Arc<Mutex<HashMap<String, Topic<M>>>>;

struct Topic<M> {
    queue: mpsc::UnboundedSender<M>,
    sinks: SinkMap<M>,
    worker: JoinHandle<()>,
}

pub struct BroadcastFanout<M> {
    config: FanoutConfig,
    topics: TopicMap<M>,
    permits: Arc<Semaphore>,
    next_id: AtomicU64,
}

impl<M> Default for BroadcastFanout<M>
where
    M: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(FanoutConfig::default())
    }
}

impl<M> BroadcastFanout<M>
where
    M: Clone + Send + Sync + 'static,
{
    pub fn new(config: FanoutConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_deliveries.max(1)));
        Self {
            config,
            topics: Arc::new(Mutex::new(HashMap::new())),
            permits,
            next_id: AtomicU64::new(1),
        }
    }

    /// Add a sink to a topic, starting the topic's worker if needed
    pub fn subscribe(&self, topic: &str, sink: Arc<dyn Sink<M>>) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut topics = self.topics.lock();

        match topics.get(topic) {
            Some(existing) => {
                existing.sinks.lock().insert(id, sink);
            }
            None => {
                let sinks: SinkMap<M> = Arc::new(Mutex::new(HashMap::from([(id, sink)])));
                let (queue, rx) = mpsc::unbounded_channel();
                let worker = tokio::spawn(run_topic(
                    topic.to_string(),
                    rx,
                    sinks.clone(),
                    self.topics.clone(),
                    self.permits.clone(),
                    self.config.clone(),
                ));
                log::debug!("[fanout] topic {} started", topic);
                topics.insert(
                    topic.to_string(),
                    Topic {
                        queue,
                        sinks,
                        worker,
                    },
                );
            }
        }

        SubscriptionHandle {
            topic: topic.to_string(),
            id,
        }
    }

    /// Remove a sink; the last one out tears the topic down and waits for it
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let retired = {
            let mut topics = self.topics.lock();
            let Some(topic) = topics.get(&handle.topic) else {
                return false;
            };
            let (removed, empty) = {
                let mut sinks = topic.sinks.lock();
                (sinks.remove(&handle.id).is_some(), sinks.is_empty())
            };
            if !removed {
                return false;
            }
            if empty { topics.remove(&handle.topic) } else { None }
        };

        if let Some(topic) = retired {
            retire(&handle.topic, topic).await;
        }
        true
    }

    /// Queue a message; a topic without subscribers drops it
    pub fn publish(&self, topic: &str, message: M) -> bool {
        let topics = self.topics.lock();
        match topics.get(topic) {
            Some(entry) => entry.queue.send(message).is_ok(),
            None => {
                log::trace!("[fanout] no subscribers for {}", topic);
                false
            }
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .map(|t| t.sinks.lock().len())
            .unwrap_or(0)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.lock().len()
    }

    /// Close every topic and wait for all workers
    pub async fn shutdown(&self) {
        let drained: Vec<(String, Topic<M>)> = self.topics.lock().drain().collect();
        for (name, topic) in drained {
            retire(&name, topic).await;
        }
    }
}

async fn retire<M>(name: &str, topic: Topic<M>) {
    let Topic { queue, worker, .. } = topic;
    drop(queue);
    if let Err(e) = worker.await {
        log::error!("[fanout] worker for {} failed: {}", name, e);
    }
    log::debug!("[fanout] topic {} closed", name);
}

async fn run_topic<M>(
    name: String,
    mut rx: mpsc::UnboundedReceiver<M>,
    sinks: SinkMap<M>,
    topics: TopicMap<M>,
    permits: Arc<Semaphore>,
    config: FanoutConfig,
) where
    M: Clone + Send + Sync + 'static,
{
    let window = config.batch_window();
    let max_batch = config.max_batch_size.max(1);
    let delivery_timeout = config.delivery_timeout();

    while let Some(first) = rx.recv().await {
        let deadline = Instant::now() + window;
        let mut latest = first;
        let mut batched = 1;
        let mut closed = false;

        while batched < max_batch {
            match timeout_at(deadline, rx.recv()).await {
                Ok(Some(message)) => {
                    latest = message;
                    batched += 1;
                }
                Ok(None) => {
                    closed = true;
                    break;
                }
                Err(_) => break,
            }
        }
        if batched > 1 {
            log::trace!("[fanout] {} coalesced {} messages", name, batched);
        }

        let targets: Vec<(u64, Arc<dyn Sink<M>>)> = sinks
            .lock()
            .iter()
            .map(|(id, sink)| (*id, sink.clone()))
            .collect();

        let deliveries = targets.into_iter().map(|(id, sink)| {
            let message = latest.clone();
            let permits = permits.clone();
            async move {
                let Ok(_permit) = permits.acquire().await else {
                    return Some(id);
                };
                match timeout(delivery_timeout, sink.deliver(message)).await {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => {
                        log::warn!("[fanout] dropping subscriber {}: {}", id, e);
                        Some(id)
                    }
                    Err(_) => {
                        log::warn!(
                            "[fanout] dropping subscriber {}: no delivery within {:?}",
                            id,
                            delivery_timeout
                        );
                        Some(id)
                    }
                }
            }
        });
        let failed: Vec<u64> = join_all(deliveries).await.into_iter().flatten().collect();

        if !failed.is_empty() && remove_failed(&name, &failed, &sinks, &topics) {
            log::info!("[fanout] topic {} has no subscribers left", name);
            return;
        }
        if closed {
            return;
        }
    }
}

/// Drop failed sinks; true when this emptied the topic and it was removed
fn remove_failed<M>(name: &str, failed: &[u64], sinks: &SinkMap<M>, topics: &TopicMap<M>) -> bool {
    let mut topics = topics.lock();
    let mut current = sinks.lock();
    for id in failed {
        current.remove(id);
    }
    if !current.is_empty() {
        return false;
    }

    let owned = topics
        .get(name)
        .is_some_and(|t| Arc::ptr_eq(&t.sinks, sinks));
    if owned {
        // Dropping our own JoinHandle detaches this task, which is about to return
        topics.remove(name);
    }
    owned
}
