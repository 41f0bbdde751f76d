//! In-process event bus used between the host runtime and its site adapters.
//!
//! Events are addressed by topic (`adapter:activated`, `tool:execution-completed`, ...).
//! Subscribers either take the raw broadcast stream or a [`TopicSubscription`]
//! restricted to the topics they care about.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{trace, warn};

use sitehook_core_types::SiteError;

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// Topic name the event is published under.
    fn topic(&self) -> &str;
}

#[async_trait]
pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    /// Publish an event, returning how many subscribers received it.
    async fn publish(&self, event: E) -> Result<usize, SiteError>;
    fn subscribe(&self) -> broadcast::Receiver<E>;

    fn subscribe_topics(&self, topics: &[&str]) -> TopicSubscription<E> {
        TopicSubscription::new(self.subscribe(), topics)
    }
}

/// Simple in-memory bus suitable for unit tests and single-process hosts.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<usize, SiteError> {
        let topic = event.topic().to_string();
        // A bus without listeners is not an error for fire-and-forget notifications.
        let delivered = self.sender.send(event).unwrap_or(0);
        trace!(topic = %topic, delivered, "event published");
        Ok(delivered)
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

/// Receiver that yields only events whose topic is in the requested set.
pub struct TopicSubscription<E>
where
    E: Event,
{
    receiver: broadcast::Receiver<E>,
    topics: Vec<String>,
}

impl<E> TopicSubscription<E>
where
    E: Event,
{
    pub fn new(receiver: broadcast::Receiver<E>, topics: &[&str]) -> Self {
        Self {
            receiver,
            topics: topics.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Wait for the next matching event. Returns `None` once the bus is gone.
    ///
    /// Lagging subscribers skip the overwritten events and keep going.
    pub async fn recv(&mut self) -> Option<E> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.topics.iter().any(|t| t == event.topic()) {
                        return Some(event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "topic subscription lagged; events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
