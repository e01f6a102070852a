use super::{subject_matches, BusMessage, MessageBus, Subscription};
use anyhow::Result;
use async_trait::async_trait;
use futures::{future, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

const DEFAULT_CAPACITY: usize = 1024;

/// In-process message bus.
///
/// Every subscriber sees every matching message in publish order.
/// A subscriber that falls more than the channel capacity behind skips the
/// messages it missed.
#[derive(Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<BusMessage>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for LocalBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<()> {
        // No subscribers is fine
        let _ = self.tx.send(BusMessage {
            subject: subject.to_string(),
            payload,
        });
        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> Result<Subscription> {
        let pattern = pattern.to_string();

        let messages = BroadcastStream::new(self.tx.subscribe()).filter_map(move |item| {
            let message = match item {
                Ok(msg) if subject_matches(&pattern, &msg.subject) => Some(msg),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(pattern = %pattern, skipped = skipped, "Local subscriber lagged, skipped messages");
                    None
                }
            };
            future::ready(message)
        });

        Ok(messages.boxed())
    }
}
