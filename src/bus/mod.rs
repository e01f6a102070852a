// Message bus abstraction: named-subject publish/subscribe

mod local;
mod nats;

pub use local::LocalBus;
pub use nats::{NatsBus, NatsConfig};

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// A message delivered from the bus
#[derive(Clone, Debug, PartialEq)]
pub struct BusMessage {
    /// Concrete subject the message was published on
    pub subject: String,
    pub payload: Vec<u8>,
}

/// Stream of messages matching a subscription pattern
pub type Subscription = BoxStream<'static, BusMessage>;

/// Publish/subscribe transport used by the object server and replicas.
///
/// Subjects are dot-separated tokens. Subscription patterns follow NATS
/// wildcard rules: `*` matches exactly one token and a trailing `>` matches
/// one or more tokens. Delivery order is FIFO per subject; nothing is
/// promised across subjects.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a payload without waiting for any consumer
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<()>;

    /// Subscribe to every subject matching `pattern`
    async fn subscribe(&self, pattern: &str) -> Result<Subscription>;
}

/// Check whether `subject` matches a NATS-style subscription `pattern`
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split('.');
    let mut subject_tokens = subject.split('.');

    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            (Some(">"), Some(_)) => return true,
            (Some("*"), Some(_)) => {}
            (Some(p), Some(s)) if p == s => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
