use super::{BusMessage, MessageBus, Subscription};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, info};

/// NATS configuration
#[derive(Clone, Debug, Deserialize)]
pub struct NatsConfig {
    #[serde(default = "default_url")]
    pub url: String,
    /// Connection name reported to the NATS server
    #[serde(default = "default_name")]
    pub name: String,
}

fn default_url() -> String {
    std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string())
}

fn default_name() -> String {
    "object-model".to_string()
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            name: default_name(),
        }
    }
}

/// Core NATS transport (no JetStream: the object set is never persisted)
#[derive(Clone)]
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    /// Connect to NATS
    pub async fn connect(config: &NatsConfig) -> Result<Self> {
        info!(url = %config.url, name = %config.name, "Connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .name(config.name.clone())
            .connect(config.url.as_str())
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS");
        Ok(Self { client })
    }
}

#[async_trait]
impl MessageBus for NatsBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<()> {
        debug!(subject = %subject, bytes = payload.len(), "Publishing to NATS");

        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .with_context(|| format!("Failed to publish to subject '{}'", subject))?;

        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> Result<Subscription> {
        let subscriber = self
            .client
            .subscribe(pattern.to_string())
            .await
            .with_context(|| format!("Failed to subscribe to '{}'", pattern))?;

        info!(pattern = %pattern, "Subscribed to NATS subject");

        let messages = subscriber.map(|msg| BusMessage {
            subject: msg.subject.to_string(),
            payload: msg.payload.to_vec(),
        });

        Ok(messages.boxed())
    }
}
