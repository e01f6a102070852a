use crate::bus::{BusMessage, MessageBus, Subscription};
use crate::config::ServerConfig;
use crate::object::ObjectSet;
use crate::protocol::{self, OBJECT_LIST_SUBJECT, OBJECT_UPDATES_PATTERN};
use crate::registry::ObjectRegistry;
use anyhow::{Context, Result};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// The aggregator process: merges object updates from every writer and
/// re-broadcasts the full registry at a fixed rate.
pub struct ObjectServer {
    registry: ObjectRegistry,
    bus: Arc<dyn MessageBus>,
    config: ServerConfig,
}

impl ObjectServer {
    pub fn new(bus: Arc<dyn MessageBus>, config: ServerConfig) -> Self {
        Self {
            registry: ObjectRegistry::with_verbose(config.verbose),
            bus,
            config,
        }
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// Publish the entire registry as a new snapshot.
    ///
    /// Runs unconditionally, even when nothing changed since the last tick,
    /// so late-joining replicas converge within one period.
    pub async fn tick(&self) -> Result<ObjectSet> {
        let snapshot = self.registry.snapshot();
        let payload = protocol::encode_object_set(&snapshot)?;

        let published = self.bus.publish(OBJECT_LIST_SUBJECT, payload).await;
        self.registry.stats().record_broadcast(published.is_ok());
        published?;

        Ok(snapshot)
    }

    /// Subscribe to update subjects and spawn the server loops.
    ///
    /// Subscription failure is a startup error. The returned task runs until
    /// the update subscription ends or the task is aborted.
    pub async fn start(self: Arc<Self>) -> Result<JoinHandle<()>> {
        self.config.validate()?;

        let updates = self
            .bus
            .subscribe(OBJECT_UPDATES_PATTERN)
            .await
            .context("Failed to subscribe to object updates")?;

        info!(
            publish_hz = self.config.publish_hz,
            pattern = OBJECT_UPDATES_PATTERN,
            "Object server started"
        );

        let server = self;
        Ok(tokio::spawn(async move {
            tokio::select! {
                _ = server.run_update_listener(updates) => {
                    warn!("Object update subscription ended");
                }
                _ = server.run_broadcast_loop() => {}
                _ = server.run_stats_logger() => {}
            }
        }))
    }

    async fn run_update_listener(&self, mut updates: Subscription) {
        while let Some(message) = updates.next().await {
            self.handle_update(&message);
        }
    }

    fn handle_update(&self, message: &BusMessage) {
        match protocol::decode_object_set(&message.payload) {
            Ok(delta) => {
                self.registry.on_delta(&delta);
            }
            Err(e) => {
                warn!(subject = %message.subject, error = %e, "Dropping undecodable object update");
            }
        }
    }

    async fn run_broadcast_loop(&self) {
        let mut ticker = interval(self.config.tick_period());

        // Skip missed ticks to prevent a burst of identical snapshots
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            // Not retried; the next tick publishes again
            if let Err(e) = self.tick().await {
                error!(error = %e, "Failed to publish object list");
            }
        }
    }

    async fn run_stats_logger(&self) {
        if self.config.stats_interval_seconds == 0 {
            return std::future::pending().await;
        }

        let mut ticker = interval(Duration::from_secs(self.config.stats_interval_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let stats = self.registry.stats().snapshot();
            info!(
                objects = self.registry.len(),
                inserted = stats.inserted,
                replaced = stats.replaced,
                stale = stats.stale,
                broadcasts = stats.broadcasts,
                failed_broadcasts = stats.failed_broadcasts,
                "Object server stats"
            );
        }
    }
}
