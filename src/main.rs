use anyhow::{Context, Result};
use object_model::bus::{MessageBus, NatsBus};
use object_model::config;
use object_model::ObjectServer;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "object_model=info".into()),
        )
        .init();

    info!("Object server starting...");

    let config = config::load_from_env().context("Failed to load configuration")?;

    info!(
        nats_url = %config.nats.url,
        publish_hz = config.server.publish_hz,
        verbose = config.server.verbose,
        "Configuration loaded"
    );

    // Transport failures at startup are fatal
    let bus: Arc<dyn MessageBus> = Arc::new(NatsBus::connect(&config.nats).await?);

    let server = Arc::new(ObjectServer::new(bus, config.server));
    let mut handle = Arc::clone(&server).start().await?;

    tokio::select! {
        result = &mut handle => {
            if let Err(e) = result {
                error!(error = %e, "Object server task failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            handle.abort();
        }
    }

    info!(objects = server.registry().len(), "Object server stopped");
    Ok(())
}
