//! Object client smoke test.
//!
//! Adds a table through the replica API and waits until the object server
//! broadcasts it back, then nudges it and exits.

use anyhow::{bail, Context, Result};
use object_model::bus::{MessageBus, NatsBus};
use object_model::{config, Object, ObjectClient, ObjectId, ObjectType};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "object_client=info,object_model=info".into()),
        )
        .init();

    info!("Object client starting...");

    let config = config::load_from_env().context("Failed to load configuration")?;

    let object_id: ObjectId = std::env::var("OBJECT_CLIENT_ID")
        .unwrap_or_else(|_| "10".to_string())
        .parse()
        .context("OBJECT_CLIENT_ID must be an integer")?;

    let wait_seconds: u64 = std::env::var("OBJECT_CLIENT_WAIT_SECONDS")
        .unwrap_or_else(|_| "30".to_string())
        .parse()
        .context("OBJECT_CLIENT_WAIT_SECONDS must be a number of seconds")?;

    let bus: Arc<dyn MessageBus> = Arc::new(NatsBus::connect(&config.nats).await?);
    let client = ObjectClient::connect(bus, config.replica).await?;

    let mut table = Object::new(ObjectType::Table, "Table");
    table.id = object_id;
    table.position = [1.0, 0.0, 0.0];
    table.bounding_box_min = [-1.0, -1.0, -1.0];
    table.bounding_box_max = [1.0, 1.0, 1.0];

    let id = client.add(table).await?;
    info!(id = id, "Added object to server");

    let mut found = None;
    for _ in 0..wait_seconds {
        tokio::time::sleep(Duration::from_secs(1)).await;
        found = client.get_by_id(id);
        if found.is_some() {
            break;
        }
    }

    let Some(object) = found else {
        bail!("Object {} did not appear in a snapshot within {}s", id, wait_seconds);
    };
    info!(id = object.id, label = %object.label, position = ?object.position, "Got object from server");

    if let Some(nearest) = client.get_nearest(0.0, 0.0, 0.0) {
        info!(id = nearest.id, distance = nearest.distance, "Nearest object to origin");
    }

    client.move_by_id(id, 0.5, 0.0, 0.0).await?;
    info!(id = id, "Requested move by (0.5, 0, 0)");

    Ok(())
}
