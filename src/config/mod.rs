use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub use crate::bus::NatsConfig;
use crate::protocol::OBJECT_UPDATE_SUBJECT;

/// Complete object model configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectModelConfig {
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub replica: ReplicaConfig,
}

/// Object server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Snapshot broadcasts per second
    #[serde(default = "default_publish_hz")]
    pub publish_hz: f64,
    /// Log every merge decision at info level
    #[serde(default)]
    pub verbose: bool,
    /// How often to log merge/broadcast counters (0 disables)
    #[serde(default = "default_stats_interval")]
    pub stats_interval_seconds: u64,
}

fn default_publish_hz() -> f64 {
    20.0
}

fn default_stats_interval() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            publish_hz: default_publish_hz(),
            verbose: false,
            stats_interval_seconds: default_stats_interval(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.publish_hz.is_finite() || self.publish_hz <= 0.0 {
            bail!("publish_hz must be a positive number, got {}", self.publish_hz);
        }
        Ok(())
    }

    /// Time between snapshot broadcasts
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.publish_hz)
    }

    /// Override fields from env vars, ignoring unparsable values
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("OBJECT_SERVER_PUBLISH_HZ") {
            if let Ok(hz) = v.parse::<f64>() {
                self.publish_hz = hz;
            }
        }
        if let Ok(v) = std::env::var("OBJECT_SERVER_VERBOSE") {
            if let Ok(b) = v.parse::<bool>() {
                self.verbose = b;
            }
        }
    }
}

/// Replica (object client) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicaConfig {
    /// Objects farther than this are never returned by nearest-object queries
    #[serde(default = "default_search_radius")]
    pub search_radius: f64,
    /// Subject used for updates; any `objects.update.*` subject reaches the server
    #[serde(default = "default_update_subject")]
    pub update_subject: String,
}

fn default_search_radius() -> f64 {
    20.0
}

fn default_update_subject() -> String {
    OBJECT_UPDATE_SUBJECT.to_string()
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            search_radius: default_search_radius(),
            update_subject: default_update_subject(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &Path) -> Result<ObjectModelConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    let config: ObjectModelConfig =
        toml::from_str(&contents).context("Failed to parse config file")?;
    Ok(config)
}

/// Load from the file named by `OBJECT_MODEL_CONFIG`, or defaults when unset
pub fn load_from_env() -> Result<ObjectModelConfig> {
    let mut config = match std::env::var("OBJECT_MODEL_CONFIG") {
        Ok(path) => load_config(Path::new(&path))?,
        Err(_) => ObjectModelConfig::default(),
    };
    config.server.apply_env();
    Ok(config)
}
