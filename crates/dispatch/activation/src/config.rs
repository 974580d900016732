//! Configuration for the dispatch activation layer

use dispatch_storage::{InMemoryKeyValueStore, KeyValueStore, StorageResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Complete dispatcher configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Activation engine tuning
    #[serde(default)]
    pub activation: ActivationConfig,

    /// Storage backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// In-process counters
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DispatchConfig {
    /// Load configuration: defaults, then an optional file, then
    /// environment variables such as `DISPATCH__ACTIVATION__BACKLOG_SLACK`.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DispatchConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("DISPATCH")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

/// Activation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationConfig {
    /// Extra backlog entries kept beyond the unit's input count
    #[serde(default = "default_backlog_slack")]
    pub backlog_slack: usize,

    /// Seed for match selection; entropy when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

impl ActivationConfig {
    /// Maximum backlog length for a unit requiring `input_count` inputs
    pub fn backlog_bound(&self, input_count: usize) -> usize {
        input_count + self.backlog_slack
    }
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            backlog_slack: default_backlog_slack(),
            rng_seed: None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (for development/testing)
    #[default]
    Memory,

    /// PostgreSQL storage
    Postgres {
        /// Connection URL
        url: String,

        /// Maximum connections in pool
        #[serde(default = "default_pool_size")]
        max_connections: u32,

        /// Connection timeout in seconds
        #[serde(default = "default_connection_timeout")]
        connect_timeout_secs: u64,
    },
}

/// Open the configured key/value backend.
pub async fn open_store(config: &StorageConfig) -> StorageResult<Arc<dyn KeyValueStore>> {
    match config {
        StorageConfig::Memory => Ok(Arc::new(InMemoryKeyValueStore::new())),
        #[cfg(feature = "postgres")]
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            let store = dispatch_storage::PostgresKeyValueStore::connect_with_options(
                url,
                *max_connections,
                *connect_timeout_secs,
            )
            .await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        StorageConfig::Postgres { .. } => Err(dispatch_storage::StorageError::Backend(
            "postgres storage requires the `postgres` feature".to_string(),
        )),
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Also keep per-destination counters
    #[serde(default = "default_true")]
    pub per_destination: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_destination: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_backlog_slack() -> usize {
    1
}

fn default_pool_size() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DispatchConfig::default();
        assert_eq!(config.activation.backlog_slack, 1);
        assert_eq!(config.activation.backlog_bound(2), 3);
        assert!(config.activation.rng_seed.is_none());
        assert!(matches!(config.storage, StorageConfig::Memory));
        assert!(config.telemetry.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = DispatchConfig::load(None).unwrap();
        assert_eq!(config.activation.backlog_slack, 1);
        assert!(matches!(config.storage, StorageConfig::Memory));
    }

    #[test]
    fn test_storage_config_from_json() {
        let config: StorageConfig = serde_json::from_value(serde_json::json!({
            "type": "postgres",
            "url": "postgres://localhost/dispatch"
        }))
        .unwrap();
        match config {
            StorageConfig::Postgres {
                max_connections,
                connect_timeout_secs,
                ..
            } => {
                assert_eq!(max_connections, 10);
                assert_eq!(connect_timeout_secs, 5);
            }
            StorageConfig::Memory => panic!("expected postgres"),
        }
    }

    #[tokio::test]
    async fn test_open_memory_store() {
        let store = open_store(&StorageConfig::Memory).await.unwrap();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }
}
