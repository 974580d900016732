//! Telemetry and logging setup for the activation engine

use crate::config::{LoggingConfig, TelemetryConfig};
use crate::engine::ActivationStrategy;
use dispatch_types::UnitId;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const ACTIVATIONS_ATTEMPTED: &str = "activations_attempted";
pub const ACTIVATIONS_SUCCEEDED: &str = "activations_succeeded";
pub const CACHE_HITS: &str = "binding_cache_hits";
pub const SEARCHES: &str = "combinatorial_searches";
pub const SEARCH_MATCHES: &str = "combinatorial_search_matches";
pub const BINDINGS_LEARNED: &str = "bindings_learned";
pub const PAYLOAD_NOT_FOUND: &str = "payload_not_found";
pub const CONTRACT_VIOLATIONS: &str = "contract_violations";
pub const STORAGE_FAILURES: &str = "storage_failures";

/// Activation counters.
///
/// Uses `RwLock` so the engine can be shared across tasks.
pub struct ActivationTelemetry {
    config: TelemetryConfig,
    metrics: RwLock<MetricsCollector>,
}

impl ActivationTelemetry {
    pub fn new(config: &TelemetryConfig) -> Self {
        Self {
            config: config.clone(),
            metrics: RwLock::new(MetricsCollector::default()),
        }
    }

    pub fn activation_attempted(&self) {
        self.increment(ACTIVATIONS_ATTEMPTED);
    }

    pub fn activated(&self, destination: &UnitId, strategy: ActivationStrategy) {
        self.increment(ACTIVATIONS_SUCCEEDED);
        if strategy == ActivationStrategy::CachedBinding {
            self.increment(CACHE_HITS);
        }
        if self.config.per_destination {
            self.increment(&format!("{}:{}", ACTIVATIONS_SUCCEEDED, destination));
        }
    }

    pub fn search_completed(&self, matches: usize) {
        self.increment(SEARCHES);
        self.add(SEARCH_MATCHES, matches as u64);
    }

    pub fn binding_learned(&self) {
        self.increment(BINDINGS_LEARNED);
    }

    /// A destination is still waiting for inputs. Tracked per destination so
    /// a unit whose contributors never satisfy it stays visible.
    pub fn payload_not_found(&self, destination: &UnitId) {
        self.increment(PAYLOAD_NOT_FOUND);
        if self.config.per_destination {
            self.increment(&format!("{}:{}", PAYLOAD_NOT_FOUND, destination));
        }
    }

    pub fn contract_violation(&self) {
        self.increment(CONTRACT_VIOLATIONS);
    }

    pub fn storage_failure(&self) {
        self.increment(STORAGE_FAILURES);
    }

    /// Copy of all counters
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let counters = self
            .metrics
            .read()
            .map(|m| m.counters.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default();
        TelemetrySnapshot { counters }
    }

    fn increment(&self, metric: &str) {
        self.add(metric, 1);
    }

    fn add(&self, metric: &str, value: u64) {
        if !self.config.enabled {
            return;
        }
        if let Ok(mut metrics) = self.metrics.write() {
            metrics.add(metric, value);
        }
    }
}

/// Point-in-time copy of the telemetry counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub counters: BTreeMap<String, u64>,
}

impl TelemetrySnapshot {
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn not_found_for(&self, destination: &UnitId) -> u64 {
        self.counter(&format!("{}:{}", PAYLOAD_NOT_FOUND, destination))
    }
}

#[derive(Default)]
struct MetricsCollector {
    counters: HashMap<String, u64>,
}

impl MetricsCollector {
    fn add(&mut self, metric: &str, value: u64) {
        *self.counters.entry(metric.to_string()).or_insert(0) += value;
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_tracing(
    config: &LoggingConfig,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level));

    let json = config
        .json
        .then(|| tracing_subscriber::fmt::layer().json());
    let plain = (!config.json).then(|| tracing_subscriber::fmt::layer().without_time());

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .try_init()
}
