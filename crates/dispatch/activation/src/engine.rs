//! Activation engine: the main entry point of the dispatch layer
//!
//! For every arriving payload the engine:
//! 1. Loads the destination's backlog, appends the payload, trims the
//!    oldest entries beyond the bound, and persists it immediately
//! 2. Replays the destination's learned binding, if one resolves
//! 3. Otherwise searches all ordered combinations of backlog payloads and
//!    picks one matching combination at random, learning it as the binding
//! 4. Removes the contributors from the backlog and returns the merged
//!    payload, or reports `PayloadNotFound` so the caller keeps waiting
//!
//! All four steps run under a per-destination lock, so the load → mutate →
//! store cycle is atomic per destination while different destinations
//! proceed independently.

use crate::codec;
use crate::config::{open_store, ActivationConfig, DispatchConfig};
use crate::keys;
use crate::lookup;
use crate::merge::merge_payloads;
use crate::random::{RandomSource, SeededRandom};
use crate::registry::UnitRegistry;
use crate::telemetry::ActivationTelemetry;
use crate::{ActivationError, ActivationResult};
use dashmap::DashMap;
use dispatch_storage::{KeyValueStore, StorageError, StorageResult};
use dispatch_types::{Payload, PayloadId, UnitDescriptor, UnitId};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Which lookup strategy produced an activation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActivationStrategy {
    /// A previously learned binding resolved against the backlog
    CachedBinding,
    /// Combinatorial search over the backlog
    Search,
}

impl std::fmt::Display for ActivationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivationStrategy::CachedBinding => write!(f, "cached_binding"),
            ActivationStrategy::Search => write!(f, "search"),
        }
    }
}

/// Outcome of a successful activation
#[derive(Clone, Debug)]
pub struct Activation {
    /// Merged payload to hand to the unit's invocation
    pub payload: Payload,
    pub strategy: ActivationStrategy,
    /// Ordered contributing sources
    pub binding: Vec<UnitId>,
    /// Whether `binding` was newly persisted by this activation
    pub binding_learned: bool,
    /// Backlog length after contributors were removed
    pub backlog_len: usize,
}

/// Contributors picked by a strategy, already merged
struct Bound {
    merged: Payload,
    consumed: Vec<PayloadId>,
}

impl Bound {
    fn from_combination(destination: &UnitId, chosen: &[&Payload]) -> Option<Self> {
        let merged = merge_payloads(destination, chosen)?;
        let consumed = chosen.iter().map(|p| p.id.clone()).collect();
        Some(Self { merged, consumed })
    }
}

/// Binds backlogged payloads into unit invocations.
///
/// Cheap to share: wrap in an `Arc` and call from any number of tasks.
pub struct ActivationEngine {
    store: Arc<dyn KeyValueStore>,
    random: Arc<dyn RandomSource>,
    config: ActivationConfig,
    telemetry: Arc<ActivationTelemetry>,
    locks: DashMap<UnitId, Arc<Mutex<()>>>,
}

impl ActivationEngine {
    /// Create an engine over the given store.
    ///
    /// Match selection is seeded from `config.rng_seed` when present.
    pub fn new(store: Arc<dyn KeyValueStore>, config: ActivationConfig) -> Self {
        let random: Arc<dyn RandomSource> = match config.rng_seed {
            Some(seed) => Arc::new(SeededRandom::new(seed)),
            None => Arc::new(SeededRandom::from_entropy()),
        };

        Self {
            store,
            random,
            config,
            telemetry: Arc::new(ActivationTelemetry::new(&Default::default())),
            locks: DashMap::new(),
        }
    }

    /// Build an engine, its store, and its telemetry from configuration.
    pub async fn from_config(config: &DispatchConfig) -> StorageResult<Self> {
        let store = open_store(&config.storage).await?;
        let telemetry = Arc::new(ActivationTelemetry::new(&config.telemetry));
        Ok(Self::new(store, config.activation.clone()).with_telemetry(telemetry))
    }

    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<ActivationTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn telemetry(&self) -> &ActivationTelemetry {
        &self.telemetry
    }

    pub fn config(&self) -> &ActivationConfig {
        &self.config
    }

    // ── Activation ───────────────────────────────────────────────────

    /// Resolve the payload's destination through `registry`, then activate.
    pub async fn dispatch(
        &self,
        registry: &dyn UnitRegistry,
        payload: Payload,
    ) -> ActivationResult<Activation> {
        match registry.unit(&payload.destination) {
            Some(unit) => self.activate(&unit, payload).await,
            None => {
                self.telemetry.activation_attempted();
                let result = Err(ActivationError::InvalidDestination {
                    destination: payload.destination.clone(),
                    reason: "destination is not a registered unit".to_string(),
                });
                self.report(&payload.destination, &result);
                result
            }
        }
    }

    /// Feed one arriving payload to `unit` and try to activate it.
    ///
    /// `PayloadNotFound` is the normal "not yet" answer.
    pub async fn activate(
        &self,
        unit: &UnitDescriptor,
        payload: Payload,
    ) -> ActivationResult<Activation> {
        self.telemetry.activation_attempted();
        let destination = payload.destination.clone();
        let result = self.activate_locked(unit, payload).await;
        self.report(&destination, &result);
        result
    }

    async fn activate_locked(
        &self,
        unit: &UnitDescriptor,
        payload: Payload,
    ) -> ActivationResult<Activation> {
        let destination = payload.destination.clone();
        let backlog_key = keys::backlog_key(&destination)?;
        if destination != unit.id {
            return Err(ActivationError::InvalidDestination {
                destination,
                reason: format!("payload is addressed to a different unit than {}", unit.id),
            });
        }
        if unit.signature.is_empty() {
            return Err(ActivationError::InvalidUnit {
                unit: unit.id.clone(),
                reason: "unit requires no inputs".to_string(),
            });
        }
        let binding_key = keys::binding_key(&unit.id)?;

        let lock = self.lock_for(&destination);
        let result = {
            let _guard = lock.lock().await;
            self.activate_serialized(unit, payload, &backlog_key, &binding_key)
                .await
        };
        drop(lock);
        self.release_lock(&destination);
        result
    }

    /// Body of an activation. Callers hold the destination's lock.
    async fn activate_serialized(
        &self,
        unit: &UnitDescriptor,
        payload: Payload,
        backlog_key: &str,
        binding_key: &str,
    ) -> ActivationResult<Activation> {
        let destination = payload.destination.clone();
        let mut backlog = self.load_backlog(backlog_key, &destination).await?;
        ensure_backloggable(&payload, &destination, backlog.len())?;
        if let Some(bad) = backlog.iter().find(|p| p.single_source().is_none()) {
            return Err(ActivationError::InvalidSources {
                destination,
                backlog_len: backlog.len(),
                reason: format!(
                    "backlogged payload {} carries {} sources",
                    bad.id,
                    bad.sources.len()
                ),
            });
        }

        backlog.push(payload);
        let bound = self.config.backlog_bound(unit.input_count());
        if backlog.len() > bound {
            let excess = backlog.len() - bound;
            for dropped in backlog.drain(..excess) {
                tracing::debug!(
                    destination = %destination,
                    payload = %dropped.id.short(),
                    "Dropped oldest backlog entry"
                );
            }
        }
        self.store_backlog(backlog_key, &destination, &backlog)
            .await?;

        // Cached binding first. Any failure to resolve falls through.
        let cached = self
            .load_binding(binding_key, &destination, backlog.len())
            .await?
            .and_then(|binding| {
                let resolved = lookup::resolve_binding(&backlog, &binding, unit);
                if resolved.is_none() {
                    tracing::debug!(
                        destination = %destination,
                        binding = ?binding,
                        "Cached binding did not resolve"
                    );
                }
                resolved.and_then(|chosen| Bound::from_combination(&unit.id, &chosen))
            });
        if let Some(found) = cached {
            return self
                .complete(
                    backlog_key,
                    &destination,
                    backlog,
                    found,
                    ActivationStrategy::CachedBinding,
                    false,
                )
                .await;
        }

        // Combinatorial search over the whole backlog.
        let matches =
            lookup::search(&backlog, unit).map_err(|source| ActivationError::Search {
                destination: destination.clone(),
                backlog_len: backlog.len(),
                source,
            })?;
        self.telemetry.search_completed(matches.len());
        let searched = if matches.is_empty() {
            None
        } else {
            let pick = self.random.pick(matches.len()).min(matches.len() - 1);
            tracing::debug!(
                destination = %destination,
                matches = matches.len(),
                pick,
                "Combinatorial search matched"
            );
            Bound::from_combination(&unit.id, &matches[pick])
        };

        if let Some(found) = searched {
            let encoded = codec::encode_binding(&found.merged.sources).map_err(|reason| {
                ActivationError::InvalidSources {
                    destination: destination.clone(),
                    backlog_len: backlog.len(),
                    reason,
                }
            })?;
            self.store
                .set(binding_key, &encoded)
                .await
                .map_err(|source| storage_error(&destination, backlog.len(), source))?;
            self.telemetry.binding_learned();

            return self
                .complete(
                    backlog_key,
                    &destination,
                    backlog,
                    found,
                    ActivationStrategy::Search,
                    true,
                )
                .await;
        }

        self.store_backlog(backlog_key, &destination, &backlog)
            .await?;
        Err(ActivationError::PayloadNotFound { destination })
    }

    async fn complete(
        &self,
        backlog_key: &str,
        destination: &UnitId,
        mut backlog: Vec<Payload>,
        found: Bound,
        strategy: ActivationStrategy,
        binding_learned: bool,
    ) -> ActivationResult<Activation> {
        backlog.retain(|p| !found.consumed.contains(&p.id));
        self.store_backlog(backlog_key, destination, &backlog)
            .await?;

        tracing::info!(
            destination = %destination,
            strategy = %strategy,
            sources = ?found.merged.sources,
            backlog_len = backlog.len(),
            "Unit activated"
        );

        Ok(Activation {
            binding: found.merged.sources.clone(),
            payload: found.merged,
            strategy,
            binding_learned,
            backlog_len: backlog.len(),
        })
    }

    fn report(&self, destination: &UnitId, result: &ActivationResult<Activation>) {
        match result {
            Ok(activation) => self.telemetry.activated(destination, activation.strategy),
            Err(e) if e.is_payload_not_found() => {
                tracing::debug!(destination = %destination, "Waiting for more payloads");
                self.telemetry.payload_not_found(destination);
            }
            Err(e) if e.is_contract_violation() => {
                tracing::warn!(destination = %destination, error = %e, "Malformed input reached activation");
                self.telemetry.contract_violation();
            }
            Err(e) if e.is_storage() => {
                tracing::error!(destination = %destination, error = %e, "Activation storage failure");
                self.telemetry.storage_failure();
            }
            Err(e) => {
                tracing::error!(destination = %destination, error = %e, "Activation failed");
            }
        }
    }

    // ── Inspection ───────────────────────────────────────────────────

    /// Current backlog of a destination, oldest first
    pub async fn backlog(&self, destination: &UnitId) -> ActivationResult<Vec<Payload>> {
        let key = keys::backlog_key(destination)?;
        self.load_backlog(&key, destination).await
    }

    /// Learned binding of a destination, if any
    pub async fn binding(&self, destination: &UnitId) -> ActivationResult<Option<Vec<UnitId>>> {
        let key = keys::binding_key(destination)?;
        self.load_binding(&key, destination, 0).await
    }

    /// Forget the learned binding of a destination, forcing the next
    /// activation to search again.
    pub async fn clear_binding(&self, destination: &UnitId) -> ActivationResult<()> {
        let key = keys::binding_key(destination)?;
        let lock = self.lock_for(destination);
        let deleted = {
            let _guard = lock.lock().await;
            self.store.delete(&key).await
        };
        drop(lock);
        self.release_lock(destination);

        deleted.map_err(|source| storage_error(destination, 0, source))?;
        tracing::info!(destination = %destination, "Cached binding cleared");
        Ok(())
    }

    // ── Persistence ──────────────────────────────────────────────────

    fn lock_for(&self, destination: &UnitId) -> Arc<Mutex<()>> {
        Arc::clone(&self.locks.entry(destination.clone()).or_default())
    }

    /// Drop the destination's lock entry once no task holds or awaits it.
    fn release_lock(&self, destination: &UnitId) {
        self.locks
            .remove_if(destination, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn load_backlog(&self, key: &str, destination: &UnitId) -> ActivationResult<Vec<Payload>> {
        let raw = self
            .store
            .get(key)
            .await
            .map_err(|source| storage_error(destination, 0, source))?;
        match raw {
            Some(raw) => codec::decode_backlog(&raw).map_err(|reason| ActivationError::Codec {
                destination: destination.clone(),
                backlog_len: 0,
                reason,
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn store_backlog(
        &self,
        key: &str,
        destination: &UnitId,
        backlog: &[Payload],
    ) -> ActivationResult<()> {
        let raw = codec::encode_backlog(backlog).map_err(|reason| ActivationError::Codec {
            destination: destination.clone(),
            backlog_len: backlog.len(),
            reason,
        })?;
        self.store
            .set(key, &raw)
            .await
            .map_err(|source| storage_error(destination, backlog.len(), source))
    }

    async fn load_binding(
        &self,
        key: &str,
        destination: &UnitId,
        backlog_len: usize,
    ) -> ActivationResult<Option<Vec<UnitId>>> {
        let raw = self
            .store
            .get(key)
            .await
            .map_err(|source| storage_error(destination, backlog_len, source))?;
        Ok(raw
            .map(|raw| codec::decode_binding(&raw))
            .filter(|binding| !binding.is_empty()))
    }
}

/// Reject payloads that could not sit in a backlog: merged or source-less
/// payloads, sources that cannot be recorded in a binding, and arguments
/// that cannot be persisted.
fn ensure_backloggable(
    payload: &Payload,
    destination: &UnitId,
    backlog_len: usize,
) -> ActivationResult<()> {
    if let Err(e) = payload.validate() {
        let reason = e.to_string();
        return Err(if e.is_source_error() {
            ActivationError::InvalidSources {
                destination: destination.clone(),
                backlog_len,
                reason,
            }
        } else {
            ActivationError::InvalidPayload {
                destination: destination.clone(),
                backlog_len,
                reason,
            }
        });
    }

    let Some(source) = payload.single_source() else {
        return Err(ActivationError::InvalidSources {
            destination: destination.clone(),
            backlog_len,
            reason: format!(
                "payload {} carries {} sources, only unmerged payloads may be backlogged",
                payload.id,
                payload.sources.len()
            ),
        });
    };
    if !codec::is_encodable_source(source) {
        return Err(ActivationError::InvalidSources {
            destination: destination.clone(),
            backlog_len,
            reason: format!("source identifier '{}' cannot be recorded in a binding", source),
        });
    }
    Ok(())
}

fn storage_error(destination: &UnitId, backlog_len: usize, source: StorageError) -> ActivationError {
    ActivationError::Storage {
        destination: destination.clone(),
        backlog_len,
        source,
    }
}
