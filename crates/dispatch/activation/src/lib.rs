//! Dispatch activation layer.
//!
//! Behavior units declare an ordered list of typed inputs. Upstream units
//! emit payloads addressed to them one at a time. The [`ActivationEngine`]
//! keeps a bounded backlog per destination and, whenever a new payload
//! arrives, tries to bind a set of backlogged payloads into one merged
//! invocation payload whose argument kinds match the unit's signature.
//!
//! A successful search is remembered as the destination's binding (the
//! ordered contributing sources) and replayed first on later activations.
//!
//! ```
//! use dispatch_activation::{ActivationConfig, ActivationEngine};
//! use dispatch_storage::InMemoryKeyValueStore;
//! use dispatch_types::{ArgKind, ArgValue, ExecutionContext, Payload, Signature, UnitDescriptor, UnitId};
//! use std::sync::Arc;
//!
//! # tokio_test_block(async {
//! let engine = ActivationEngine::new(
//!     Arc::new(InMemoryKeyValueStore::new()),
//!     ActivationConfig::default(),
//! );
//! let sum = UnitDescriptor::new("sum", Signature::new(vec![ArgKind::Float64, ArgKind::Float64]));
//! let emit = |source: &str, v: f64| {
//!     Payload::new(ExecutionContext::new(), vec![ArgValue::Float64(v)], UnitId::new("sum"), UnitId::new(source))
//! };
//!
//! assert!(engine.activate(&sum, emit("x", 3.0)).await.unwrap_err().is_payload_not_found());
//! let activation = engine.activate(&sum, emit("y", 4.0)).await.unwrap();
//! assert_eq!(activation.payload.args.len(), 2);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod keys;
pub mod lookup;
pub mod merge;
pub mod random;
pub mod registry;
pub mod telemetry;

pub use config::{
    open_store, ActivationConfig, DispatchConfig, LoggingConfig, StorageConfig, TelemetryConfig,
};
pub use engine::{Activation, ActivationEngine, ActivationStrategy};
pub use error::{ActivationError, ActivationResult};
pub use merge::merge_payloads;
pub use random::{RandomSource, SeededRandom};
pub use registry::{InMemoryUnitRegistry, UnitRegistry};
pub use telemetry::{init_tracing, ActivationTelemetry, TelemetrySnapshot};
