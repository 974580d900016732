//! Dispatch storage abstractions.
//!
//! The activation engine persists two kinds of string values, both keyed by
//! destination unit:
//! - the backlog of payloads awaiting a match
//! - the learned activation binding for that destination
//!
//! Design stance:
//! - The engine only needs `get`/`set`/`delete` on string keys.
//! - Timeouts and backoff belong to the adapter, never to the engine.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryKeyValueStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresKeyValueStore;
pub use traits::KeyValueStore;
