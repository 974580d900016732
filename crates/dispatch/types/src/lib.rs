//! Dispatch domain types
//!
//! Behavior units never call each other directly. They emit typed
//! [`Payload`]s that drift through the routing fabric until some unit's
//! full input [`Signature`] is satisfied. This crate holds the vocabulary
//! shared by the permutation and activation layers:
//!
//! - [`UnitId`] / [`PayloadId`] - identifiers
//! - [`ArgKind`] / [`ArgValue`] / [`Signature`] - declared argument types,
//!   compared by value rather than runtime introspection
//! - [`ExecutionContext`] - the context element every payload carries
//! - [`Payload`] - the message moving between units
//! - [`UnitDescriptor`] - what a unit registry exposes about a unit
//!
//! # Example
//!
//! ```rust
//! use dispatch_types::*;
//!
//! let sum = UnitDescriptor::new("sum", Signature::new(vec![ArgKind::Float64, ArgKind::Float64]));
//! let payload = Payload::new(
//!     ExecutionContext::new(),
//!     vec![ArgValue::Float64(3.0)],
//!     UnitId::new("sum"),
//!     UnitId::new("x"),
//! );
//!
//! assert!(payload.validate().is_ok());
//! assert_ne!(payload.signature(), sum.signature);
//! ```

#![deny(unsafe_code)]

pub mod ids;
pub mod payload;
pub mod unit;
pub mod value;

pub use ids::{PayloadId, UnitId};
pub use payload::{ExecutionContext, Payload, PayloadError};
pub use unit::UnitDescriptor;
pub use value::{ArgKind, ArgValue, Signature};
