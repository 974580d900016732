//! Payloads: the typed messages moving between behavior units
//!
//! A payload is created by a unit when it produces output, consumed
//! read-only by the activation engine, and then either merged away into a
//! new payload or retained in a backlog awaiting a future merge.

use crate::{ArgValue, PayloadId, Signature, UnitId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Execution context carried as the leading element of every payload.
///
/// It travels alongside the arguments but never takes part in signature
/// comparison.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub trace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().to_string(),
            session_id: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("payload {0} has an empty destination")]
    EmptyDestination(PayloadId),

    #[error("payload {0} has no sources")]
    NoSources(PayloadId),

    #[error("payload {0} has an empty source identifier")]
    EmptySource(PayloadId),

    #[error("payload {payload} argument {position} is not a finite number")]
    NonFiniteArgument { payload: PayloadId, position: usize },
}

impl PayloadError {
    /// Whether the failure concerns the payload's source identifiers
    pub fn is_source_error(&self) -> bool {
        matches!(self, PayloadError::NoSources(_) | PayloadError::EmptySource(_))
    }
}

/// A typed message addressed to one behavior unit.
///
/// `context` is the context element; `args` holds only the non-context
/// arguments, in order. A freshly emitted payload has exactly one source; a
/// merged payload has one source per contributor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub id: PayloadId,
    pub context: ExecutionContext,
    pub args: Vec<ArgValue>,
    pub destination: UnitId,
    pub sources: Vec<UnitId>,
}

impl Payload {
    /// Create a freshly emitted, unmerged payload with a single source.
    pub fn new(
        context: ExecutionContext,
        args: Vec<ArgValue>,
        destination: UnitId,
        source: UnitId,
    ) -> Self {
        Self::from_parts(context, args, destination, vec![source])
    }

    /// Create a payload from explicit parts, e.g. the result of a merge.
    pub fn from_parts(
        context: ExecutionContext,
        args: Vec<ArgValue>,
        destination: UnitId,
        sources: Vec<UnitId>,
    ) -> Self {
        Self {
            id: PayloadId::generate(),
            context,
            args,
            destination,
            sources,
        }
    }

    /// Ordered kinds of the non-context arguments
    pub fn signature(&self) -> Signature {
        Signature::of(&self.args)
    }

    /// The only source of an unmerged payload.
    ///
    /// Returns `None` when the payload has zero or several sources.
    pub fn single_source(&self) -> Option<&UnitId> {
        match self.sources.as_slice() {
            [source] => Some(source),
            _ => None,
        }
    }

    pub fn is_merged(&self) -> bool {
        self.sources.len() > 1
    }

    /// Check the structural invariants every payload must hold.
    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.destination.is_empty() {
            return Err(PayloadError::EmptyDestination(self.id.clone()));
        }
        if self.sources.is_empty() {
            return Err(PayloadError::NoSources(self.id.clone()));
        }
        if self.sources.iter().any(UnitId::is_empty) {
            return Err(PayloadError::EmptySource(self.id.clone()));
        }
        if let Some(position) = self.args.iter().position(|arg| !arg.is_finite()) {
            return Err(PayloadError::NonFiniteArgument {
                payload: self.id.clone(),
                position,
            });
        }
        Ok(())
    }
}
