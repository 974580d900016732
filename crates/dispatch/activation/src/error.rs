//! Error types for the activation layer

use dispatch_permutation::PermutationError;
use dispatch_storage::StorageError;
use dispatch_types::UnitId;

/// Result type for activation operations
pub type ActivationResult<T> = Result<T, ActivationError>;

/// Errors that can occur while activating a unit.
///
/// Everything except [`ActivationError::PayloadNotFound`] carries the
/// destination and the backlog size at the time of failure.
#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    /// No cached or searched combination satisfies the unit yet.
    /// Expected and frequent: the caller should wait for more payloads.
    #[error("no payload combination satisfies destination {destination}")]
    PayloadNotFound { destination: UnitId },

    #[error("invalid destination '{destination}': {reason}")]
    InvalidDestination { destination: UnitId, reason: String },

    #[error("invalid sources for destination {destination} (backlog size {backlog_len}): {reason}")]
    InvalidSources {
        destination: UnitId,
        backlog_len: usize,
        reason: String,
    },

    #[error("invalid payload for destination {destination} (backlog size {backlog_len}): {reason}")]
    InvalidPayload {
        destination: UnitId,
        backlog_len: usize,
        reason: String,
    },

    #[error("invalid unit {unit}: {reason}")]
    InvalidUnit { unit: UnitId, reason: String },

    #[error("unit not registered: {0}")]
    UnitNotRegistered(UnitId),

    #[error("codec failure for destination {destination} (backlog size {backlog_len}): {reason}")]
    Codec {
        destination: UnitId,
        backlog_len: usize,
        reason: String,
    },

    #[error("search failure for destination {destination} (backlog size {backlog_len}): {source}")]
    Search {
        destination: UnitId,
        backlog_len: usize,
        source: PermutationError,
    },

    #[error("storage failure for destination {destination} (backlog size {backlog_len}): {source}")]
    Storage {
        destination: UnitId,
        backlog_len: usize,
        source: StorageError,
    },
}

impl ActivationError {
    /// Whether this is the "keep waiting" outcome rather than a fault
    pub fn is_payload_not_found(&self) -> bool {
        matches!(self, ActivationError::PayloadNotFound { .. })
    }

    /// Whether a malformed payload or unit reached the engine, i.e. an
    /// upstream producer bug.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ActivationError::InvalidDestination { .. }
                | ActivationError::InvalidSources { .. }
                | ActivationError::InvalidPayload { .. }
                | ActivationError::InvalidUnit { .. }
                | ActivationError::UnitNotRegistered(_)
        )
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, ActivationError::Storage { .. })
    }

    /// Destination the failure relates to
    pub fn destination(&self) -> &UnitId {
        match self {
            ActivationError::PayloadNotFound { destination }
            | ActivationError::InvalidDestination { destination, .. }
            | ActivationError::InvalidSources { destination, .. }
            | ActivationError::InvalidPayload { destination, .. }
            | ActivationError::Codec { destination, .. }
            | ActivationError::Search { destination, .. }
            | ActivationError::Storage { destination, .. } => destination,
            ActivationError::InvalidUnit { unit, .. } => unit,
            ActivationError::UnitNotRegistered(unit) => unit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let not_found = ActivationError::PayloadNotFound {
            destination: UnitId::new("sum"),
        };
        assert!(not_found.is_payload_not_found());
        assert!(!not_found.is_contract_violation());

        let invalid = ActivationError::InvalidSources {
            destination: UnitId::new("sum"),
            backlog_len: 2,
            reason: "merged payload".into(),
        };
        assert!(invalid.is_contract_violation());
        assert_eq!(invalid.destination(), &UnitId::new("sum"));

        let storage = ActivationError::Storage {
            destination: UnitId::new("sum"),
            backlog_len: 0,
            source: StorageError::Backend("down".into()),
        };
        assert!(storage.is_storage());
        assert!(storage.to_string().contains("backlog size 0"));
    }
}
