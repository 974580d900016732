//! Storage key derivation for backlogs and bindings

use crate::{ActivationError, ActivationResult};
use dispatch_types::UnitId;

/// Key of the payload backlog for a destination
pub fn backlog_key(destination: &UnitId) -> ActivationResult<String> {
    validate(destination)?;
    Ok(format!("activate:queue:{}:payload", destination))
}

/// Key of the learned activation binding for a destination
pub fn binding_key(destination: &UnitId) -> ActivationResult<String> {
    validate(destination)?;
    Ok(format!("activate:configuration:{}:source-ids", destination))
}

fn validate(destination: &UnitId) -> ActivationResult<()> {
    if destination.is_empty() {
        return Err(ActivationError::InvalidDestination {
            destination: destination.clone(),
            reason: "destination identifier is empty".to_string(),
        });
    }
    if destination.as_str().chars().any(char::is_whitespace) {
        return Err(ActivationError::InvalidDestination {
            destination: destination.clone(),
            reason: "destination identifier contains whitespace".to_string(),
        });
    }
    Ok(())
}
