//! Unit registry: resolves a destination to its declared input signature

use crate::{ActivationError, ActivationResult};
use dispatch_types::{UnitDescriptor, UnitId};
use std::collections::HashMap;

/// Capability exposing, per unit, a stable identifier and its ordered
/// non-context input signature.
pub trait UnitRegistry: Send + Sync {
    fn unit(&self, id: &UnitId) -> Option<UnitDescriptor>;
}

/// Registry of unit descriptors held in memory
#[derive(Clone, Debug, Default)]
pub struct InMemoryUnitRegistry {
    units: HashMap<UnitId, UnitDescriptor>,
}

impl InMemoryUnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit, replacing any previous descriptor with the same id.
    pub fn register(&mut self, descriptor: UnitDescriptor) -> ActivationResult<()> {
        if descriptor.id.is_empty() {
            return Err(ActivationError::InvalidUnit {
                unit: descriptor.id,
                reason: "unit identifier is empty".to_string(),
            });
        }
        if descriptor.signature.is_empty() {
            return Err(ActivationError::InvalidUnit {
                unit: descriptor.id,
                reason: "unit requires no inputs".to_string(),
            });
        }

        let id = descriptor.id.clone();
        if let Some(previous) = self.units.insert(id.clone(), descriptor) {
            tracing::info!(unit = %id, previous = %previous.signature, "Unit re-registered");
        } else {
            tracing::info!(unit = %id, "Unit registered");
        }
        Ok(())
    }

    pub fn remove(&mut self, id: &UnitId) -> ActivationResult<UnitDescriptor> {
        self.units
            .remove(id)
            .ok_or_else(|| ActivationError::UnitNotRegistered(id.clone()))
    }

    pub fn list(&self) -> Vec<&UnitDescriptor> {
        self.units.values().collect()
    }

    pub fn count(&self) -> usize {
        self.units.len()
    }

    pub fn contains(&self, id: &UnitId) -> bool {
        self.units.contains_key(id)
    }
}

impl UnitRegistry for InMemoryUnitRegistry {
    fn unit(&self, id: &UnitId) -> Option<UnitDescriptor> {
        self.units.get(id).cloned()
    }
}
