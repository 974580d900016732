//! Unit descriptors as exposed by a unit registry

use crate::{Signature, UnitId};
use serde::{Deserialize, Serialize};

/// What the dispatcher knows about a behavior unit: its identifier and the
/// ordered, non-context input signature it requires.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDescriptor {
    pub id: UnitId,
    pub signature: Signature,
}

impl UnitDescriptor {
    pub fn new(id: impl Into<String>, signature: Signature) -> Self {
        Self {
            id: UnitId::new(id),
            signature,
        }
    }

    /// Number of non-context inputs the unit requires
    pub fn input_count(&self) -> usize {
        self.signature.len()
    }
}
