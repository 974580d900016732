//! Permutation engine
//!
//! Enumerates every growing-length ordered sequence drawn from a fixed
//! candidate pool, one step at a time, without materializing the space.
//!
//! The enumeration is a mixed-radix counter with radix `values.len()`,
//! most-significant digit first. When a carry runs past the first digit
//! the counter grows by one digit, up to `max_growth` digits. Growing past
//! that bound is the terminal [`PermutationError::MaxGrowthReached`] signal.
//!
//! For `values = [a, b]` and `max_growth = 3` the steps are:
//!
//! ```text
//! 0: [a]        2: [a, a]     6: [a, a, a]
//! 1: [b]        3: [a, b]     ...
//!               4: [b, a]    13: [b, b, b]
//!               5: [b, b]    14: max growth reached
//! ```
//!
//! # Example
//!
//! ```rust
//! use dispatch_permutation::PermutationList;
//!
//! let mut list = PermutationList::new(vec!["a", "b"], 3).unwrap();
//! list.permute_by(3).unwrap();
//! assert_eq!(list.members(), &["a", "b"]);
//!
//! // Deltas are relative to the current state.
//! list.permute_by(10).unwrap();
//! assert_eq!(list.members(), &["b", "b", "b"]);
//! assert!(list.permute_by(1).unwrap_err().is_max_growth_reached());
//! ```

#![deny(unsafe_code)]

use thiserror::Error;

/// Smallest candidate pool a list accepts
pub const MIN_VALUES: usize = 2;

/// Permutation engine errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermutationError {
    /// The search space is exhausted. Expected terminal signal, not a fault.
    #[error("max growth of {max_growth} reached")]
    MaxGrowthReached { max_growth: usize },

    #[error("invalid candidate pool: {0}")]
    InvalidPool(String),
}

impl PermutationError {
    pub fn is_max_growth_reached(&self) -> bool {
        matches!(self, PermutationError::MaxGrowthReached { .. })
    }
}

/// Number of steps a full enumeration yields: `V + V^2 + ... + V^M`.
///
/// Returns `None` on overflow.
pub fn combination_count(values: usize, max_growth: usize) -> Option<usize> {
    let mut total: usize = 0;
    let mut layer: usize = 1;
    for _ in 0..max_growth {
        layer = layer.checked_mul(values)?;
        total = total.checked_add(layer)?;
    }
    Some(total)
}

/// Resumable enumerator over ordered combinations of a candidate pool.
#[derive(Clone, Debug)]
pub struct PermutationList<T> {
    values: Vec<T>,
    indices: Vec<usize>,
    max_growth: usize,
    members: Vec<T>,
}

impl<T: Clone> PermutationList<T> {
    /// Create a fresh list. The first `permute_by(0)` yields `[values[0]]`.
    pub fn new(values: Vec<T>, max_growth: usize) -> Result<Self, PermutationError> {
        if values.len() < MIN_VALUES {
            return Err(PermutationError::InvalidPool(format!(
                "expected at least {} values, got {}",
                MIN_VALUES,
                values.len()
            )));
        }
        if max_growth == 0 {
            return Err(PermutationError::InvalidPool(
                "max growth must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            values,
            indices: Vec::new(),
            max_growth,
            members: Vec::new(),
        })
    }

    /// Advance the enumeration by `delta` steps from the current state.
    ///
    /// On a fresh list the indices are first initialized to `[0]`. If a step
    /// would need more than `max_growth` digits the call fails with
    /// [`PermutationError::MaxGrowthReached`] and the list is left untouched.
    pub fn permute_by(&mut self, delta: usize) -> Result<(), PermutationError> {
        let mut indices = self.indices.clone();
        if indices.is_empty() {
            indices.push(0);
        }

        let radix = self.values.len();
        for _ in 0..delta {
            increment(&mut indices, radix, self.max_growth)?;
        }

        self.indices = indices;
        self.map_to();
        Ok(())
    }

    /// Recompute `members` from the current indices.
    pub fn map_to(&mut self) {
        self.members = self
            .indices
            .iter()
            .map(|&i| self.values[i].clone())
            .collect();
    }

    /// Current combination, `members[i] == values[indices[i]]`
    pub fn members(&self) -> &[T] {
        &self.members
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn max_growth(&self) -> usize {
        self.max_growth
    }
}

/// One step of the counter: bump the last digit and propagate carries.
fn increment(
    indices: &mut Vec<usize>,
    radix: usize,
    max_growth: usize,
) -> Result<(), PermutationError> {
    let mut pos = indices.len();
    while pos > 0 {
        pos -= 1;
        indices[pos] += 1;
        if indices[pos] < radix {
            return Ok(());
        }
        indices[pos] = 0;
    }

    // Carry ran past the most significant digit.
    if indices.len() >= max_growth {
        return Err(PermutationError::MaxGrowthReached { max_growth });
    }
    indices.insert(0, 0);
    Ok(())
}
