//! Operator registry — the dense active set of eligible operators.
//!
//! Registration appends to a dense index array; deregistration swaps the
//! removed entry with the last one and truncates, so both operations are
//! O(1) and the active set stays contiguous for index-based selection.
//!
//! Registry churn only affects *future* selections: committees are
//! snapshotted into their batch/epoch at the close transition.

use std::collections::HashMap;

use conclave_types::{ConclaveError, OperatorId, Result};

/// Tracks which operator identities are eligible to participate.
///
/// Invariant: `index.contains_key(op)` iff `op` appears exactly once in
/// `active`, and `active[index[op]] == op`.
#[derive(Debug, Default)]
pub struct OperatorRegistry {
    /// Dense array of active operators, indexable by the selector.
    active: Vec<OperatorId>,
    /// Operator → position in `active`.
    index: HashMap<OperatorId, usize>,
}

impl OperatorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operator.
    ///
    /// # Errors
    /// Returns [`ConclaveError::AlreadyRegistered`] if the operator is
    /// already in the active set.
    pub fn register(&mut self, op: OperatorId) -> Result<()> {
        if self.index.contains_key(&op) {
            return Err(ConclaveError::AlreadyRegistered(op));
        }
        self.index.insert(op, self.active.len());
        self.active.push(op);
        tracing::debug!(operator = %op, count = self.active.len(), "operator registered");
        Ok(())
    }

    /// Deregister an operator, swapping the last active entry into its slot.
    ///
    /// # Errors
    /// Returns [`ConclaveError::NotRegistered`] if the operator is not in
    /// the active set.
    pub fn deregister(&mut self, op: OperatorId) -> Result<()> {
        let Some(pos) = self.index.remove(&op) else {
            return Err(ConclaveError::NotRegistered(op));
        };
        let last = self.active.len() - 1;
        self.active.swap(pos, last);
        self.active.truncate(last);
        // The swapped entry (if any) now lives at `pos`.
        if pos < self.active.len() {
            self.index.insert(self.active[pos], pos);
        }
        tracing::debug!(operator = %op, count = self.active.len(), "operator deregistered");
        Ok(())
    }

    /// Whether the operator is currently active.
    #[must_use]
    pub fn is_registered(&self, op: &OperatorId) -> bool {
        self.index.contains_key(op)
    }

    /// Number of active operators.
    #[must_use]
    pub fn count(&self) -> usize {
        self.active.len()
    }

    /// The dense active set, in index order.
    #[must_use]
    pub fn operators(&self) -> &[OperatorId] {
        &self.active
    }

    /// The operator at the given dense index, if in range.
    #[must_use]
    pub fn operator_at(&self, idx: usize) -> Option<OperatorId> {
        self.active.get(idx).copied()
    }
}
