//! Deterministic pseudo-random committee selection.
//!
//! Any party must be able to recompute which operators *should* have been
//! chosen for a batch/epoch, so selection is a pure function of the seed
//! and the registry's dense index order: one SHA-256 keyed hash per slot,
//! then a wrapping linear probe past already-taken indices. No duplicates,
//! O(committee size) expected work.
//!
//! The seed source is injectable so tests supply fixed seeds and
//! production binds to whatever external entropy beacon is available.

use conclave_types::{CommitteeConfig, ConclaveError, OperatorId, Result};
use sha2::{Digest, Sha256};

use crate::registry::OperatorRegistry;

/// Injectable source of selection seeds.
pub trait RandomnessSource {
    /// Derive the 256-bit selection seed for a task (batch/epoch id).
    fn seed_for(&self, task_id: u64) -> [u8; 32];
}

/// Production seed source: binds an external randomness beacon and the
/// current ledger sequence number into the per-task seed.
#[derive(Debug, Clone, Copy)]
pub struct BeaconRandomness {
    beacon: [u8; 32],
    sequence: u64,
}

impl BeaconRandomness {
    #[must_use]
    pub fn new(beacon: [u8; 32], sequence: u64) -> Self {
        Self { beacon, sequence }
    }
}

impl RandomnessSource for BeaconRandomness {
    fn seed_for(&self, task_id: u64) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"conclave:seed:v1:");
        hasher.update(self.beacon);
        hasher.update(self.sequence.to_le_bytes());
        hasher.update(task_id.to_le_bytes());
        hasher.finalize().into()
    }
}

/// Fixed seed source for tests: still task-dependent, never time-dependent.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandomness(pub [u8; 32]);

impl RandomnessSource for FixedRandomness {
    fn seed_for(&self, task_id: u64) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"conclave:seed:fixed:");
        hasher.update(self.0);
        hasher.update(task_id.to_le_bytes());
        hasher.finalize().into()
    }
}

/// Deterministic committee selector.
#[derive(Debug, Clone, Copy)]
pub struct CommitteeSelector {
    config: CommitteeConfig,
}

impl CommitteeSelector {
    #[must_use]
    pub fn new(config: CommitteeConfig) -> Self {
        Self { config }
    }

    /// The configuration this selector was built with.
    #[must_use]
    pub fn config(&self) -> CommitteeConfig {
        self.config
    }

    /// Select the committee for `task_id` from the current active set.
    ///
    /// If the active set is no larger than the configured committee size,
    /// the entire set participates and no randomness is consumed. The
    /// result is duplicate-free and identical for identical inputs.
    ///
    /// # Errors
    /// Returns [`ConclaveError::NoRegisteredOperators`] if the registry
    /// is empty.
    pub fn select(
        &self,
        registry: &OperatorRegistry,
        source: &dyn RandomnessSource,
        task_id: u64,
    ) -> Result<Vec<OperatorId>> {
        let n = registry.count();
        if n == 0 {
            return Err(ConclaveError::NoRegisteredOperators);
        }

        let size = self.config.committee_size();
        if n <= size {
            return Ok(registry.operators().to_vec());
        }

        let seed = source.seed_for(task_id);
        let mut taken = vec![false; n];
        let mut committee = Vec::with_capacity(size);
        for slot in 0..size {
            let mut idx = Self::slot_index(&seed, slot as u64, n);
            // Wrapping linear probe to the next free index.
            while taken[idx] {
                idx = (idx + 1) % n;
            }
            taken[idx] = true;
            committee.push(registry.operators()[idx]);
        }

        tracing::debug!(
            task_id,
            committee_size = committee.len(),
            active = n,
            "committee selected"
        );
        Ok(committee)
    }

    /// Candidate index for one slot: keyed hash of (seed, slot) mod n.
    #[allow(clippy::cast_possible_truncation)]
    fn slot_index(seed: &[u8; 32], slot: u64, n: usize) -> usize {
        let mut hasher = Sha256::new();
        hasher.update(b"conclave:slot:v1:");
        hasher.update(seed);
        hasher.update(slot.to_le_bytes());
        let digest = hasher.finalize();
        let word = u64::from_le_bytes(digest[..8].try_into().expect("digest is 32 bytes"));
        (word % n as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_types::CommitteeConfig;
    use std::collections::HashSet;

    fn registry_of(n: u8) -> OperatorRegistry {
        let mut reg = OperatorRegistry::new();
        for b in 0..n {
            reg.register(OperatorId([b; 32])).unwrap();
        }
        reg
    }

    fn selector(size: usize, threshold: usize) -> CommitteeSelector {
        CommitteeSelector::new(CommitteeConfig::new(size, threshold).unwrap())
    }

    #[test]
    fn empty_registry_rejected() {
        let reg = OperatorRegistry::new();
        let sel = selector(3, 2);
        let err = sel.select(&reg, &FixedRandomness([0u8; 32]), 1).unwrap_err();
        assert!(matches!(err, ConclaveError::NoRegisteredOperators));
    }

    #[test]
    fn small_set_selects_everyone() {
        let reg = registry_of(3);
        let sel = selector(5, 2);
        let committee = sel.select(&reg, &FixedRandomness([0u8; 32]), 1).unwrap();
        assert_eq!(committee.len(), 3);
        assert_eq!(committee, reg.operators());
    }

    #[test]
    fn selection_is_deterministic() {
        let reg = registry_of(20);
        let sel = selector(5, 3);
        let src = FixedRandomness([7u8; 32]);

        let a = sel.select(&reg, &src, 42).unwrap();
        let b = sel.select(&reg, &src, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn selection_has_no_duplicates() {
        let reg = registry_of(20);
        let sel = selector(8, 5);
        for task in 0..50u64 {
            let committee = sel.select(&reg, &FixedRandomness([1u8; 32]), task).unwrap();
            let unique: HashSet<_> = committee.iter().collect();
            assert_eq!(unique.len(), committee.len(), "duplicates for task {task}");
            assert_eq!(committee.len(), 8);
        }
    }

    #[test]
    fn different_tasks_differ() {
        let reg = registry_of(50);
        let sel = selector(5, 3);
        let src = FixedRandomness([2u8; 32]);

        let a = sel.select(&reg, &src, 1).unwrap();
        let b = sel.select(&reg, &src, 2).unwrap();
        // Not guaranteed in theory, overwhelmingly likely with 50 operators.
        assert_ne!(a, b);
    }

    #[test]
    fn different_seeds_differ() {
        let reg = registry_of(50);
        let sel = selector(5, 3);

        let a = sel.select(&reg, &FixedRandomness([1u8; 32]), 9).unwrap();
        let b = sel.select(&reg, &FixedRandomness([2u8; 32]), 9).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn beacon_randomness_binds_sequence() {
        let a = BeaconRandomness::new([3u8; 32], 1).seed_for(5);
        let b = BeaconRandomness::new([3u8; 32], 2).seed_for(5);
        let c = BeaconRandomness::new([3u8; 32], 1).seed_for(5);
        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn registry_churn_changes_future_selection_only() {
        let mut reg = registry_of(20);
        let sel = selector(5, 3);
        let src = FixedRandomness([4u8; 32]);

        let before = sel.select(&reg, &src, 7).unwrap();
        // A snapshotted committee is a Vec — the caller keeps it; churn
        // in the registry cannot alter it.
        reg.deregister(OperatorId([0u8; 32])).unwrap();
        let after = sel.select(&reg, &src, 7).unwrap();

        assert_eq!(before.len(), 5);
        assert_eq!(after.len(), 5);
        // `before` is untouched by the deregistration.
        assert!(before.iter().all(|o| o.0[0] < 20));
    }
}
