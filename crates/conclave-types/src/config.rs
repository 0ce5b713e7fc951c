//! Configuration types for Conclave components.
//!
//! Structural validation happens at construction time: a zero committee
//! size or a threshold that cannot tolerate absent operators is rejected
//! here, never at call time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConclaveError, Result, constants};

/// Committee selection and consensus parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeConfig {
    /// Number of operators assigned to each batch/epoch.
    committee_size: usize,
    /// Minimum distinct valid committee signatures to accept a result.
    /// Strictly less than `committee_size` so a minority of unresponsive
    /// operators cannot stall settlement.
    attestation_threshold: usize,
}

impl CommitteeConfig {
    /// Validate and build a committee configuration.
    ///
    /// # Errors
    /// - [`ConclaveError::InvalidCommitteeSize`] if `committee_size == 0`
    /// - [`ConclaveError::InvalidThreshold`] if `attestation_threshold` is
    ///   zero or not strictly less than `committee_size`
    pub fn new(committee_size: usize, attestation_threshold: usize) -> Result<Self> {
        if committee_size == 0 {
            return Err(ConclaveError::InvalidCommitteeSize);
        }
        if attestation_threshold == 0 || attestation_threshold >= committee_size {
            return Err(ConclaveError::InvalidThreshold {
                threshold: attestation_threshold,
                committee_size,
            });
        }
        Ok(Self {
            committee_size,
            attestation_threshold,
        })
    }

    /// Number of operators per committee.
    #[must_use]
    pub fn committee_size(&self) -> usize {
        self.committee_size
    }

    /// Minimum distinct attestations to accept a result.
    #[must_use]
    pub fn attestation_threshold(&self) -> usize {
        self.attestation_threshold
    }
}

impl Default for CommitteeConfig {
    fn default() -> Self {
        Self {
            committee_size: constants::DEFAULT_COMMITTEE_SIZE,
            attestation_threshold: constants::DEFAULT_ATTESTATION_THRESHOLD,
        }
    }
}

/// Rolling-batch bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Idle bound: an open batch older than this is closed lazily when
    /// the next item arrives.
    pub max_batch_age: Duration,
    /// Size bound: an open batch holding this many items is closed
    /// before the next item is accepted.
    pub max_items_per_batch: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_age: Duration::from_millis(constants::DEFAULT_MAX_BATCH_AGE_MS),
            max_items_per_batch: constants::DEFAULT_MAX_ITEMS_PER_BATCH,
        }
    }
}

/// Epoch timing bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochConfig {
    /// Idle bound: an open epoch older than this closes on the next
    /// submission attempt (which is itself rejected — epochs do not
    /// self-reopen).
    pub max_open_age: Duration,
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self {
            max_open_age: Duration::from_millis(constants::DEFAULT_MAX_EPOCH_OPEN_MS),
        }
    }
}
