//! Quorum verification — pure and stateless given its inputs.
//!
//! Given a canonical digest, a list of purported attestations, and the
//! committee recorded for the batch/epoch, count distinct valid committee
//! signatures and accept iff the count reaches the configured threshold.
//! Duplicates count once; non-members and bad signatures count zero.
//!
//! The digests here are the only things operators ever sign: every byte
//! of the proposed result is committed, with a domain-separation prefix
//! per result kind.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use conclave_types::{
    BatchId, CommitteeConfig, ConclaveError, EpochId, OperatorId, Result, SettlementPayload,
    SwapDirection,
};

use crate::attestation::Attestation;

/// Checks that a quorum of committee attestations approve a digest.
#[derive(Debug, Clone, Copy)]
pub struct QuorumVerifier {
    /// Minimum distinct valid committee signatures.
    threshold: usize,
}

impl QuorumVerifier {
    /// Build a verifier from validated committee configuration.
    #[must_use]
    pub fn new(config: CommitteeConfig) -> Self {
        Self {
            threshold: config.attestation_threshold(),
        }
    }

    /// The configured minimum attestation count.
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Verify quorum over a digest. Returns the distinct valid count.
    ///
    /// Adding more valid signatures can only flip the result from
    /// rejected to accepted, never the reverse — the legitimate recovery
    /// path for a failed call is more operators signing and resubmitting.
    ///
    /// # Errors
    /// Returns [`ConclaveError::InsufficientConsensus`] if fewer than
    /// `threshold` distinct committee members validly signed.
    pub fn verify(
        &self,
        digest: &[u8; 32],
        attestations: &[Attestation],
        committee: &[OperatorId],
    ) -> Result<usize> {
        let mut counted: HashSet<OperatorId> = HashSet::new();
        for att in attestations {
            if counted.contains(&att.signer) {
                continue;
            }
            if !committee.contains(&att.signer) {
                continue;
            }
            if att.verify(digest) {
                counted.insert(att.signer);
            }
        }

        let valid = counted.len();
        if valid < self.threshold {
            tracing::warn!(valid, required = self.threshold, "insufficient consensus");
            return Err(ConclaveError::InsufficientConsensus {
                valid,
                required: self.threshold,
            });
        }
        Ok(valid)
    }
}

// ---------------------------------------------------------------------------
// Canonical digests
// ---------------------------------------------------------------------------

/// Canonical digest of a proposed batch settlement.
///
/// Commits to the batch id and every byte of the payload: transfer
/// endpoints and ciphertext handles, residual amount, direction, and
/// every share's account, exposure, and fraction.
#[must_use]
pub fn settlement_digest(batch_id: BatchId, payload: &SettlementPayload) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"conclave:settle:v1:");
    hasher.update(batch_id.0.to_le_bytes());

    hasher.update((payload.transfers.len() as u64).to_le_bytes());
    for t in &payload.transfers {
        hasher.update(t.from.0.as_bytes());
        hasher.update(t.to.0.as_bytes());
        hasher.update(t.amount.as_bytes());
    }

    match &payload.residual {
        None => hasher.update([0u8]),
        Some(residual) => {
            hasher.update([1u8]);
            hasher.update(residual.amount_in.to_le_bytes());
            hasher.update(match residual.direction {
                SwapDirection::BaseToQuote => [0u8],
                SwapDirection::QuoteToBase => [1u8],
            });
            hasher.update((residual.shares.len() as u64).to_le_bytes());
            for share in &residual.shares {
                hasher.update(share.account.0.as_bytes());
                hasher.update(share.exposure.to_le_bytes());
                hasher.update(share.numerator.to_le_bytes());
                hasher.update(share.denominator.to_le_bytes());
            }
        }
    }

    hasher.finalize().into()
}

/// Canonical digest of a proposed tournament execution.
///
/// Commits to the epoch id and each (target, calldata) pair in order.
#[must_use]
pub fn execution_digest(epoch_id: EpochId, targets: &[[u8; 32]], calldatas: &[Vec<u8>]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"conclave:exec:v1:");
    hasher.update(epoch_id.0.to_le_bytes());
    hasher.update((targets.len() as u64).to_le_bytes());
    for target in targets {
        hasher.update(target);
    }
    hasher.update((calldatas.len() as u64).to_le_bytes());
    for calldata in calldatas {
        hasher.update((calldata.len() as u64).to_le_bytes());
        hasher.update(calldata);
    }
    hasher.finalize().into()
}
