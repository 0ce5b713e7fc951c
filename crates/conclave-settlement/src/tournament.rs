//! Tournament engine — ranks submissions and allocates capital.
//!
//! Finalize takes an operator's ranked winner list with the decrypted
//! scores and re-derives everything that can be re-derived on the
//! ledger: list lengths, score monotonicity, submission-order
//! tie-breaks, winner eligibility, and the allocation arithmetic
//! itself. Execute then replays the winning action nodes through the
//! custody vault under quorum attestation, recording every action's
//! outcome individually — a failed action never aborts the rest.

use std::collections::HashSet;

use conclave_consensus::{Attestation, QuorumVerifier, execution_digest};
use conclave_lifecycle::EpochManager;
use conclave_types::{
    AccountId, ActionOutcome, CommitteeConfig, ConclaveError, EpochId, EpochPhase, Result, Winner,
    constants,
};

use crate::vault::CustodyVault;

/// Ranks winners and drives quorum-attested execution.
#[derive(Debug)]
pub struct TournamentEngine {
    verifier: QuorumVerifier,
}

impl TournamentEngine {
    #[must_use]
    pub fn new(config: CommitteeConfig) -> Self {
        Self {
            verifier: QuorumVerifier::new(config),
        }
    }

    /// Finalize an epoch: validate the ranked winner list, compute
    /// allocations, and move RESULTS_POSTED → FINALIZED.
    ///
    /// `allocation = weight[rank] × total_capital / 100`; the integer
    /// remainder goes to the rank-0 winner so allocations sum to the
    /// total exactly. An epoch with no scored submissions finalizes with
    /// an empty winner list.
    ///
    /// # Errors
    /// - [`ConclaveError::WrongEpochPhase`] unless RESULTS_POSTED
    /// - [`ConclaveError::LengthMismatch`] if `winners`/`scores` differ
    /// - [`ConclaveError::WinnerCountMismatch`] unless the winner count
    ///   equals the weight count
    /// - [`ConclaveError::IneligibleWinner`] for unknown, skipped,
    ///   unscored, or duplicated winners
    /// - [`ConclaveError::ScoreOrderViolation`] /
    ///   [`ConclaveError::TieOrderViolation`] for bad ranking
    pub fn finalize(
        &self,
        epochs: &mut EpochManager,
        epoch_id: EpochId,
        winners: &[AccountId],
        scores: &[u64],
    ) -> Result<Vec<Winner>> {
        let epoch = epochs
            .epoch(epoch_id)
            .ok_or(ConclaveError::EpochNotFound(epoch_id))?;
        if epoch.phase != EpochPhase::ResultsPosted {
            return Err(ConclaveError::WrongEpochPhase {
                expected: EpochPhase::ResultsPosted,
                actual: epoch.phase,
            });
        }
        if winners.len() != scores.len() {
            return Err(ConclaveError::LengthMismatch {
                left: winners.len(),
                right: scores.len(),
            });
        }

        let scored = epochs
            .submissions_in_order(epoch_id)
            .iter()
            .filter(|s| s.score.is_some() && !s.skipped)
            .count();
        if winners.is_empty() {
            // Nothing simulatable this round; the epoch still completes.
            if scored != 0 {
                return Err(ConclaveError::WinnerCountMismatch {
                    winners: 0,
                    weights: epoch.weights.len(),
                });
            }
            epochs.record_winners(epoch_id, Vec::new())?;
            return Ok(Vec::new());
        }
        if winners.len() != epoch.weights.len() {
            return Err(ConclaveError::WinnerCountMismatch {
                winners: winners.len(),
                weights: epoch.weights.len(),
            });
        }

        let mut seen: HashSet<AccountId> = HashSet::new();
        let mut sequences = Vec::with_capacity(winners.len());
        for winner in winners {
            if !seen.insert(*winner) {
                return Err(ConclaveError::IneligibleWinner {
                    submitter: *winner,
                    reason: "listed more than once".into(),
                });
            }
            let sub = epochs
                .submission(epoch_id, *winner)
                .ok_or(ConclaveError::SubmissionNotFound { submitter: *winner })?;
            if sub.skipped || sub.score.is_none() {
                return Err(ConclaveError::IneligibleWinner {
                    submitter: *winner,
                    reason: "submission was skipped or never scored".into(),
                });
            }
            sequences.push(sub.sequence);
        }

        // Ranks must be non-increasing in score; equal scores must keep
        // submission order (first submitted wins the tie).
        for i in 1..scores.len() {
            if scores[i] > scores[i - 1] {
                return Err(ConclaveError::ScoreOrderViolation { index: i });
            }
            if scores[i] == scores[i - 1] && sequences[i] < sequences[i - 1] {
                return Err(ConclaveError::TieOrderViolation { index: i });
            }
        }

        let epoch = epochs
            .epoch(epoch_id)
            .ok_or(ConclaveError::EpochNotFound(epoch_id))?;
        let mut allocations = Self::allocate(&epoch.weights, epoch.total_capital);
        let records: Vec<Winner> = winners
            .iter()
            .zip(scores)
            .zip(allocations.drain(..))
            .map(|((submitter, score), allocation)| Winner {
                submitter: *submitter,
                score: *score,
                allocation,
            })
            .collect();

        epochs.record_winners(epoch_id, records.clone())?;
        Ok(records)
    }

    /// Execute a finalized epoch's winning actions through the vault.
    ///
    /// Requires quorum attestation over the digest of (epoch, targets,
    /// calldatas). Each action is attempted exactly once; failures are
    /// recorded per action and never abort the batch. The epoch reaches
    /// EXECUTED once every action has been attempted.
    ///
    /// # Errors
    /// - [`ConclaveError::WrongEpochPhase`] unless FINALIZED — the losing
    ///   side of an execution race lands here
    /// - [`ConclaveError::LengthMismatch`] if `targets`/`calldatas` differ
    /// - [`ConclaveError::ActionCountMismatch`] unless the call covers
    ///   exactly the winners' action nodes
    /// - [`ConclaveError::InsufficientConsensus`] below quorum
    pub fn execute(
        &self,
        epochs: &mut EpochManager,
        vault: &mut dyn CustodyVault,
        epoch_id: EpochId,
        targets: &[[u8; 32]],
        calldatas: &[Vec<u8>],
        attestations: &[Attestation],
    ) -> Result<Vec<ActionOutcome>> {
        let epoch = epochs
            .epoch(epoch_id)
            .ok_or(ConclaveError::EpochNotFound(epoch_id))?;
        if epoch.phase != EpochPhase::Finalized {
            return Err(ConclaveError::WrongEpochPhase {
                expected: EpochPhase::Finalized,
                actual: epoch.phase,
            });
        }
        if targets.len() != calldatas.len() {
            return Err(ConclaveError::LengthMismatch {
                left: targets.len(),
                right: calldatas.len(),
            });
        }

        let expected_actions: usize = epoch
            .winners
            .iter()
            .filter_map(|w| epochs.submission(epoch_id, w.submitter))
            .map(|s| s.actions.len())
            .sum();
        if targets.len() != expected_actions {
            return Err(ConclaveError::ActionCountMismatch {
                expected: expected_actions,
                actual: targets.len(),
            });
        }

        let digest = execution_digest(epoch_id, targets, calldatas);
        self.verifier.verify(&digest, attestations, &epoch.committee)?;

        let mut outcomes = Vec::with_capacity(targets.len());
        for (index, (target, calldata)) in targets.iter().zip(calldatas).enumerate() {
            let result = vault.execute(*target, calldata, 0);
            if !result.success {
                tracing::warn!(epoch = %epoch_id, index, "winning action failed at vault");
            }
            outcomes.push(ActionOutcome {
                index,
                success: result.success,
                return_data: result.return_data,
            });
        }

        epochs.record_execution(epoch_id, outcomes.clone())?;
        Ok(outcomes)
    }

    /// Per-rank allocation with the remainder folded into rank 0.
    #[allow(clippy::cast_possible_truncation)]
    fn allocate(weights: &[u32], total_capital: u64) -> Vec<u64> {
        let mut allocations: Vec<u64> = weights
            .iter()
            .map(|w| {
                (u128::from(total_capital) * u128::from(*w)
                    / u128::from(constants::WEIGHT_DENOMINATOR)) as u64
            })
            .collect();
        let assigned: u64 = allocations.iter().sum();
        let remainder = total_capital - assigned;
        if let Some(first) = allocations.first_mut() {
            *first += remainder;
        }
        allocations
    }
}
