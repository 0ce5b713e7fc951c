//! Error types for the Conclave coordination engine.
//!
//! All errors use the `CL_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Registry errors
//! - 2xx: Committee configuration / selection errors
//! - 3xx: Batch lifecycle errors
//! - 4xx: Epoch lifecycle errors
//! - 5xx: Consensus errors
//! - 6xx: Settlement errors
//! - 7xx: Tournament errors
//! - 8xx: Oracle / external-interface errors
//! - 9xx: General / internal errors

use thiserror::Error;

use crate::{
    AccountId, BatchId, BatchStatus, CipherHandle, EpochId, EpochPhase, OperatorId, WorkItemId,
    WorkItemStatus,
};

/// Central error enum for all Conclave operations.
#[derive(Debug, Error)]
pub enum ConclaveError {
    // =================================================================
    // Registry Errors (1xx)
    // =================================================================
    /// The operator is already in the active set.
    #[error("CL_ERR_100: Operator already registered: {0}")]
    AlreadyRegistered(OperatorId),

    /// The operator is not in the active set.
    #[error("CL_ERR_101: Operator not registered: {0}")]
    NotRegistered(OperatorId),

    // =================================================================
    // Committee Configuration / Selection Errors (2xx)
    // =================================================================
    /// Committee size of zero is rejected at configuration time.
    #[error("CL_ERR_200: Committee size must be non-zero")]
    InvalidCommitteeSize,

    /// The attestation threshold must be at least 1 and strictly less
    /// than the committee size (to tolerate non-responsive operators).
    #[error("CL_ERR_201: Invalid threshold {threshold} for committee size {committee_size}")]
    InvalidThreshold {
        threshold: usize,
        committee_size: usize,
    },

    /// A committee cannot be assigned from an empty registry.
    #[error("CL_ERR_202: No registered operators to select from")]
    NoRegisteredOperators,

    // =================================================================
    // Batch Lifecycle Errors (3xx)
    // =================================================================
    /// The requested batch does not exist.
    #[error("CL_ERR_300: Batch not found: {0}")]
    BatchNotFound(BatchId),

    /// An operation was attempted against a batch in the wrong status.
    /// This is the settlement lock: exactly one settlement call finds
    /// the batch PROCESSING; all others land here.
    #[error("CL_ERR_301: Wrong batch status: expected {expected}, got {actual}")]
    WrongBatchStatus {
        expected: BatchStatus,
        actual: BatchStatus,
    },

    /// No batch is currently collecting.
    #[error("CL_ERR_302: No open batch")]
    NoOpenBatch,

    /// The requested work item does not exist.
    #[error("CL_ERR_303: Work item not found: {0}")]
    WorkItemNotFound(WorkItemId),

    /// A work item status move violated monotonicity.
    #[error("CL_ERR_304: Cannot transition item {item} from {from} to {to}")]
    InvalidItemTransition {
        item: WorkItemId,
        from: WorkItemStatus,
        to: WorkItemStatus,
    },

    // =================================================================
    // Epoch Lifecycle Errors (4xx)
    // =================================================================
    /// The requested epoch does not exist.
    #[error("CL_ERR_400: Epoch not found: {0}")]
    EpochNotFound(EpochId),

    /// An operation was attempted in the wrong epoch phase.
    #[error("CL_ERR_401: Wrong epoch phase: expected {expected}, got {actual}")]
    WrongEpochPhase {
        expected: EpochPhase,
        actual: EpochPhase,
    },

    /// An epoch is already open; close it before opening another.
    #[error("CL_ERR_402: Epoch already open: {0}")]
    EpochAlreadyOpen(EpochId),

    /// No epoch is currently open.
    #[error("CL_ERR_403: No open epoch")]
    NoOpenEpoch,

    /// Only one submission per (epoch, submitter) pair is allowed.
    #[error("CL_ERR_404: Duplicate submission from {submitter}")]
    DuplicateSubmission { submitter: AccountId },

    /// No submission exists for this submitter in this epoch.
    #[error("CL_ERR_405: Submission not found for {submitter}")]
    SubmissionNotFound { submitter: AccountId },

    /// The weight vector failed validation at epoch open.
    #[error("CL_ERR_406: Invalid weights: {reason}")]
    InvalidWeights { reason: String },

    /// The submission already has a score or was skipped.
    #[error("CL_ERR_407: Score already resolved for {submitter}")]
    ScoreAlreadyResolved { submitter: AccountId },

    // =================================================================
    // Consensus Errors (5xx)
    // =================================================================
    /// Fewer distinct valid committee signatures than the threshold.
    #[error("CL_ERR_500: Insufficient consensus: {valid} valid of {required} required")]
    InsufficientConsensus { valid: usize, required: usize },

    // =================================================================
    // Settlement Errors (6xx)
    // =================================================================
    /// A residual share referenced a contributor with zero exposure or
    /// carried a malformed fraction.
    #[error("CL_ERR_600: Invalid share allocation: {reason}")]
    InvalidShareAllocation { reason: String },

    /// The contributors' exposures do not sum to the residual amount.
    #[error("CL_ERR_601: Residual mismatch: exposures sum to {exposure_sum}, residual is {residual}")]
    ResidualMismatch { exposure_sum: u64, residual: u64 },

    /// The external venue swap failed; the batch stays PROCESSING and
    /// the settlement attempt can be retried.
    #[error("CL_ERR_602: Venue swap failed: {reason}")]
    VenueFailure { reason: String },

    // =================================================================
    // Tournament Errors (7xx)
    // =================================================================
    /// The winner list length must equal the weight vector length.
    #[error("CL_ERR_700: Winner count {winners} does not match weight count {weights}")]
    WinnerCountMismatch { winners: usize, weights: usize },

    /// Two parallel arrays in a call had different lengths.
    #[error("CL_ERR_701: Length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    /// Winner scores must be monotonically non-increasing by rank.
    #[error("CL_ERR_702: Score order violation at rank {index}")]
    ScoreOrderViolation { index: usize },

    /// Tied scores must be listed in submission order (first submitted wins).
    #[error("CL_ERR_703: Tie order violation at rank {index}")]
    TieOrderViolation { index: usize },

    /// The execution call data count does not match the winners' actions.
    #[error("CL_ERR_704: Action count mismatch: expected {expected}, got {actual}")]
    ActionCountMismatch { expected: usize, actual: usize },

    /// A listed winner has no scored, non-skipped submission.
    #[error("CL_ERR_705: Ineligible winner {submitter}: {reason}")]
    IneligibleWinner {
        submitter: AccountId,
        reason: String,
    },

    // =================================================================
    // Oracle / External-Interface Errors (8xx)
    // =================================================================
    /// The confidential-value oracle rejected an operation.
    #[error("CL_ERR_800: Oracle failure: {reason}")]
    OracleFailure { reason: String },

    /// The oracle does not know this handle.
    #[error("CL_ERR_801: Unknown cipher handle: {0}")]
    UnknownHandle(CipherHandle),

    /// A ciphertext subtraction would underflow.
    #[error("CL_ERR_802: Cipher underflow")]
    CipherUnderflow,

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("CL_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("CL_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config values, missing fields, etc.).
    #[error("CL_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, ConclaveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = ConclaveError::AlreadyRegistered(OperatorId([1u8; 32]));
        let msg = format!("{err}");
        assert!(msg.starts_with("CL_ERR_100"), "Got: {msg}");
    }

    #[test]
    fn wrong_batch_status_display() {
        let err = ConclaveError::WrongBatchStatus {
            expected: BatchStatus::Processing,
            actual: BatchStatus::Settled,
        };
        let msg = format!("{err}");
        assert!(msg.contains("CL_ERR_301"));
        assert!(msg.contains("PROCESSING"));
        assert!(msg.contains("SETTLED"));
    }

    #[test]
    fn insufficient_consensus_display() {
        let err = ConclaveError::InsufficientConsensus {
            valid: 2,
            required: 3,
        };
        let msg = format!("{err}");
        assert!(msg.contains("CL_ERR_500"));
        assert!(msg.contains('2'));
        assert!(msg.contains('3'));
    }

    #[test]
    fn all_errors_have_cl_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(ConclaveError::InvalidCommitteeSize),
            Box::new(ConclaveError::NoOpenBatch),
            Box::new(ConclaveError::NoOpenEpoch),
            Box::new(ConclaveError::CipherUnderflow),
            Box::new(ConclaveError::Internal("test".into())),
            Box::new(ConclaveError::WinnerCountMismatch {
                winners: 1,
                weights: 2,
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("CL_ERR_"),
                "Error missing CL_ERR_ prefix: {msg}"
            );
        }
    }
}
