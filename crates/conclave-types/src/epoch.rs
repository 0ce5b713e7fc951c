//! Epoch lifecycle types for the strategy-tournament instance.
//!
//! Each epoch cycles through five phases:
//! **OPEN → CLOSED → RESULTS_POSTED → FINALIZED → EXECUTED**
//!
//! During OPEN, submitters enroll confidential strategies. At close the
//! committee is snapshotted and operators simulate off the ledger against
//! the epoch's private backtest window. Scores come back encrypted; only
//! Finalize reveals the winners' scores and allocates capital, and only a
//! quorum-attested Execute replays the winning actions through the vault.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, CipherHandle, EpochId, OperatorId};

/// The five phases of a tournament epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EpochPhase {
    /// Accepting strategy submissions.
    Open,
    /// Submissions frozen; committee assigned; operators simulating.
    Closed,
    /// Every submission has an encrypted score or was skipped.
    ResultsPosted,
    /// Winners ranked, scores revealed, capital allocated.
    Finalized,
    /// Every winning action has been attempted through the vault. Terminal.
    Executed,
}

impl EpochPhase {
    /// Can this epoch transition to the given target phase?
    ///
    /// Phases only ever advance, one step at a time.
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Open, Self::Closed)
                | (Self::Closed, Self::ResultsPosted)
                | (Self::ResultsPosted, Self::Finalized)
                | (Self::Finalized, Self::Executed)
        )
    }
}

impl std::fmt::Display for EpochPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Closed => write!(f, "CLOSED"),
            Self::ResultsPosted => write!(f, "RESULTS_POSTED"),
            Self::Finalized => write!(f, "FINALIZED"),
            Self::Executed => write!(f, "EXECUTED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Submission — one confidential strategy per (epoch, submitter)
// ---------------------------------------------------------------------------

/// One opaque step of a submitted strategy: everything encrypted, so the
/// strategy stays confidential until its owner wins and execution is
/// quorum-approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionNode {
    /// Encrypted call target identity.
    pub target: CipherHandle,
    /// Encrypted function selector.
    pub selector: CipherHandle,
    /// Encrypted argument list.
    pub args: Vec<CipherHandle>,
}

/// A confidential strategy submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// The submitting account. One submission per (epoch, submitter).
    pub submitter: AccountId,
    /// Ordered opaque action nodes.
    pub actions: Vec<ActionNode>,
    /// Arrival order within the epoch; the ranking tie-break.
    pub sequence: u64,
    /// Encrypted performance score, posted by an operator after simulation.
    pub score: Option<CipherHandle>,
    /// Set when an operator skipped this submission (e.g. simulation failed).
    pub skipped: bool,
    /// When the submission arrived.
    pub submitted_at: DateTime<Utc>,
}

impl Submission {
    /// A submission is resolved once it has a score or was skipped.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.score.is_some() || self.skipped
    }
}

// ---------------------------------------------------------------------------
// Winner — derived at Finalize
// ---------------------------------------------------------------------------

/// A ranked winner with its revealed score and capital allocation.
///
/// `allocation = weight[rank] × total_capital / 100`; the integer-division
/// remainder is credited to the rank-0 winner so allocations always sum to
/// the epoch's total capital.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    /// The winning submitter.
    pub submitter: AccountId,
    /// Decrypted performance score.
    pub score: u64,
    /// Capital allocated to this winner, in ledger units.
    pub allocation: u64,
}

// ---------------------------------------------------------------------------
// ActionOutcome — per-action execution record
// ---------------------------------------------------------------------------

/// The individually recorded outcome of one winning action's vault call.
///
/// Partial execution is expected: a failed action is recorded, never
/// retried, and never aborts the rest of the epoch's actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Index of the action in the execution call.
    pub index: usize,
    /// Whether the vault call succeeded.
    pub success: bool,
    /// Raw return data from the vault.
    pub return_data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Epoch record
// ---------------------------------------------------------------------------

/// A tournament round: collects confidential strategies, ranks them, and
/// allocates capital to the winners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epoch {
    /// Monotonic epoch identifier.
    pub id: EpochId,
    /// When the epoch opened.
    pub opened_at: DateTime<Utc>,
    /// When the epoch closed, once it has.
    pub closed_at: Option<DateTime<Utc>>,
    /// Encrypted simulation-window descriptor. Kept private so strategies
    /// cannot be tuned to the exact backtest period.
    pub window: CipherHandle,
    /// Capital-allocation weight vector; non-negative, sums to 100.
    pub weights: Vec<u32>,
    /// Simulated notional granted to each submitter.
    pub notional_per_submitter: u64,
    /// Total capital allocated across winners at Finalize.
    pub total_capital: u64,
    /// Current phase.
    pub phase: EpochPhase,
    /// Operators responsible for this epoch; empty while OPEN.
    pub committee: Vec<OperatorId>,
    /// Ranked winners, populated at Finalize.
    pub winners: Vec<Winner>,
    /// Per-action execution records, populated at Execute.
    pub execution_outcomes: Vec<ActionOutcome>,
}

impl Epoch {
    /// Returns `true` if the epoch has been open longer than `max_age` at `now`.
    #[must_use]
    pub fn older_than(&self, max_age: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.opened_at > max_age
    }
}
