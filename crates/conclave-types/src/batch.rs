//! Batch lifecycle types and the settlement payload.
//!
//! A batch collects work items while COLLECTING, snapshots its committee
//! at the close transition, and is then settled exactly once. The status
//! field is the lock: the first settlement call to find the batch in
//! PROCESSING wins; every later call fails the status gate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, BatchId, CipherHandle, OperatorId, WorkItemId};

/// The lifecycle state of a batch.
///
/// `Collecting --[close]--> Processing --[settle]--> Settled`, with
/// `Processing --[reject/timeout]--> Failed` as the only other edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchStatus {
    /// Accepting new work items.
    Collecting,
    /// Closed; committee assigned; awaiting an attested settlement.
    Processing,
    /// Settlement applied. Terminal.
    Settled,
    /// Settlement rejected or timed out. Terminal.
    Failed,
}

impl BatchStatus {
    /// Can this batch transition to the given target state?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Collecting, Self::Processing) | (Self::Processing, Self::Settled | Self::Failed)
        )
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Collecting => write!(f, "COLLECTING"),
            Self::Processing => write!(f, "PROCESSING"),
            Self::Settled => write!(f, "SETTLED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// A bounded group of work items collected and settled together.
///
/// The committee is empty exactly while COLLECTING; it is snapshotted
/// from the registry at the close transition and never mutated after,
/// so registry churn cannot affect an in-flight batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// Monotonic batch identifier.
    pub id: BatchId,
    /// Ordered ids of the items collected into this batch.
    pub item_ids: Vec<WorkItemId>,
    /// When the batch opened (first item arrival).
    pub created_at: DateTime<Utc>,
    /// Current lifecycle state.
    pub status: BatchStatus,
    /// Operators responsible for this batch; empty while COLLECTING.
    pub committee: Vec<OperatorId>,
}

impl Batch {
    /// Returns `true` if the batch has been open longer than `max_age` at `now`.
    #[must_use]
    pub fn older_than(&self, max_age: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.created_at > max_age
    }
}

// ---------------------------------------------------------------------------
// Settlement payload — the consensus-attested result for one batch
// ---------------------------------------------------------------------------

/// Direction of the residual swap routed through the external venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapDirection {
    /// Sell base for quote.
    BaseToQuote,
    /// Sell quote for base.
    QuoteToBase,
}

/// A settlement applied directly between two parties' encrypted balances,
/// never touching the external venue. The privacy-preserving fast path
/// for intents that offset each other inside the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalizedTransfer {
    /// The debited party.
    pub from: AccountId,
    /// The credited party.
    pub to: AccountId,
    /// Encrypted amount moved; the core never learns its plaintext.
    pub amount: CipherHandle,
}

/// One contributor's stake in the net residual and its share of the
/// venue output, as a numerator/denominator fraction. Fractions across
/// contributors need not sum to 1 (some contributors fully internalized).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidualShare {
    /// The contributing party.
    pub account: AccountId,
    /// This contributor's residual exposure, in ledger units. Must be
    /// non-zero for the share to be valid.
    pub exposure: u64,
    /// Share numerator.
    pub numerator: u64,
    /// Share denominator.
    pub denominator: u64,
}

/// The unmatched remainder of a batch, routed through the venue once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetResidual {
    /// Residual amount sent to the venue, in ledger units.
    pub amount_in: u64,
    /// Swap direction.
    pub direction: SwapDirection,
    /// The residual's original contributors and their output shares.
    pub shares: Vec<ResidualShare>,
}

/// The full consensus-attested settlement result for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPayload {
    /// Matched intents settled directly between parties.
    pub transfers: Vec<InternalizedTransfer>,
    /// The unmatched remainder, if any.
    pub residual: Option<NetResidual>,
}
