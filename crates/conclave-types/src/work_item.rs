//! Work items — confidential units of work collected into batches.
//!
//! A work item (a swap intent, in the settlement instance) carries one or
//! more encrypted payload handles and a hard deadline. Items are never
//! deleted; they terminate in DONE, FAILED, or EXPIRED and remain as the
//! audit trail of their batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, BatchId, CipherHandle, WorkItemId};

/// The lifecycle state of a work item.
///
/// Transitions are **monotonic** (never go backwards):
/// - `Pending → Processing` (containing batch closed)
/// - `Pending → Expired` (deadline passed before the batch closed)
/// - `Processing → Done` (settlement accepted)
/// - `Processing → Failed` (settlement rejected or timed out)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkItemStatus {
    /// Waiting in an open (COLLECTING) batch.
    Pending,
    /// The containing batch has closed; operators are computing.
    Processing,
    /// Settlement applied this item's outcome. Terminal.
    Done,
    /// Settlement failed for the containing batch. Terminal.
    Failed,
    /// The deadline passed before the item was processed. Terminal.
    Expired,
}

impl WorkItemStatus {
    /// Can this item transition to the given target state?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Processing | Self::Expired)
                | (Self::Processing, Self::Done | Self::Failed)
        )
    }

    /// Terminal states admit no further transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Expired)
    }
}

impl std::fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Processing => write!(f, "PROCESSING"),
            Self::Done => write!(f, "DONE"),
            Self::Failed => write!(f, "FAILED"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// A confidential unit of work owned by a submitter.
///
/// The payload handles are opaque to the core: only the selected
/// committee ever requests their decryption, off the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Globally unique item identifier.
    pub id: WorkItemId,
    /// The submitter that owns this item.
    pub owner: AccountId,
    /// Encrypted payload handles (e.g. amount, direction, limit).
    pub payloads: Vec<CipherHandle>,
    /// Absolute deadline; the item is short-circuited to EXPIRED past it.
    pub deadline: DateTime<Utc>,
    /// Current lifecycle state.
    pub status: WorkItemStatus,
    /// The batch this item was collected into.
    pub batch_id: BatchId,
    /// When the item was submitted.
    pub submitted_at: DateTime<Utc>,
}

impl WorkItem {
    /// Returns `true` if the deadline has passed at `now`.
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }

    /// Attempt a status transition, enforcing monotonicity.
    ///
    /// # Errors
    /// Returns [`crate::ConclaveError::InvalidItemTransition`] if the move
    /// is not allowed from the current state.
    pub fn transition(&mut self, target: WorkItemStatus) -> crate::Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(crate::ConclaveError::InvalidItemTransition {
                item: self.id,
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        Ok(())
    }
}

/// Dummy work item for testing. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl WorkItem {
    /// Create a dummy PENDING item with a one-hour deadline.
    pub fn dummy(owner: AccountId, batch_id: BatchId) -> Self {
        let now = Utc::now();
        Self {
            id: WorkItemId::new(),
            owner,
            payloads: vec![CipherHandle([0u8; 32])],
            deadline: now + chrono::Duration::hours(1),
            status: WorkItemStatus::Pending,
            batch_id,
            submitted_at: now,
        }
    }
}
