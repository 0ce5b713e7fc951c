//! Batch lifecycle manager — the rolling-batch state machine.
//!
//! Submitters are never blocked: if the open batch has aged past the idle
//! bound or reached its size bound, it is closed lazily and a fresh batch
//! opens to receive the just-submitted item. Closing snapshots the
//! committee into the batch, so the registry can churn freely afterwards.
//!
//! The manager is the only writer of batch and item state. The settlement
//! engine reports outcomes through `mark_settled` / `mark_failed`; it
//! never mutates a batch directly.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use conclave_committee::{CommitteeSelector, OperatorRegistry, RandomnessSource};
use conclave_types::{
    AccountId, Batch, BatchConfig, BatchId, BatchStatus, CipherHandle, ConclaveError, Result,
    WorkItem, WorkItemId, WorkItemStatus,
};

/// Owns every batch and work item; all mutation goes through here.
#[derive(Debug)]
pub struct BatchManager {
    config: BatchConfig,
    /// Idle bound converted once for timestamp arithmetic.
    max_age: chrono::Duration,
    batches: HashMap<BatchId, Batch>,
    items: HashMap<WorkItemId, WorkItem>,
    /// The batch currently COLLECTING, if any.
    current: Option<BatchId>,
    next_id: BatchId,
}

impl BatchManager {
    /// Create a manager with the given rolling-batch bounds.
    #[must_use]
    pub fn new(config: BatchConfig) -> Self {
        let max_age =
            chrono::Duration::from_std(config.max_batch_age).unwrap_or(chrono::Duration::MAX);
        Self {
            config,
            max_age,
            batches: HashMap::new(),
            items: HashMap::new(),
            current: None,
            next_id: BatchId(1),
        }
    }

    /// Submit a work item into the current open batch.
    ///
    /// Performs the lazy close check first: an open batch past its idle
    /// or size bound is closed (committee assigned) and a fresh batch
    /// opens to receive this item. The first submission after a close is
    /// what opens the next batch — there is no background timer.
    ///
    /// # Errors
    /// Propagates committee selection errors from the close path.
    pub fn submit(
        &mut self,
        owner: AccountId,
        payloads: Vec<CipherHandle>,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
        registry: &OperatorRegistry,
        selector: &CommitteeSelector,
        source: &dyn RandomnessSource,
    ) -> Result<WorkItemId> {
        if let Some(current_id) = self.current {
            let batch = &self.batches[&current_id];
            let over_age = batch.older_than(self.max_age, now);
            let over_size = batch.item_ids.len() >= self.config.max_items_per_batch;
            if over_age || over_size {
                self.close_batch(current_id, registry, selector, source)?;
            }
        }

        let batch_id = match self.current {
            Some(id) => id,
            None => self.open_batch(now),
        };

        let item = WorkItem {
            id: WorkItemId::new(),
            owner,
            payloads,
            deadline,
            status: WorkItemStatus::Pending,
            batch_id,
            submitted_at: now,
        };
        let item_id = item.id;

        self.batches
            .get_mut(&batch_id)
            .ok_or(ConclaveError::BatchNotFound(batch_id))?
            .item_ids
            .push(item_id);
        self.items.insert(item_id, item);

        tracing::debug!(item = %item_id, batch = %batch_id, owner = %owner, "work item submitted");
        Ok(item_id)
    }

    /// Administrative close of the current open batch.
    ///
    /// # Errors
    /// - [`ConclaveError::NoOpenBatch`] if nothing is collecting
    /// - committee selection errors from an empty registry
    pub fn close_current(
        &mut self,
        registry: &OperatorRegistry,
        selector: &CommitteeSelector,
        source: &dyn RandomnessSource,
    ) -> Result<BatchId> {
        let current_id = self.current.ok_or(ConclaveError::NoOpenBatch)?;
        self.close_batch(current_id, registry, selector, source)?;
        Ok(current_id)
    }

    /// Settlement accepted: PROCESSING → SETTLED; contained items → DONE.
    ///
    /// Expired items stay EXPIRED — their outcome was already decided.
    ///
    /// # Errors
    /// Returns [`ConclaveError::WrongBatchStatus`] unless the batch is
    /// PROCESSING. This status gate is what makes double-settlement
    /// impossible: the first caller flips the status, every later caller
    /// fails here.
    pub fn mark_settled(&mut self, batch_id: BatchId) -> Result<()> {
        self.finish_batch(batch_id, BatchStatus::Settled, WorkItemStatus::Done)
    }

    /// Settlement rejected or timed out: PROCESSING → FAILED; items → FAILED.
    ///
    /// # Errors
    /// Returns [`ConclaveError::WrongBatchStatus`] unless the batch is
    /// PROCESSING.
    pub fn mark_failed(&mut self, batch_id: BatchId) -> Result<()> {
        self.finish_batch(batch_id, BatchStatus::Failed, WorkItemStatus::Failed)
    }

    /// Short-circuit deadline-expired PENDING items to EXPIRED.
    ///
    /// Returns the ids of newly expired items. Items already processing
    /// are left alone — their batch's committee is responsible for them.
    pub fn expire_overdue(&mut self, now: DateTime<Utc>) -> Vec<WorkItemId> {
        let mut expired = Vec::new();
        for item in self.items.values_mut() {
            if item.status == WorkItemStatus::Pending && item.is_overdue(now) {
                // Pending → Expired is always legal.
                item.status = WorkItemStatus::Expired;
                expired.push(item.id);
            }
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "work items expired");
        }
        expired
    }

    // -- read accessors -----------------------------------------------------

    /// Look up a batch by id.
    #[must_use]
    pub fn batch(&self, id: BatchId) -> Option<&Batch> {
        self.batches.get(&id)
    }

    /// Look up a work item by id.
    #[must_use]
    pub fn work_item(&self, id: WorkItemId) -> Option<&WorkItem> {
        self.items.get(&id)
    }

    /// The batch currently collecting, if any.
    #[must_use]
    pub fn current_batch_id(&self) -> Option<BatchId> {
        self.current
    }

    /// Total batches ever opened (archival — batches are never deleted).
    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    // -- internals ----------------------------------------------------------

    fn open_batch(&mut self, now: DateTime<Utc>) -> BatchId {
        let id = self.next_id;
        self.next_id = self.next_id.next();
        self.batches.insert(
            id,
            Batch {
                id,
                item_ids: Vec::new(),
                created_at: now,
                status: BatchStatus::Collecting,
                committee: Vec::new(),
            },
        );
        self.current = Some(id);
        tracing::info!(batch = %id, "batch opened");
        id
    }

    fn close_batch(
        &mut self,
        batch_id: BatchId,
        registry: &OperatorRegistry,
        selector: &CommitteeSelector,
        source: &dyn RandomnessSource,
    ) -> Result<()> {
        // Committee is snapshotted here; later registry churn cannot
        // affect this batch.
        let committee = selector.select(registry, source, batch_id.0)?;

        let batch = self
            .batches
            .get_mut(&batch_id)
            .ok_or(ConclaveError::BatchNotFound(batch_id))?;
        if batch.status != BatchStatus::Collecting {
            return Err(ConclaveError::WrongBatchStatus {
                expected: BatchStatus::Collecting,
                actual: batch.status,
            });
        }
        batch.status = BatchStatus::Processing;
        batch.committee = committee;

        for item_id in batch.item_ids.clone() {
            if let Some(item) = self.items.get_mut(&item_id) {
                if item.status == WorkItemStatus::Pending {
                    item.transition(WorkItemStatus::Processing)?;
                }
            }
        }

        self.current = None;
        let batch = &self.batches[&batch_id];
        tracing::info!(
            batch = %batch_id,
            items = batch.item_ids.len(),
            committee = batch.committee.len(),
            "batch closed"
        );
        Ok(())
    }

    fn finish_batch(
        &mut self,
        batch_id: BatchId,
        batch_status: BatchStatus,
        item_status: WorkItemStatus,
    ) -> Result<()> {
        let batch = self
            .batches
            .get_mut(&batch_id)
            .ok_or(ConclaveError::BatchNotFound(batch_id))?;
        if batch.status != BatchStatus::Processing {
            return Err(ConclaveError::WrongBatchStatus {
                expected: BatchStatus::Processing,
                actual: batch.status,
            });
        }
        batch.status = batch_status;

        for item_id in batch.item_ids.clone() {
            if let Some(item) = self.items.get_mut(&item_id) {
                if item.status == WorkItemStatus::Processing {
                    item.transition(item_status)?;
                }
            }
        }

        tracing::info!(batch = %batch_id, status = %batch_status, "batch finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_committee::FixedRandomness;
    use conclave_types::CommitteeConfig;
    use std::time::Duration;

    fn setup() -> (BatchManager, OperatorRegistry, CommitteeSelector, FixedRandomness) {
        let mut registry = OperatorRegistry::new();
        for b in 0..5u8 {
            registry.register(conclave_types::OperatorId([b; 32])).unwrap();
        }
        let selector = CommitteeSelector::new(CommitteeConfig::new(3, 2).unwrap());
        let manager = BatchManager::new(BatchConfig {
            max_batch_age: Duration::from_secs(60),
            max_items_per_batch: 100,
        });
        (manager, registry, selector, FixedRandomness([1u8; 32]))
    }

    fn submit_one(
        mgr: &mut BatchManager,
        reg: &OperatorRegistry,
        sel: &CommitteeSelector,
        src: &FixedRandomness,
        now: DateTime<Utc>,
    ) -> WorkItemId {
        mgr.submit(
            AccountId::new(),
            vec![CipherHandle([0u8; 32])],
            now + chrono::Duration::hours(1),
            now,
            reg,
            sel,
            src,
        )
        .unwrap()
    }

    #[test]
    fn first_submission_opens_batch() {
        let (mut mgr, reg, sel, src) = setup();
        assert!(mgr.current_batch_id().is_none());

        let now = Utc::now();
        let item_id = submit_one(&mut mgr, &reg, &sel, &src, now);

        let batch_id = mgr.current_batch_id().unwrap();
        let batch = mgr.batch(batch_id).unwrap();
        assert_eq!(batch.status, BatchStatus::Collecting);
        assert!(batch.committee.is_empty());
        assert_eq!(batch.item_ids, vec![item_id]);
        assert_eq!(mgr.work_item(item_id).unwrap().status, WorkItemStatus::Pending);
    }

    #[test]
    fn close_assigns_committee_and_processes_items() {
        let (mut mgr, reg, sel, src) = setup();
        let now = Utc::now();
        let item_id = submit_one(&mut mgr, &reg, &sel, &src, now);

        let batch_id = mgr.close_current(&reg, &sel, &src).unwrap();

        let batch = mgr.batch(batch_id).unwrap();
        assert_eq!(batch.status, BatchStatus::Processing);
        assert_eq!(batch.committee.len(), 3);
        assert_eq!(
            mgr.work_item(item_id).unwrap().status,
            WorkItemStatus::Processing
        );
        assert!(mgr.current_batch_id().is_none());
    }

    #[test]
    fn close_without_open_batch_fails() {
        let (mut mgr, reg, sel, src) = setup();
        let err = mgr.close_current(&reg, &sel, &src).unwrap_err();
        assert!(matches!(err, ConclaveError::NoOpenBatch));
    }

    #[test]
    fn idle_batch_rolls_on_next_submission() {
        let (mut mgr, reg, sel, src) = setup();
        let t0 = Utc::now();
        submit_one(&mut mgr, &reg, &sel, &src, t0);
        let first = mgr.current_batch_id().unwrap();

        // 61s later the open batch is past the 60s idle bound; this
        // submission closes it and lands in a fresh batch.
        let t1 = t0 + chrono::Duration::seconds(61);
        let item = submit_one(&mut mgr, &reg, &sel, &src, t1);

        let second = mgr.current_batch_id().unwrap();
        assert_ne!(first, second);
        assert_eq!(mgr.batch(first).unwrap().status, BatchStatus::Processing);
        assert!(!mgr.batch(first).unwrap().committee.is_empty());
        assert_eq!(mgr.work_item(item).unwrap().batch_id, second);
    }

    #[test]
    fn full_batch_rolls_on_next_submission() {
        let (_unused, reg, sel, src) = setup();
        let mut mgr = BatchManager::new(BatchConfig {
            max_batch_age: Duration::from_secs(3600),
            max_items_per_batch: 2,
        });
        let now = Utc::now();
        submit_one(&mut mgr, &reg, &sel, &src, now);
        submit_one(&mut mgr, &reg, &sel, &src, now);
        let first = mgr.current_batch_id().unwrap();

        submit_one(&mut mgr, &reg, &sel, &src, now);
        let second = mgr.current_batch_id().unwrap();

        assert_ne!(first, second);
        assert_eq!(mgr.batch(first).unwrap().item_ids.len(), 2);
        assert_eq!(mgr.batch(second).unwrap().item_ids.len(), 1);
    }

    #[test]
    fn settle_requires_processing() {
        let (mut mgr, reg, sel, src) = setup();
        let now = Utc::now();
        submit_one(&mut mgr, &reg, &sel, &src, now);
        let batch_id = mgr.current_batch_id().unwrap();

        // Still collecting: settlement must fail the status gate.
        let err = mgr.mark_settled(batch_id).unwrap_err();
        assert!(matches!(err, ConclaveError::WrongBatchStatus { .. }));
    }

    #[test]
    fn double_settle_blocked_by_status_gate() {
        let (mut mgr, reg, sel, src) = setup();
        let now = Utc::now();
        let item = submit_one(&mut mgr, &reg, &sel, &src, now);
        let batch_id = mgr.close_current(&reg, &sel, &src).unwrap();

        mgr.mark_settled(batch_id).unwrap();
        assert_eq!(mgr.batch(batch_id).unwrap().status, BatchStatus::Settled);
        assert_eq!(mgr.work_item(item).unwrap().status, WorkItemStatus::Done);

        let err = mgr.mark_settled(batch_id).unwrap_err();
        assert!(matches!(
            err,
            ConclaveError::WrongBatchStatus {
                expected: BatchStatus::Processing,
                actual: BatchStatus::Settled,
            }
        ));
    }

    #[test]
    fn failed_batch_fails_items() {
        let (mut mgr, reg, sel, src) = setup();
        let now = Utc::now();
        let item = submit_one(&mut mgr, &reg, &sel, &src, now);
        let batch_id = mgr.close_current(&reg, &sel, &src).unwrap();

        mgr.mark_failed(batch_id).unwrap();
        assert_eq!(mgr.batch(batch_id).unwrap().status, BatchStatus::Failed);
        assert_eq!(mgr.work_item(item).unwrap().status, WorkItemStatus::Failed);
    }

    #[test]
    fn expire_overdue_short_circuits_pending_items() {
        let (mut mgr, reg, sel, src) = setup();
        let now = Utc::now();
        let item_id = mgr
            .submit(
                AccountId::new(),
                vec![CipherHandle([0u8; 32])],
                now + chrono::Duration::seconds(10),
                now,
                &reg,
                &sel,
                &src,
            )
            .unwrap();

        let expired = mgr.expire_overdue(now + chrono::Duration::seconds(11));
        assert_eq!(expired, vec![item_id]);
        assert_eq!(
            mgr.work_item(item_id).unwrap().status,
            WorkItemStatus::Expired
        );
    }

    #[test]
    fn expired_item_stays_expired_through_settlement() {
        let (mut mgr, reg, sel, src) = setup();
        let now = Utc::now();
        let short = mgr
            .submit(
                AccountId::new(),
                vec![CipherHandle([0u8; 32])],
                now + chrono::Duration::seconds(1),
                now,
                &reg,
                &sel,
                &src,
            )
            .unwrap();
        let long = submit_one(&mut mgr, &reg, &sel, &src, now);

        mgr.expire_overdue(now + chrono::Duration::seconds(2));
        let batch_id = mgr.close_current(&reg, &sel, &src).unwrap();
        mgr.mark_settled(batch_id).unwrap();

        assert_eq!(mgr.work_item(short).unwrap().status, WorkItemStatus::Expired);
        assert_eq!(mgr.work_item(long).unwrap().status, WorkItemStatus::Done);
    }

    #[test]
    fn batches_are_archival() {
        let (mut mgr, reg, sel, src) = setup();
        let now = Utc::now();
        submit_one(&mut mgr, &reg, &sel, &src, now);
        let b1 = mgr.close_current(&reg, &sel, &src).unwrap();
        submit_one(&mut mgr, &reg, &sel, &src, now);
        let b2 = mgr.close_current(&reg, &sel, &src).unwrap();

        assert_eq!(mgr.batch_count(), 2);
        assert!(mgr.batch(b1).is_some());
        assert!(mgr.batch(b2).is_some());
        assert_ne!(b1, b2);
    }
}
