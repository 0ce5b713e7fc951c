//! Epoch lifecycle manager — the tournament round state machine.
//!
//! OPEN collects one confidential submission per submitter. Closing
//! (administrative or lazy idle-expiry) snapshots the committee. Operators
//! then post encrypted scores — or skip unsimulatable submissions — and
//! the epoch advances to RESULTS_POSTED on its own the moment every
//! submission is resolved. Finalize and Execute bookkeeping is driven by
//! the tournament engine; the manager only enforces the phase machine.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use conclave_committee::{CommitteeSelector, OperatorRegistry, RandomnessSource};
use conclave_types::{
    AccountId, ActionNode, ActionOutcome, CipherHandle, ConclaveError, Epoch, EpochConfig,
    EpochId, EpochPhase, Result, Submission, Winner, constants,
};

/// Owns every epoch and submission; all mutation goes through here.
#[derive(Debug)]
pub struct EpochManager {
    /// Idle bound converted once for timestamp arithmetic.
    max_open_age: chrono::Duration,
    epochs: HashMap<EpochId, Epoch>,
    submissions: HashMap<EpochId, HashMap<AccountId, Submission>>,
    /// The epoch currently OPEN, if any.
    current: Option<EpochId>,
    next_id: EpochId,
}

impl EpochManager {
    /// Create a manager with the given epoch timing bounds.
    #[must_use]
    pub fn new(config: EpochConfig) -> Self {
        let max_open_age =
            chrono::Duration::from_std(config.max_open_age).unwrap_or(chrono::Duration::MAX);
        Self {
            max_open_age,
            epochs: HashMap::new(),
            submissions: HashMap::new(),
            current: None,
            next_id: EpochId(1),
        }
    }

    /// Open a new epoch.
    ///
    /// The simulation-window descriptor stays encrypted so strategies
    /// cannot be tuned to the exact backtest period.
    ///
    /// # Errors
    /// - [`ConclaveError::EpochAlreadyOpen`] if an epoch is still OPEN
    /// - [`ConclaveError::InvalidWeights`] unless the weights are
    ///   non-empty and sum to exactly 100
    pub fn open(
        &mut self,
        window: CipherHandle,
        weights: Vec<u32>,
        notional_per_submitter: u64,
        total_capital: u64,
        now: DateTime<Utc>,
    ) -> Result<EpochId> {
        if let Some(id) = self.current {
            return Err(ConclaveError::EpochAlreadyOpen(id));
        }
        if weights.is_empty() {
            return Err(ConclaveError::InvalidWeights {
                reason: "weight vector is empty".into(),
            });
        }
        let sum: u64 = weights.iter().map(|w| u64::from(*w)).sum();
        if sum != u64::from(constants::WEIGHT_DENOMINATOR) {
            return Err(ConclaveError::InvalidWeights {
                reason: format!("weights sum to {sum}, expected {}", constants::WEIGHT_DENOMINATOR),
            });
        }

        let id = self.next_id;
        self.next_id = self.next_id.next();
        self.epochs.insert(
            id,
            Epoch {
                id,
                opened_at: now,
                closed_at: None,
                window,
                weights,
                notional_per_submitter,
                total_capital,
                phase: EpochPhase::Open,
                committee: Vec::new(),
                winners: Vec::new(),
                execution_outcomes: Vec::new(),
            },
        );
        self.submissions.insert(id, HashMap::new());
        self.current = Some(id);
        tracing::info!(epoch = %id, "epoch opened");
        Ok(id)
    }

    /// Submit a confidential strategy into the current open epoch.
    ///
    /// If the epoch has idled past its open bound, it is closed here and
    /// the submission rejected — unlike batches, epochs carry
    /// admin-supplied parameters and do not self-reopen.
    ///
    /// # Errors
    /// - [`ConclaveError::NoOpenEpoch`] if no epoch is OPEN
    /// - [`ConclaveError::WrongEpochPhase`] if this call triggered the
    ///   idle close
    /// - [`ConclaveError::DuplicateSubmission`] on a second submission
    ///   from the same account
    pub fn submit(
        &mut self,
        submitter: AccountId,
        actions: Vec<ActionNode>,
        now: DateTime<Utc>,
        registry: &OperatorRegistry,
        selector: &CommitteeSelector,
        source: &dyn RandomnessSource,
    ) -> Result<()> {
        let epoch_id = self.current.ok_or(ConclaveError::NoOpenEpoch)?;

        let expired = self.epochs[&epoch_id].older_than(self.max_open_age, now);
        if expired {
            self.close_epoch(epoch_id, now, registry, selector, source)?;
            return Err(ConclaveError::WrongEpochPhase {
                expected: EpochPhase::Open,
                actual: EpochPhase::Closed,
            });
        }

        let subs = self
            .submissions
            .get_mut(&epoch_id)
            .ok_or(ConclaveError::EpochNotFound(epoch_id))?;
        if subs.contains_key(&submitter) {
            return Err(ConclaveError::DuplicateSubmission { submitter });
        }
        let sequence = subs.len() as u64;
        subs.insert(
            submitter,
            Submission {
                submitter,
                actions,
                sequence,
                score: None,
                skipped: false,
                submitted_at: now,
            },
        );
        tracing::debug!(epoch = %epoch_id, submitter = %submitter, sequence, "strategy submitted");
        Ok(())
    }

    /// Administrative close of the current open epoch.
    ///
    /// # Errors
    /// - [`ConclaveError::NoOpenEpoch`] if nothing is OPEN
    /// - committee selection errors from an empty registry
    pub fn close_current(
        &mut self,
        now: DateTime<Utc>,
        registry: &OperatorRegistry,
        selector: &CommitteeSelector,
        source: &dyn RandomnessSource,
    ) -> Result<EpochId> {
        let epoch_id = self.current.ok_or(ConclaveError::NoOpenEpoch)?;
        self.close_epoch(epoch_id, now, registry, selector, source)?;
        Ok(epoch_id)
    }

    /// Post an operator-computed encrypted score for one submission.
    ///
    /// Returns `true` if this post resolved the last open submission and
    /// the epoch advanced to RESULTS_POSTED.
    ///
    /// # Errors
    /// - [`ConclaveError::WrongEpochPhase`] unless the epoch is CLOSED
    /// - [`ConclaveError::SubmissionNotFound`] for an unknown submitter
    /// - [`ConclaveError::ScoreAlreadyResolved`] if already scored/skipped
    pub fn post_score(
        &mut self,
        epoch_id: EpochId,
        submitter: AccountId,
        score: CipherHandle,
    ) -> Result<bool> {
        self.resolve_submission(epoch_id, submitter, Some(score))
    }

    /// Skip a submission (e.g. the simulation failed). Counts towards
    /// RESULTS_POSTED completeness like a posted score.
    ///
    /// # Errors
    /// Same as [`Self::post_score`].
    pub fn skip_submission(&mut self, epoch_id: EpochId, submitter: AccountId) -> Result<bool> {
        self.resolve_submission(epoch_id, submitter, None)
    }

    /// Finalize bookkeeping: RESULTS_POSTED → FINALIZED with winners.
    ///
    /// The tournament engine validates ranking and allocation before
    /// calling this; the manager only enforces the phase edge.
    ///
    /// # Errors
    /// Returns [`ConclaveError::WrongEpochPhase`] unless RESULTS_POSTED.
    pub fn record_winners(&mut self, epoch_id: EpochId, winners: Vec<Winner>) -> Result<()> {
        let epoch = self.epoch_mut(epoch_id)?;
        if epoch.phase != EpochPhase::ResultsPosted {
            return Err(ConclaveError::WrongEpochPhase {
                expected: EpochPhase::ResultsPosted,
                actual: epoch.phase,
            });
        }
        epoch.phase = EpochPhase::Finalized;
        epoch.winners = winners;
        tracing::info!(epoch = %epoch_id, winners = epoch.winners.len(), "epoch finalized");
        Ok(())
    }

    /// Execution bookkeeping: FINALIZED → EXECUTED with per-action records.
    ///
    /// # Errors
    /// Returns [`ConclaveError::WrongEpochPhase`] unless FINALIZED.
    pub fn record_execution(
        &mut self,
        epoch_id: EpochId,
        outcomes: Vec<ActionOutcome>,
    ) -> Result<()> {
        let epoch = self.epoch_mut(epoch_id)?;
        if epoch.phase != EpochPhase::Finalized {
            return Err(ConclaveError::WrongEpochPhase {
                expected: EpochPhase::Finalized,
                actual: epoch.phase,
            });
        }
        epoch.phase = EpochPhase::Executed;
        epoch.execution_outcomes = outcomes;
        tracing::info!(
            epoch = %epoch_id,
            actions = epoch.execution_outcomes.len(),
            "epoch executed"
        );
        Ok(())
    }

    // -- read accessors -----------------------------------------------------

    /// Look up an epoch by id.
    #[must_use]
    pub fn epoch(&self, id: EpochId) -> Option<&Epoch> {
        self.epochs.get(&id)
    }

    /// The epoch currently OPEN, if any.
    #[must_use]
    pub fn current_epoch_id(&self) -> Option<EpochId> {
        self.current
    }

    /// One submitter's submission in one epoch.
    #[must_use]
    pub fn submission(&self, epoch_id: EpochId, submitter: AccountId) -> Option<&Submission> {
        self.submissions.get(&epoch_id)?.get(&submitter)
    }

    /// All submissions in an epoch, in arrival order.
    #[must_use]
    pub fn submissions_in_order(&self, epoch_id: EpochId) -> Vec<&Submission> {
        let mut subs: Vec<&Submission> = self
            .submissions
            .get(&epoch_id)
            .map(|m| m.values().collect())
            .unwrap_or_default();
        subs.sort_by_key(|s| s.sequence);
        subs
    }

    /// The ranked winners of a finalized epoch.
    #[must_use]
    pub fn winners(&self, epoch_id: EpochId) -> Option<&[Winner]> {
        self.epochs.get(&epoch_id).map(|e| e.winners.as_slice())
    }

    // -- internals ----------------------------------------------------------

    fn epoch_mut(&mut self, id: EpochId) -> Result<&mut Epoch> {
        self.epochs
            .get_mut(&id)
            .ok_or(ConclaveError::EpochNotFound(id))
    }

    fn close_epoch(
        &mut self,
        epoch_id: EpochId,
        now: DateTime<Utc>,
        registry: &OperatorRegistry,
        selector: &CommitteeSelector,
        source: &dyn RandomnessSource,
    ) -> Result<()> {
        let committee = selector.select(registry, source, epoch_id.0)?;

        let epoch = self.epoch_mut(epoch_id)?;
        if epoch.phase != EpochPhase::Open {
            return Err(ConclaveError::WrongEpochPhase {
                expected: EpochPhase::Open,
                actual: epoch.phase,
            });
        }
        epoch.phase = EpochPhase::Closed;
        epoch.closed_at = Some(now);
        epoch.committee = committee;
        self.current = None;

        let submission_count = self.submissions.get(&epoch_id).map_or(0, HashMap::len);
        tracing::info!(epoch = %epoch_id, submissions = submission_count, "epoch closed");

        // An epoch with no submissions has nothing to score.
        if submission_count == 0 {
            self.epoch_mut(epoch_id)?.phase = EpochPhase::ResultsPosted;
        }
        Ok(())
    }

    fn resolve_submission(
        &mut self,
        epoch_id: EpochId,
        submitter: AccountId,
        score: Option<CipherHandle>,
    ) -> Result<bool> {
        {
            let epoch = self
                .epochs
                .get(&epoch_id)
                .ok_or(ConclaveError::EpochNotFound(epoch_id))?;
            if epoch.phase != EpochPhase::Closed {
                return Err(ConclaveError::WrongEpochPhase {
                    expected: EpochPhase::Closed,
                    actual: epoch.phase,
                });
            }
        }

        let subs = self
            .submissions
            .get_mut(&epoch_id)
            .ok_or(ConclaveError::EpochNotFound(epoch_id))?;
        let sub = subs
            .get_mut(&submitter)
            .ok_or(ConclaveError::SubmissionNotFound { submitter })?;
        if sub.is_resolved() {
            return Err(ConclaveError::ScoreAlreadyResolved { submitter });
        }
        match score {
            Some(handle) => sub.score = Some(handle),
            None => sub.skipped = true,
        }

        let all_resolved = subs.values().all(Submission::is_resolved);
        if all_resolved {
            self.epoch_mut(epoch_id)?.phase = EpochPhase::ResultsPosted;
            tracing::info!(epoch = %epoch_id, "all results posted");
        }
        Ok(all_resolved)
    }
}
