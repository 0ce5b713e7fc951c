//! Settlement engine — applies a consensus-approved batch result.
//!
//! Ordering is everything here:
//! 1. status gate (the idempotency lock — exactly one caller passes)
//! 2. payload validation (nothing mutated yet)
//! 3. quorum verification against the batch's snapshotted committee
//! 4. the single venue call for the residual, if any
//! 5. balance mutations against a working copy, committed atomically
//! 6. batch → SETTLED, items → DONE
//!
//! A failure at any step leaves every balance and the batch status
//! exactly as they were — a venue failure in particular keeps the batch
//! PROCESSING so the settlement can be retried.

use conclave_consensus::{Attestation, QuorumVerifier, settlement_digest};
use conclave_lifecycle::BatchManager;
use conclave_types::{
    AccountId, BatchId, BatchStatus, CipherHandle, CommitteeConfig, ConclaveError, NetResidual,
    Result, SettlementPayload,
};
use serde::{Deserialize, Serialize};

use crate::balances::EncryptedBalances;
use crate::oracle::CipherOracle;
use crate::venue::LiquidityVenue;

/// What a successful settlement did, for observers and audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub batch_id: BatchId,
    /// Number of internalized transfers applied.
    pub internalized: usize,
    /// Venue output for the residual, if one was routed.
    pub venue_amount_out: Option<u64>,
    /// Per-contributor venue output credits, in ledger units.
    pub distributed: Vec<(AccountId, u64)>,
    /// Venue output not covered by the share fractions. Explicitly
    /// reported — share fractions need not sum to 1.
    pub undistributed: u64,
}

/// Applies consensus-approved settlement results to encrypted balances.
///
/// Owns the balance map; reads committee membership from the batch and
/// never mutates it.
#[derive(Debug)]
pub struct SettlementEngine {
    verifier: QuorumVerifier,
    balances: EncryptedBalances,
}

impl SettlementEngine {
    #[must_use]
    pub fn new(config: CommitteeConfig) -> Self {
        Self {
            verifier: QuorumVerifier::new(config),
            balances: EncryptedBalances::new(),
        }
    }

    /// Seed an account with an already-encrypted deposit.
    ///
    /// # Errors
    /// Propagates oracle failures.
    pub fn deposit(
        &mut self,
        oracle: &mut dyn CipherOracle,
        account: AccountId,
        amount: CipherHandle,
    ) -> Result<()> {
        self.balances.credit(oracle, account, amount)
    }

    /// An account's current encrypted balance handle.
    #[must_use]
    pub fn balance(&self, account: AccountId) -> Option<CipherHandle> {
        self.balances.handle(account)
    }

    /// Settle a PROCESSING batch with a quorum-attested payload.
    ///
    /// # Errors
    /// - [`ConclaveError::WrongBatchStatus`] unless the batch is
    ///   PROCESSING — the losing side of a settlement race lands here
    /// - [`ConclaveError::InvalidShareAllocation`] /
    ///   [`ConclaveError::ResidualMismatch`] for malformed residual shares
    /// - [`ConclaveError::InsufficientConsensus`] below quorum
    /// - [`ConclaveError::VenueFailure`] if the swap failed; the batch
    ///   stays PROCESSING and the call can be retried
    pub fn settle(
        &mut self,
        batches: &mut BatchManager,
        oracle: &mut dyn CipherOracle,
        venue: &mut dyn LiquidityVenue,
        batch_id: BatchId,
        payload: &SettlementPayload,
        attestations: &[Attestation],
    ) -> Result<SettlementReport> {
        let batch = batches
            .batch(batch_id)
            .ok_or(ConclaveError::BatchNotFound(batch_id))?;
        if batch.status != BatchStatus::Processing {
            return Err(ConclaveError::WrongBatchStatus {
                expected: BatchStatus::Processing,
                actual: batch.status,
            });
        }

        if let Some(residual) = &payload.residual {
            Self::validate_residual(residual)?;
        }

        let digest = settlement_digest(batch_id, payload);
        self.verifier.verify(&digest, attestations, &batch.committee)?;

        // The venue interaction happens before any balance mutation, so
        // a swap failure leaves nothing to roll back.
        let venue_amount_out = match &payload.residual {
            Some(residual) => Some(venue.swap(residual.amount_in, residual.direction)?),
            None => None,
        };

        // All-or-nothing: mutate a working copy, commit only on success.
        let mut working = self.balances.clone();

        for transfer in &payload.transfers {
            working.debit(oracle, transfer.from, transfer.amount)?;
            working.credit(oracle, transfer.to, transfer.amount)?;
        }

        let mut distributed = Vec::new();
        let mut undistributed = 0;
        if let (Some(residual), Some(amount_out)) = (&payload.residual, venue_amount_out) {
            // Fractions are individually at most 1 but can still sum past
            // it; reject before touching any balance.
            let portions: Vec<u64> = residual
                .shares
                .iter()
                .map(|s| Self::portion(amount_out, s.numerator, s.denominator))
                .collect();
            let paid_out: u128 = portions.iter().map(|p| u128::from(*p)).sum();
            let paid_out =
                u64::try_from(paid_out)
                    .ok()
                    .filter(|p| *p <= amount_out)
                    .ok_or_else(|| ConclaveError::InvalidShareAllocation {
                        reason: format!("shares claim {paid_out} of venue output {amount_out}"),
                    })?;

            for share in &residual.shares {
                let exposure = oracle.encrypt(share.exposure);
                working.debit(oracle, share.account, exposure)?;
            }
            for (share, portion) in residual.shares.iter().zip(portions) {
                let credit = oracle.encrypt(portion);
                working.credit(oracle, share.account, credit)?;
                distributed.push((share.account, portion));
            }
            undistributed = amount_out - paid_out;
        }

        self.balances = working;
        batches.mark_settled(batch_id)?;

        tracing::info!(
            batch = %batch_id,
            internalized = payload.transfers.len(),
            venue_out = venue_amount_out,
            undistributed,
            "batch settled"
        );
        Ok(SettlementReport {
            batch_id,
            internalized: payload.transfers.len(),
            venue_amount_out,
            distributed,
            undistributed,
        })
    }

    fn validate_residual(residual: &NetResidual) -> Result<()> {
        let mut exposure_sum: u64 = 0;
        for (i, share) in residual.shares.iter().enumerate() {
            if share.exposure == 0 {
                return Err(ConclaveError::InvalidShareAllocation {
                    reason: format!("share {i} references contributor {} with zero residual exposure", share.account),
                });
            }
            if share.denominator == 0 {
                return Err(ConclaveError::InvalidShareAllocation {
                    reason: format!("share {i} has zero denominator"),
                });
            }
            if share.numerator > share.denominator {
                return Err(ConclaveError::InvalidShareAllocation {
                    reason: format!(
                        "share {i} fraction {}/{} exceeds 1",
                        share.numerator, share.denominator
                    ),
                });
            }
            exposure_sum = exposure_sum.checked_add(share.exposure).ok_or_else(|| {
                ConclaveError::InvalidShareAllocation {
                    reason: "exposure sum overflow".into(),
                }
            })?;
        }
        if exposure_sum != residual.amount_in {
            return Err(ConclaveError::ResidualMismatch {
                exposure_sum,
                residual: residual.amount_in,
            });
        }
        Ok(())
    }

    /// `amount × numerator / denominator` — never exceeds `amount` since
    /// the fraction was validated to be at most 1.
    #[allow(clippy::cast_possible_truncation)]
    fn portion(amount: u64, numerator: u64, denominator: u64) -> u64 {
        (u128::from(amount) * u128::from(numerator) / u128::from(denominator)) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::MockCipherOracle;
    use crate::venue::MockVenue;
    use chrono::Utc;
    use conclave_committee::{CommitteeSelector, FixedRandomness, OperatorRegistry};
    use conclave_consensus::SigningOperator;
    use conclave_types::{
        BatchConfig, InternalizedTransfer, ResidualShare, SwapDirection, WorkItemStatus,
    };

    struct Harness {
        engine: SettlementEngine,
        batches: BatchManager,
        oracle: MockCipherOracle,
        venue: MockVenue,
        registry: OperatorRegistry,
        selector: CommitteeSelector,
        source: FixedRandomness,
        operators: Vec<SigningOperator>,
    }

    fn harness() -> Harness {
        let operators: Vec<SigningOperator> =
            (1..=4u8).map(|b| SigningOperator::from_seed([b; 32])).collect();
        let mut registry = OperatorRegistry::new();
        for op in &operators {
            registry.register(op.id()).unwrap();
        }
        let config = CommitteeConfig::new(3, 2).unwrap();
        Harness {
            engine: SettlementEngine::new(config),
            batches: BatchManager::new(BatchConfig::default()),
            oracle: MockCipherOracle::new(),
            venue: MockVenue::flat(),
            registry,
            selector: CommitteeSelector::new(config),
            source: FixedRandomness([8u8; 32]),
            operators,
        }
    }

    impl Harness {
        fn fund(&mut self, account: AccountId, amount: u64) {
            let handle = self.oracle.encrypt(amount);
            self.engine.deposit(&mut self.oracle, account, handle).unwrap();
        }

        fn plaintext_balance(&self, account: AccountId) -> u64 {
            self.engine
                .balance(account)
                .and_then(|h| self.oracle.plaintext_of(h))
                .unwrap_or(0)
        }

        fn closed_batch(&mut self, owners: &[AccountId]) -> BatchId {
            let now = Utc::now();
            for owner in owners {
                self.batches
                    .submit(
                        *owner,
                        vec![self.oracle.encrypt(0)],
                        now + chrono::Duration::hours(1),
                        now,
                        &self.registry,
                        &self.selector,
                        &self.source,
                    )
                    .unwrap();
            }
            self.batches
                .close_current(&self.registry, &self.selector, &self.source)
                .unwrap()
        }

        fn attest(&self, batch_id: BatchId, payload: &SettlementPayload) -> Vec<Attestation> {
            let digest = settlement_digest(batch_id, payload);
            let committee = &self.batches.batch(batch_id).unwrap().committee;
            self.operators
                .iter()
                .filter(|op| committee.contains(&op.id()))
                .map(|op| op.attest(&digest))
                .collect()
        }
    }

    #[test]
    fn internalized_only_settlement() {
        let mut h = harness();
        let alice = AccountId::new();
        let bob = AccountId::new();
        h.fund(alice, 200);
        h.fund(bob, 10);

        let batch_id = h.closed_batch(&[alice, bob]);
        let amount = h.oracle.encrypt(150);
        let payload = SettlementPayload {
            transfers: vec![InternalizedTransfer {
                from: alice,
                to: bob,
                amount,
            }],
            residual: None,
        };
        let atts = h.attest(batch_id, &payload);

        let report = h
            .engine
            .settle(&mut h.batches, &mut h.oracle, &mut h.venue, batch_id, &payload, &atts)
            .unwrap();

        assert_eq!(report.internalized, 1);
        assert_eq!(report.venue_amount_out, None);
        assert_eq!(h.plaintext_balance(alice), 50);
        assert_eq!(h.plaintext_balance(bob), 160);
        assert!(h.venue.swaps.is_empty());
        assert_eq!(
            h.batches.batch(batch_id).unwrap().status,
            BatchStatus::Settled
        );
    }

    #[test]
    fn residual_routed_to_venue_and_distributed() {
        let mut h = harness();
        let carol = AccountId::new();
        h.fund(carol, 50);

        let batch_id = h.closed_batch(&[carol]);
        let payload = SettlementPayload {
            transfers: vec![],
            residual: Some(NetResidual {
                amount_in: 50,
                direction: SwapDirection::BaseToQuote,
                shares: vec![ResidualShare {
                    account: carol,
                    exposure: 50,
                    numerator: 1,
                    denominator: 1,
                }],
            }),
        };
        let atts = h.attest(batch_id, &payload);

        let report = h
            .engine
            .settle(&mut h.batches, &mut h.oracle, &mut h.venue, batch_id, &payload, &atts)
            .unwrap();

        assert_eq!(report.venue_amount_out, Some(50));
        assert_eq!(report.distributed, vec![(carol, 50)]);
        assert_eq!(report.undistributed, 0);
        assert_eq!(h.venue.swaps, vec![(50, SwapDirection::BaseToQuote)]);
        // Carol's 50 went out and 50 (flat rate) came back.
        assert_eq!(h.plaintext_balance(carol), 50);
    }

    #[test]
    fn double_settlement_blocked() {
        let mut h = harness();
        let alice = AccountId::new();
        h.fund(alice, 100);

        let batch_id = h.closed_batch(&[alice]);
        let payload = SettlementPayload {
            transfers: vec![],
            residual: None,
        };
        let atts = h.attest(batch_id, &payload);

        h.engine
            .settle(&mut h.batches, &mut h.oracle, &mut h.venue, batch_id, &payload, &atts)
            .unwrap();

        let err = h
            .engine
            .settle(&mut h.batches, &mut h.oracle, &mut h.venue, batch_id, &payload, &atts)
            .unwrap_err();
        assert!(matches!(
            err,
            ConclaveError::WrongBatchStatus {
                expected: BatchStatus::Processing,
                actual: BatchStatus::Settled,
            }
        ));
    }

    #[test]
    fn insufficient_consensus_rejected() {
        let mut h = harness();
        let alice = AccountId::new();
        h.fund(alice, 100);

        let batch_id = h.closed_batch(&[alice]);
        let payload = SettlementPayload {
            transfers: vec![],
            residual: None,
        };
        let atts = h.attest(batch_id, &payload);

        let err = h
            .engine
            .settle(
                &mut h.batches,
                &mut h.oracle,
                &mut h.venue,
                batch_id,
                &payload,
                &atts[..1],
            )
            .unwrap_err();
        assert!(matches!(err, ConclaveError::InsufficientConsensus { .. }));
        assert_eq!(
            h.batches.batch(batch_id).unwrap().status,
            BatchStatus::Processing
        );
    }

    #[test]
    fn zero_exposure_share_rejected() {
        let mut h = harness();
        let carol = AccountId::new();
        h.fund(carol, 100);

        let batch_id = h.closed_batch(&[carol]);
        let payload = SettlementPayload {
            transfers: vec![],
            residual: Some(NetResidual {
                amount_in: 50,
                direction: SwapDirection::BaseToQuote,
                shares: vec![ResidualShare {
                    account: carol,
                    exposure: 0,
                    numerator: 1,
                    denominator: 1,
                }],
            }),
        };
        let atts = h.attest(batch_id, &payload);

        let err = h
            .engine
            .settle(&mut h.batches, &mut h.oracle, &mut h.venue, batch_id, &payload, &atts)
            .unwrap_err();
        assert!(matches!(err, ConclaveError::InvalidShareAllocation { .. }));
        // Nothing moved, nothing swapped.
        assert!(h.venue.swaps.is_empty());
        assert_eq!(h.plaintext_balance(carol), 100);
    }

    #[test]
    fn exposure_sum_mismatch_rejected() {
        let mut h = harness();
        let carol = AccountId::new();
        h.fund(carol, 100);

        let batch_id = h.closed_batch(&[carol]);
        let payload = SettlementPayload {
            transfers: vec![],
            residual: Some(NetResidual {
                amount_in: 50,
                direction: SwapDirection::BaseToQuote,
                shares: vec![ResidualShare {
                    account: carol,
                    exposure: 40,
                    numerator: 1,
                    denominator: 1,
                }],
            }),
        };
        let atts = h.attest(batch_id, &payload);

        let err = h
            .engine
            .settle(&mut h.batches, &mut h.oracle, &mut h.venue, batch_id, &payload, &atts)
            .unwrap_err();
        assert!(matches!(
            err,
            ConclaveError::ResidualMismatch {
                exposure_sum: 40,
                residual: 50,
            }
        ));
    }

    #[test]
    fn venue_failure_keeps_batch_processing() {
        let mut h = harness();
        let carol = AccountId::new();
        h.fund(carol, 50);

        let batch_id = h.closed_batch(&[carol]);
        let payload = SettlementPayload {
            transfers: vec![],
            residual: Some(NetResidual {
                amount_in: 50,
                direction: SwapDirection::BaseToQuote,
                shares: vec![ResidualShare {
                    account: carol,
                    exposure: 50,
                    numerator: 1,
                    denominator: 1,
                }],
            }),
        };
        let atts = h.attest(batch_id, &payload);

        h.venue.fail_next();
        let err = h
            .engine
            .settle(&mut h.batches, &mut h.oracle, &mut h.venue, batch_id, &payload, &atts)
            .unwrap_err();
        assert!(matches!(err, ConclaveError::VenueFailure { .. }));
        assert_eq!(
            h.batches.batch(batch_id).unwrap().status,
            BatchStatus::Processing
        );
        assert_eq!(h.plaintext_balance(carol), 50);

        // Retry succeeds against the still-PROCESSING batch.
        let report = h
            .engine
            .settle(&mut h.batches, &mut h.oracle, &mut h.venue, batch_id, &payload, &atts)
            .unwrap();
        assert_eq!(report.venue_amount_out, Some(50));
        assert_eq!(
            h.batches.batch(batch_id).unwrap().status,
            BatchStatus::Settled
        );
    }

    #[test]
    fn failed_transfer_rolls_back_everything() {
        let mut h = harness();
        let alice = AccountId::new();
        let bob = AccountId::new();
        h.fund(alice, 100);
        // Bob holds nothing; a transfer out of bob must underflow.

        let batch_id = h.closed_batch(&[alice, bob]);
        // First transfer succeeds against the working copy; the second
        // overdraws bob (credited 60, debited 100) and must sink both.
        let a_to_b = h.oracle.encrypt(60);
        let b_overdraft = h.oracle.encrypt(100);
        let payload = SettlementPayload {
            transfers: vec![
                InternalizedTransfer { from: alice, to: bob, amount: a_to_b },
                InternalizedTransfer { from: bob, to: alice, amount: b_overdraft },
            ],
            residual: None,
        };
        let atts = h.attest(batch_id, &payload);

        let err = h
            .engine
            .settle(&mut h.batches, &mut h.oracle, &mut h.venue, batch_id, &payload, &atts)
            .unwrap_err();
        assert!(matches!(err, ConclaveError::CipherUnderflow));

        // The first transfer was not partially applied.
        assert_eq!(h.plaintext_balance(alice), 100);
        assert_eq!(h.plaintext_balance(bob), 0);
        assert_eq!(
            h.batches.batch(batch_id).unwrap().status,
            BatchStatus::Processing
        );
    }

    #[test]
    fn settlement_marks_items_done() {
        let mut h = harness();
        let alice = AccountId::new();
        h.fund(alice, 10);
        let batch_id = h.closed_batch(&[alice]);
        let payload = SettlementPayload { transfers: vec![], residual: None };
        let atts = h.attest(batch_id, &payload);

        h.engine
            .settle(&mut h.batches, &mut h.oracle, &mut h.venue, batch_id, &payload, &atts)
            .unwrap();

        let batch = h.batches.batch(batch_id).unwrap();
        for item_id in &batch.item_ids {
            assert_eq!(
                h.batches.work_item(*item_id).unwrap().status,
                WorkItemStatus::Done
            );
        }
    }

    #[test]
    fn partial_share_fractions_leave_undistributed_remainder() {
        let mut h = harness();
        let carol = AccountId::new();
        let dave = AccountId::new();
        h.fund(carol, 40);
        h.fund(dave, 60);

        let batch_id = h.closed_batch(&[carol, dave]);
        let payload = SettlementPayload {
            transfers: vec![],
            residual: Some(NetResidual {
                amount_in: 100,
                direction: SwapDirection::QuoteToBase,
                shares: vec![
                    ResidualShare { account: carol, exposure: 40, numerator: 1, denominator: 3 },
                    ResidualShare { account: dave, exposure: 60, numerator: 1, denominator: 3 },
                ],
            }),
        };
        let atts = h.attest(batch_id, &payload);

        let report = h
            .engine
            .settle(&mut h.batches, &mut h.oracle, &mut h.venue, batch_id, &payload, &atts)
            .unwrap();

        // 100 out; each share takes 33; 34 remains and is reported.
        assert_eq!(report.venue_amount_out, Some(100));
        assert_eq!(report.distributed, vec![(carol, 33), (dave, 33)]);
        assert_eq!(report.undistributed, 34);
        assert_eq!(h.plaintext_balance(carol), 33);
        assert_eq!(h.plaintext_balance(dave), 33);
    }
}
