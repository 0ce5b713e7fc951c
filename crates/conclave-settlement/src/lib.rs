//! # conclave-settlement
//!
//! **Settlement and tournament engines**: applying consensus-approved
//! results to the ledger of record.
//!
//! ## Architecture
//!
//! The settlement engine receives a quorum-attested [`conclave_types::SettlementPayload`]
//! for a PROCESSING batch and:
//! 1. Fails the status gate for everyone but the first caller (no
//!    double-settlement — the status check is the lock)
//! 2. Validates residual shares before any mutation
//! 3. Verifies quorum against the batch's snapshotted committee
//! 4. Routes the net residual through the venue, at most once
//! 5. Applies internalized transfers and residual flows atomically
//!
//! The tournament engine layers ranking, capital allocation, and
//! per-action vault execution over the same committee/consensus
//! primitives.
//!
//! External collaborators — the confidential-value oracle, the liquidity
//! venue, the custody vault — are traits here, with mock adapters behind
//! the `test-helpers` feature.

pub mod balances;
pub mod engine;
pub mod oracle;
pub mod tournament;
pub mod vault;
pub mod venue;

pub use balances::EncryptedBalances;
pub use engine::{SettlementEngine, SettlementReport};
pub use oracle::CipherOracle;
pub use tournament::TournamentEngine;
pub use vault::{CustodyVault, ExecOutcome};
pub use venue::LiquidityVenue;

#[cfg(any(test, feature = "test-helpers"))]
pub use oracle::MockCipherOracle;
#[cfg(any(test, feature = "test-helpers"))]
pub use vault::MockVault;
#[cfg(any(test, feature = "test-helpers"))]
pub use venue::MockVenue;
