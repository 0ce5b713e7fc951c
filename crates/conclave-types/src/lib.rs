//! # conclave-types
//!
//! Shared types, errors, and configuration for the **Conclave**
//! operator-committee coordination and confidential settlement engine.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`OperatorId`], [`AccountId`], [`WorkItemId`], [`BatchId`], [`EpochId`]
//! - **Confidential values**: [`CipherHandle`], [`DecryptRequestId`]
//! - **Work item model**: [`WorkItem`], [`WorkItemStatus`]
//! - **Batch model**: [`Batch`], [`BatchStatus`], [`SettlementPayload`], [`NetResidual`]
//! - **Epoch model**: [`Epoch`], [`EpochPhase`], [`Submission`], [`ActionNode`], [`Winner`]
//! - **Configuration**: [`CommitteeConfig`], [`BatchConfig`], [`EpochConfig`]
//! - **Errors**: [`ConclaveError`] with `CL_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod batch;
pub mod cipher;
pub mod config;
pub mod constants;
pub mod epoch;
pub mod error;
pub mod ids;
pub mod work_item;

// Re-export all primary types at crate root for ergonomic imports:
//   use conclave_types::{Batch, Epoch, WorkItem, ConclaveError, ...};

pub use batch::*;
pub use cipher::*;
pub use config::*;
pub use epoch::*;
pub use error::*;
pub use ids::*;
pub use work_item::*;

// Constants are accessed via `conclave_types::constants::FOO`
// (not re-exported to avoid name collisions).
