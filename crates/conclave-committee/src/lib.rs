//! # conclave-committee
//!
//! Operator registry and deterministic committee selection.
//!
//! The registry is the single owner of the active operator set; the
//! selector is a pure function over that set, a seed source, and a task
//! id. Committees produced here are snapshotted into their batch/epoch
//! at the close transition, so registry churn never touches in-flight
//! work.

pub mod registry;
pub mod selector;

pub use registry::OperatorRegistry;
pub use selector::{BeaconRandomness, CommitteeSelector, FixedRandomness, RandomnessSource};
