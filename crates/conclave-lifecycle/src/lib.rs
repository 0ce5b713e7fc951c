//! # conclave-lifecycle
//!
//! Batch and epoch lifecycle state machines.
//!
//! The managers here are the exclusive owners of batch, work item, epoch,
//! and submission state. Every transition is an atomic, serialized
//! operation; the status field is the lock that makes racing callers fail
//! cleanly instead of double-applying an effect.

pub mod batch_manager;
pub mod epoch_manager;

pub use batch_manager::BatchManager;
pub use epoch_manager::EpochManager;
