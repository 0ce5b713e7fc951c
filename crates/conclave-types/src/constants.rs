//! System-wide constants for the Conclave coordination engine.

/// Default committee size per batch/epoch.
pub const DEFAULT_COMMITTEE_SIZE: usize = 5;

/// Default minimum distinct attestations required to accept a result.
pub const DEFAULT_ATTESTATION_THRESHOLD: usize = 3;

/// Default idle bound on an open batch before it is rolled, in milliseconds.
pub const DEFAULT_MAX_BATCH_AGE_MS: u64 = 60_000;

/// Maximum work items collected into a single batch before it is rolled.
pub const DEFAULT_MAX_ITEMS_PER_BATCH: usize = 10_000;

/// Default idle bound on an open epoch, in milliseconds (24 hours).
pub const DEFAULT_MAX_EPOCH_OPEN_MS: u64 = 86_400_000;

/// Capital-allocation weights must sum to exactly this value.
pub const WEIGHT_DENOMINATOR: u32 = 100;

/// Ed25519 signature length in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "Conclave";
