//! The custody vault interface.
//!
//! The vault's generic execute-call capability **never fails the
//! caller**: failure comes back as data, so the tournament engine can
//! record per-action outcomes and keep going. Partial execution is an
//! expected state of the world, not an error.

/// Result of one vault call — success flag plus raw return data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Whether the call succeeded at the vault.
    pub success: bool,
    /// Raw return data (or failure data) from the target.
    pub return_data: Vec<u8>,
}

/// Generic execute-call capability over custodied funds.
pub trait CustodyVault {
    /// Execute a call against `target` with `payload` and attached `value`.
    /// Infallible by contract — failures are reported in the outcome.
    fn execute(&mut self, target: [u8; 32], payload: &[u8], value: u64) -> ExecOutcome;
}

/// Recording vault for tests, with per-target failure injection.
/// **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
pub use mock::{MockVault, VaultCall};

#[cfg(any(test, feature = "test-helpers"))]
mod mock {
    use std::collections::HashSet;

    use super::{CustodyVault, ExecOutcome};

    /// One recorded vault invocation.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct VaultCall {
        pub target: [u8; 32],
        pub payload: Vec<u8>,
        pub value: u64,
    }

    /// Logs every call; calls against failing targets report failure.
    #[derive(Debug, Default)]
    pub struct MockVault {
        failing_targets: HashSet<[u8; 32]>,
        /// Every call attempted, successful or not.
        pub calls: Vec<VaultCall>,
    }

    impl MockVault {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// All calls against `target` will report failure.
        pub fn fail_target(&mut self, target: [u8; 32]) {
            self.failing_targets.insert(target);
        }
    }

    impl CustodyVault for MockVault {
        fn execute(&mut self, target: [u8; 32], payload: &[u8], value: u64) -> ExecOutcome {
            self.calls.push(VaultCall {
                target,
                payload: payload.to_vec(),
                value,
            });
            if self.failing_targets.contains(&target) {
                ExecOutcome {
                    success: false,
                    return_data: b"reverted".to_vec(),
                }
            } else {
                ExecOutcome {
                    success: true,
                    return_data: Vec::new(),
                }
            }
        }
    }
}
