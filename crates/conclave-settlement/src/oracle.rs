//! The confidential-value oracle interface.
//!
//! The oracle is an opaque capability: produce an encrypted handle,
//! combine handles homomorphically, request a decryption, poll until the
//! plaintext is ready. Decryption is **never** synchronous — the core
//! only ever polls, so an arbitrarily slow oracle can never stall a
//! ledger transition.

use conclave_types::{CipherHandle, DecryptRequestId, Result};

/// Opaque capability over encrypted 64-bit values.
pub trait CipherOracle {
    /// Encrypt a plaintext, returning a fresh handle.
    fn encrypt(&mut self, plaintext: u64) -> CipherHandle;

    /// Homomorphic addition of two ciphertexts.
    ///
    /// # Errors
    /// Fails on unknown handles or overflow.
    fn add(&mut self, a: CipherHandle, b: CipherHandle) -> Result<CipherHandle>;

    /// Homomorphic subtraction `a - b`.
    ///
    /// # Errors
    /// Fails on unknown handles or underflow.
    fn sub(&mut self, a: CipherHandle, b: CipherHandle) -> Result<CipherHandle>;

    /// Fire-and-forget decryption request.
    ///
    /// # Errors
    /// Fails on unknown handles.
    fn request_decrypt(&mut self, handle: CipherHandle) -> Result<DecryptRequestId>;

    /// Poll a decryption request. `Ok(None)` means not ready yet.
    ///
    /// # Errors
    /// Fails on unknown request ids.
    fn poll_decrypt(&mut self, request: DecryptRequestId) -> Result<Option<u64>>;
}

/// In-memory oracle for tests: plaintexts in a map, handles derived from
/// a counter, decryption ready after a configurable number of polls.
/// **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
pub use mock::MockCipherOracle;

#[cfg(any(test, feature = "test-helpers"))]
mod mock {
    use std::collections::HashMap;

    use conclave_types::{CipherHandle, ConclaveError, DecryptRequestId, Result};
    use sha2::{Digest, Sha256};

    use super::CipherOracle;

    /// Plaintext-backed mock oracle.
    #[derive(Debug, Default)]
    pub struct MockCipherOracle {
        plaintexts: HashMap<CipherHandle, u64>,
        pending: HashMap<DecryptRequestId, (CipherHandle, u32)>,
        handle_counter: u64,
        request_counter: u64,
        /// Polls required before a decryption is ready.
        decrypt_latency: u32,
    }

    impl MockCipherOracle {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Mock with decryptions that need `latency` polls to become ready.
        #[must_use]
        pub fn with_decrypt_latency(latency: u32) -> Self {
            Self {
                decrypt_latency: latency,
                ..Self::default()
            }
        }

        /// Direct plaintext access for test assertions, bypassing the
        /// request/poll flow.
        #[must_use]
        pub fn plaintext_of(&self, handle: CipherHandle) -> Option<u64> {
            self.plaintexts.get(&handle).copied()
        }

        fn fresh_handle(&mut self) -> CipherHandle {
            self.handle_counter += 1;
            let mut hasher = Sha256::new();
            hasher.update(b"conclave:mock-ct:");
            hasher.update(self.handle_counter.to_le_bytes());
            CipherHandle(hasher.finalize().into())
        }

        fn plaintext(&self, handle: CipherHandle) -> Result<u64> {
            self.plaintexts
                .get(&handle)
                .copied()
                .ok_or(ConclaveError::UnknownHandle(handle))
        }
    }

    impl CipherOracle for MockCipherOracle {
        fn encrypt(&mut self, plaintext: u64) -> CipherHandle {
            let handle = self.fresh_handle();
            self.plaintexts.insert(handle, plaintext);
            handle
        }

        fn add(&mut self, a: CipherHandle, b: CipherHandle) -> Result<CipherHandle> {
            let sum = self
                .plaintext(a)?
                .checked_add(self.plaintext(b)?)
                .ok_or_else(|| ConclaveError::OracleFailure {
                    reason: "ciphertext addition overflow".into(),
                })?;
            Ok(self.encrypt(sum))
        }

        fn sub(&mut self, a: CipherHandle, b: CipherHandle) -> Result<CipherHandle> {
            let diff = self
                .plaintext(a)?
                .checked_sub(self.plaintext(b)?)
                .ok_or(ConclaveError::CipherUnderflow)?;
            Ok(self.encrypt(diff))
        }

        fn request_decrypt(&mut self, handle: CipherHandle) -> Result<DecryptRequestId> {
            self.plaintext(handle)?;
            self.request_counter += 1;
            let id = DecryptRequestId(self.request_counter);
            self.pending.insert(id, (handle, self.decrypt_latency));
            Ok(id)
        }

        fn poll_decrypt(&mut self, request: DecryptRequestId) -> Result<Option<u64>> {
            let (handle, remaining) =
                self.pending
                    .get_mut(&request)
                    .ok_or_else(|| ConclaveError::OracleFailure {
                        reason: format!("unknown decrypt request {request}"),
                    })?;
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(None);
            }
            let handle = *handle;
            self.plaintext(handle).map(Some)
        }
    }
}
