//! Opaque handles to confidential values.
//!
//! The core never sees plaintext amounts. Every confidential value lives
//! behind a [`CipherHandle`] issued by the confidential-value oracle; the
//! core stores, compares, and forwards handles, and only a quorum-approved
//! off-ledger decryption ever turns one back into a number.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque 32-byte handle to an encrypted value held by the oracle.
///
/// Handles are equality-comparable (same handle = same ciphertext) but
/// reveal nothing about the underlying plaintext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CipherHandle(pub [u8; 32]);

impl CipherHandle {
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for CipherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ct:{}", hex::encode(&self.0[..8]))
    }
}

/// Identifier for an in-flight decryption request.
///
/// Decryption is a two-phase request/poll flow — the oracle never blocks
/// the ledger. The request id is returned by `request_decrypt` and polled
/// until the plaintext is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct DecryptRequestId(pub u64);

impl fmt::Display for DecryptRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dr:{}", self.0)
    }
}
