//! Operator attestations — ed25519 signatures over a 32-byte digest.
//!
//! An attestation carries the signer's identity explicitly (the identity
//! *is* the verifying key), so verification is: parse the key from the
//! identity, parse the signature, check it over the digest. A forged or
//! malformed attestation simply fails to verify — it is never an error,
//! it just doesn't count towards quorum.

use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};

use conclave_types::OperatorId;

/// One operator's signature over a result digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// The claimed signer. Counted towards quorum only if it is a
    /// committee member and the signature verifies against it.
    pub signer: OperatorId,
    /// Ed25519 signature bytes (64 bytes) over the digest.
    pub signature: Vec<u8>,
}

impl Attestation {
    /// Verify this attestation against a digest.
    ///
    /// Returns `false` for malformed keys or signatures — invalid input
    /// is indistinguishable from a bad signature on purpose.
    #[must_use]
    pub fn verify(&self, digest: &[u8; 32]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(self.signer.as_bytes()) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&self.signature) else {
            return false;
        };
        key.verify_strict(digest, &signature).is_ok()
    }
}

/// A signing operator identity for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
pub struct SigningOperator {
    key: ed25519_dalek::SigningKey,
}

#[cfg(any(test, feature = "test-helpers"))]
impl SigningOperator {
    /// Deterministic operator from a 32-byte seed.
    #[must_use]
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            key: ed25519_dalek::SigningKey::from_bytes(&seed),
        }
    }

    /// The operator identity (verifying key bytes).
    #[must_use]
    pub fn id(&self) -> OperatorId {
        OperatorId(self.key.verifying_key().to_bytes())
    }

    /// Sign a digest.
    #[must_use]
    pub fn attest(&self, digest: &[u8; 32]) -> Attestation {
        use ed25519_dalek::Signer;
        Attestation {
            signer: self.id(),
            signature: self.key.sign(digest).to_bytes().to_vec(),
        }
    }
}
