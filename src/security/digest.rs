//! SHA-256 content digest of a loaded module artifact.

use crate::error::{Error, Result};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// Length of a digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// A SHA-256 content digest, computed over a module's raw bytes at
/// load time and compared against the manifest-declared digest at
/// `process_spawn` (spec.md §4.9).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// Computes the digest of `bytes`.
    #[must_use]
    pub fn compute(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let result = hasher.finalize();
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(&result);
        Self(out)
    }

    /// Wraps a digest already computed elsewhere (e.g. from a manifest
    /// hex field).
    #[must_use]
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Verifies that `bytes` hashes to this digest.
    pub fn verify(&self, bytes: &[u8]) -> Result<()> {
        if Self::compute(bytes) == *self {
            Ok(())
        } else {
            Err(Error::invalid("module artifact digest mismatch"))
        }
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest(")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

/// A loaded module's content bytes plus the digest it was verified
/// against (spec.md §3.1, `ModuleArtifact`).
#[derive(Debug, Clone)]
pub struct ModuleArtifact {
    bytes: Vec<u8>,
    digest: Digest,
}

impl ModuleArtifact {
    /// Loads an artifact, computing its digest from content bytes and
    /// verifying it matches the manifest-declared digest.
    pub fn load(bytes: Vec<u8>, declared_digest: Digest) -> Result<Self> {
        declared_digest.verify(&bytes)?;
        Ok(Self { bytes, digest: declared_digest })
    }

    /// The artifact's raw bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The artifact's verified digest.
    #[must_use]
    pub const fn digest(&self) -> Digest {
        self.digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_produce_same_digest() {
        let a = Digest::compute(b"module bytes");
        let b = Digest::compute(b"module bytes");
        assert_eq!(a, b);
    }

    #[test]
    fn different_bytes_produce_different_digest() {
        let a = Digest::compute(b"module bytes one");
        let b = Digest::compute(b"module bytes two");
        assert_ne!(a, b);
    }

    #[test]
    fn verify_rejects_mismatched_bytes() {
        let digest = Digest::compute(b"original");
        assert!(digest.verify(b"tampered").is_err());
        assert!(digest.verify(b"original").is_ok());
    }

    #[test]
    fn artifact_load_rejects_wrong_declared_digest() {
        let wrong = Digest::compute(b"something else");
        assert!(ModuleArtifact::load(b"payload".to_vec(), wrong).is_err());

        let correct = Digest::compute(b"payload");
        let artifact = ModuleArtifact::load(b"payload".to_vec(), correct).unwrap();
        assert_eq!(artifact.bytes(), b"payload");
    }
}
