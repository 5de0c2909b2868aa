use std::fmt;

use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

/// SHA-256 commitment to the current admission secret.
///
/// Published to clients as 64 lowercase hex characters; clients search the
/// secret space until `SHA-256(prefix ++ candidate)` matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub struct Commitment(pub [u8; 32]);

impl Commitment {
    /// Creates a `Commitment` from a raw 32-byte digest.
    #[must_use]
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl Serialize for Commitment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Compute the commitment `SHA-256(prefix ++ value)`.
///
/// # Complexity
/// O(n) where n = len(prefix) + len(value).
#[must_use]
pub fn commit(prefix: &str, value: &str) -> Commitment {
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(value.as_bytes());
    Commitment::new(hasher.finalize().into())
}
