//! Admission gate over the shared rotating secret.

use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::commitment::Commitment;
use crate::error::CoreError;
use crate::secret::AdmissionSecret;

/// Public proof-of-work challenge: everything a client may learn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct Challenge {
    /// Fixed public prefix.
    pub prefix: String,
    /// Commitment to the current secret.
    #[serde(rename = "challenge")]
    pub commitment: Commitment,
    /// Rotation counter of the secret behind `commitment`.
    pub epoch: u64,
}

/// Thread-safe holder of the current [`AdmissionSecret`].
///
/// Clones share the same secret. Readers never block each other; the
/// rotator's write is a single struct swap.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    prefix: Arc<str>,
    current: Arc<RwLock<AdmissionSecret>>,
}

impl AdmissionGate {
    /// Create a gate holding `initial`.
    pub fn new(prefix: impl Into<Arc<str>>, initial: AdmissionSecret) -> Self {
        Self {
            prefix: prefix.into(),
            current: Arc::new(RwLock::new(initial)),
        }
    }

    /// Accept `token` only if it equals the current secret.
    ///
    /// The read lock covers the comparison and nothing else.
    ///
    /// # Errors
    /// Returns [`CoreError::WrongToken`] on mismatch.
    ///
    /// # Panics
    /// Panics if the internal `RwLock` is poisoned.
    pub fn admit(&self, token: &str) -> Result<(), CoreError> {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        let matches = self
            .current
            .read()
            .expect("admission secret read lock poisoned")
            .value
            == token;
        if matches {
            Ok(())
        } else {
            tracing::warn!("admission token rejected");
            Err(CoreError::WrongToken)
        }
    }

    /// Snapshot the public `{prefix, commitment}` pair.
    ///
    /// # Panics
    /// Panics if the internal `RwLock` is poisoned.
    #[must_use]
    pub fn challenge(&self) -> Challenge {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        let (commitment, epoch) = {
            let guard = self.current.read().expect("admission secret read lock poisoned");
            (guard.commitment, guard.epoch)
        };
        Challenge {
            prefix: self.prefix.to_string(),
            commitment,
            epoch,
        }
    }

    /// The public prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Replace the secret. Only the rotator calls this.
    ///
    /// # Panics
    /// Panics if the internal `RwLock` is poisoned.
    pub(crate) fn replace(&self, next: AdmissionSecret) {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        let mut guard = self.current.write().expect("admission secret write lock poisoned");
        *guard = next;
    }

    /// Current rotation counter.
    ///
    /// # Panics
    /// Panics if the internal `RwLock` is poisoned.
    pub(crate) fn epoch(&self) -> u64 {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        self.current.read().expect("admission secret read lock poisoned").epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::commit;

    fn gate_with(value: &str) -> AdmissionGate {
        AdmissionGate::new("pfx_", AdmissionSecret::new("pfx_", value, 0))
    }

    #[test]
    fn gate_admits_exact_token_only() {
        let gate = gate_with("a1Z");
        assert!(gate.admit("a1Z").is_ok());
        assert!(matches!(gate.admit("a1z"), Err(CoreError::WrongToken)));
        assert!(matches!(gate.admit(""), Err(CoreError::WrongToken)));
        assert!(matches!(gate.admit("a1Z "), Err(CoreError::WrongToken)));
    }

    #[test]
    fn previous_token_fails_once_replaced() {
        let gate = gate_with("old");
        gate.replace(AdmissionSecret::new("pfx_", "new", 1));
        assert!(gate.admit("old").is_err(), "stale token must be rejected after rotation");
        assert!(gate.admit("new").is_ok());
    }

    #[test]
    fn challenge_tracks_current_secret() {
        let gate = gate_with("abc");
        assert_eq!(gate.challenge().commitment, commit("pfx_", "abc"));
        gate.replace(AdmissionSecret::new("pfx_", "xyz", 1));
        let challenge = gate.challenge();
        assert_eq!(challenge.commitment, commit("pfx_", "xyz"));
        assert_eq!(challenge.epoch, 1);
        assert_eq!(challenge.prefix, "pfx_");
    }

    #[test]
    fn clones_share_one_secret() {
        let gate = gate_with("one");
        let reader = gate.clone();
        gate.replace(AdmissionSecret::new("pfx_", "two", 1));
        assert!(reader.admit("two").is_ok());
        assert_eq!(reader.challenge(), gate.challenge());
    }

    #[test]
    fn challenge_json_uses_challenge_key() {
        let gate = gate_with("000");
        let json = match serde_json::to_value(gate.challenge()) {
            Ok(v) => v,
            Err(e) => panic!("serialization failed: {e}"),
        };
        assert_eq!(json["prefix"], "pfx_");
        assert_eq!(json["challenge"], commit("pfx_", "000").to_string());
        assert_eq!(json["epoch"], 0);
    }
}
