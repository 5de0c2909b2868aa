//! The rotating admission secret and its generator.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::commitment::{commit, Commitment};
use crate::error::CoreError;

/// Alphabet the secret is drawn from.
pub const DEFAULT_ALPHABET: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Number of symbols in a secret. 62^3 candidates keeps client search short.
pub const DEFAULT_SECRET_LEN: usize = 3;

/// Seed constant for the execution service generator.
pub const EXEC_SEED_MIX: u64 = 0x00ca_feba_be90_9090;

/// Seed constant for the query service generator.
pub const QUERY_SEED_MIX: u64 = 0x00ca_feba_be59_1591;

/// Shape of the secrets a service hands out.
///
/// Fields are private so the alphabet is never empty and the length never
/// zero once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretPolicy {
    prefix: String,
    alphabet: Vec<char>,
    length: usize,
}

impl SecretPolicy {
    /// Policy with the default alphabet and length.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            alphabet: DEFAULT_ALPHABET.chars().collect(),
            length: DEFAULT_SECRET_LEN,
        }
    }

    /// Policy with a custom alphabet and length.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidPolicy`] if the alphabet is empty or the
    /// length is zero.
    pub fn with_shape(
        prefix: impl Into<String>,
        alphabet: &str,
        length: usize,
    ) -> Result<Self, CoreError> {
        if alphabet.is_empty() {
            return Err(CoreError::InvalidPolicy {
                reason: "alphabet is empty".to_owned(),
            });
        }
        if length == 0 {
            return Err(CoreError::InvalidPolicy {
                reason: "length must be non-zero".to_owned(),
            });
        }
        Ok(Self {
            prefix: prefix.into(),
            alphabet: alphabet.chars().collect(),
            length,
        })
    }

    /// Public prefix hashed in front of the secret.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Symbols a secret may contain. Never empty.
    #[must_use]
    pub fn alphabet(&self) -> &[char] {
        &self.alphabet
    }

    /// Symbols per secret. Never zero.
    #[must_use]
    pub fn length(&self) -> usize {
        self.length
    }
}

/// The single process-wide admission secret.
///
/// Only ever replaced wholesale, so `commitment` always belongs to `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct AdmissionSecret {
    /// The token clients must present.
    pub value: String,
    /// `SHA-256(prefix ++ value)`.
    pub commitment: Commitment,
    /// When this secret was drawn.
    pub generated_at: DateTime<Utc>,
    /// Rotation counter, starting at 0 for the boot secret.
    pub epoch: u64,
}

impl AdmissionSecret {
    /// Build a secret for `value`, computing its commitment under `prefix`.
    pub fn new(prefix: &str, value: impl Into<String>, epoch: u64) -> Self {
        let value = value.into();
        let commitment = commit(prefix, &value);
        Self {
            value,
            commitment,
            generated_at: Utc::now(),
            epoch,
        }
    }
}

/// Draws fresh secrets from a generator seeded once at startup.
#[derive(Debug)]
pub struct SecretGenerator {
    policy: SecretPolicy,
    rng: StdRng,
}

impl SecretGenerator {
    /// Seed from wall-clock seconds mixed with `seed_mix`.
    #[must_use]
    pub fn from_clock(policy: SecretPolicy, seed_mix: u64) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        Self::from_seed(policy, now ^ seed_mix)
    }

    /// Deterministic generator, for tests and reproducible deployments.
    #[must_use]
    pub fn from_seed(policy: SecretPolicy, seed: u64) -> Self {
        Self {
            policy,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The policy secrets are drawn under.
    #[must_use]
    pub fn policy(&self) -> &SecretPolicy {
        &self.policy
    }

    /// Draw the secret for `epoch`.
    pub fn next(&mut self, epoch: u64) -> AdmissionSecret {
        let alphabet = &self.policy.alphabet;
        let value: String = (0..self.policy.length)
            .map(|_| alphabet[self.rng.random_range(0..alphabet.len())])
            .collect();
        AdmissionSecret::new(&self.policy.prefix, value, epoch)
    }
}
