//! Rotating proof-of-work admission for the admit services.
//!
//! A low-entropy secret is redrawn on a fixed period and published only as
//! `SHA-256(prefix ++ secret)`. Clients brute-force the secret and present it
//! as their `pow` token; the [`AdmissionGate`] compares it under a read lock.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod commitment;
pub mod error;
pub mod gate;
pub mod rotator;
pub mod secret;

pub use commitment::{commit, Commitment};
pub use error::CoreError;
pub use gate::{AdmissionGate, Challenge};
pub use rotator::{RotatorHandle, SecretRotator, EXEC_ROTATION_PERIOD, QUERY_ROTATION_PERIOD};
pub use secret::{AdmissionSecret, SecretGenerator, SecretPolicy, EXEC_SEED_MIX, QUERY_SEED_MIX};

/// Build a gate plus its rotator, with a freshly drawn boot secret.
#[must_use]
pub fn admission(policy: SecretPolicy, seed_mix: u64) -> (AdmissionGate, SecretRotator) {
    let prefix = policy.prefix().to_owned();
    let mut generator = SecretGenerator::from_clock(policy, seed_mix);
    let gate = AdmissionGate::new(prefix, generator.next(0));
    (gate.clone(), SecretRotator::new(gate, generator))
}
