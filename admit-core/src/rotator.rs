//! Background task that regenerates the admission secret on a fixed period.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::gate::AdmissionGate;
use crate::secret::SecretGenerator;

/// Rotation period of the execution service.
pub const EXEC_ROTATION_PERIOD: Duration = Duration::from_secs(30);

/// Rotation period of the query service.
pub const QUERY_ROTATION_PERIOD: Duration = Duration::from_secs(60);

/// Sole writer of an [`AdmissionGate`].
#[derive(Debug)]
pub struct SecretRotator {
    gate: AdmissionGate,
    generator: SecretGenerator,
}

impl SecretRotator {
    /// Create a rotator for `gate`.
    #[must_use]
    pub fn new(gate: AdmissionGate, generator: SecretGenerator) -> Self {
        Self { gate, generator }
    }

    /// Draw a new secret and swap it in.
    pub fn rotate_now(&mut self) {
        let epoch = self.gate.epoch().wrapping_add(1);
        let next = self.generator.next(epoch);
        tracing::trace!(epoch, secret = %next.value, "drew admission secret");
        tracing::info!(epoch, commitment = %next.commitment, "admission secret rotated");
        self.gate.replace(next);
    }

    /// Rotate every `period` on a background task.
    ///
    /// The first rotation happens one full period after spawning.
    #[must_use]
    pub fn spawn(mut self, period: Duration) -> RotatorHandle {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // `interval` completes its first tick immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.rotate_now();
            }
        });
        RotatorHandle { task }
    }
}

/// Owns the rotation task. Dropping the handle stops rotation.
#[derive(Debug)]
pub struct RotatorHandle {
    task: JoinHandle<()>,
}

impl RotatorHandle {
    /// Stop rotating.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for RotatorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
