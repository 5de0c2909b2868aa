//! Process runner abstraction.
//!
//! Allows swapping the local process backend for a container or microVM
//! layer without changing the build pipeline. Whatever the mechanism, a
//! runner bounds wall-clock time and applies the requested confinement. No
//! process may outlive `run`.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::SandboxError;

/// Filesystem root and identity a confined process runs under.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Confinement {
    /// New filesystem root.
    pub root: PathBuf,
    /// Uid after the privilege drop.
    pub uid: u32,
    /// Gid after the privilege drop.
    pub gid: u32,
}

impl Confinement {
    /// Create a confinement spec.
    #[must_use]
    pub fn new(root: PathBuf, uid: u32, gid: u32) -> Self {
        Self { root, uid, gid }
    }
}

/// A single bounded process invocation.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CommandSpec {
    /// Program to execute. For confined runs this is resolved inside `root`.
    pub program: PathBuf,
    /// Arguments after the program name.
    pub args: Vec<OsString>,
    /// Working directory. Ignored under confinement, which always uses `/`.
    pub working_dir: Option<PathBuf>,
    /// Hard wall-clock limit; the process group is killed when it expires.
    pub wall_timeout: Duration,
    /// Optional `RLIMIT_CPU` in seconds.
    pub cpu_limit_secs: Option<u64>,
    /// Chroot plus privilege drop, if any.
    pub confinement: Option<Confinement>,
    /// Start from an empty environment.
    pub clear_env: bool,
    /// Cap on captured combined output.
    pub max_output_bytes: usize,
}

impl CommandSpec {
    /// An unconfined invocation inheriting the service environment.
    pub fn new(program: impl Into<PathBuf>, wall_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            wall_timeout,
            cpu_limit_secs: None,
            confinement: None,
            clear_env: false,
            max_output_bytes: usize::MAX,
        }
    }

    /// Append an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Confine the process to `confinement` with an empty environment.
    #[must_use]
    pub fn confined(mut self, confinement: Confinement) -> Self {
        self.confinement = Some(confinement);
        self.clear_env = true;
        self
    }

    /// Set the CPU-seconds limit.
    #[must_use]
    pub fn cpu_limit(mut self, secs: u64) -> Self {
        self.cpu_limit_secs = Some(secs);
        self
    }

    /// Set the output cap.
    #[must_use]
    pub fn max_output(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExitState {
    /// Exited on its own with this code.
    Exited(i32),
    /// Killed by this signal, not by the runner's timeout.
    Signaled(i32),
    /// Killed by the runner after the wall-clock limit.
    TimedOut,
}

/// Captured result of a process run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ProcessOutput {
    /// Interleaved stdout and stderr bytes.
    pub combined: Vec<u8>,
    /// Exit state.
    pub exit: ExitState,
    /// Wall-clock time from spawn to reap.
    pub elapsed: Duration,
    /// `true` if output beyond the cap was discarded.
    pub truncated: bool,
}

impl ProcessOutput {
    /// Assemble a result.
    #[must_use]
    pub fn new(combined: Vec<u8>, exit: ExitState, elapsed: Duration, truncated: bool) -> Self {
        Self {
            combined,
            exit,
            elapsed,
            truncated,
        }
    }

    /// `true` only for a zero exit code.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit == ExitState::Exited(0)
    }
}

/// Executes bounded external processes.
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Cancel Safety
/// Dropping the future must not leave the child running.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command` to completion or timeout.
    ///
    /// A timeout, non-zero exit, or crash is reported through
    /// [`ProcessOutput::exit`], not as an error.
    ///
    /// # Errors
    /// Returns [`SandboxError::SpawnFailed`] if the process cannot be
    /// started, including when confinement cannot be applied.
    async fn run(&self, command: &CommandSpec) -> Result<ProcessOutput, SandboxError>;
}
