//! Admission filter and confined build-and-run pipeline for untrusted Go
//! programs.
//!
//! Programs are refused unless they parse and declare no imports, then
//! compiled to a PIE binary under a build timeout and run under a stricter
//! timeout as an unprivileged user inside a chroot.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod program;
pub mod runner;
pub mod scratch;

pub use config::{SandboxConfig, MAX_PROGRAM_BYTES};
pub use error::SandboxError;
pub use pipeline::{BuildPipeline, PipelineReport, ProgramOutcome, Stage};
pub use process::LocalProcessRunner;
pub use program::{ProgramFilter, Rejection};
pub use runner::{CommandSpec, Confinement, ExitState, ProcessOutput, ProcessRunner};
pub use scratch::ScratchFile;
