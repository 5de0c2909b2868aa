//! Build-and-run pipeline for one submitted program.
//!
//! Stages follow `Received → SyntaxChecked → ImportChecked → Building →
//! Built|BuildFailed → Running → Completed|RunFailed → CleanedUp`. Every
//! scratch file is owned by a [`ScratchFile`] guard local to one request, so
//! `CleanedUp` is reached on every path, including errors.

use std::time::Duration;

use tracing::Instrument;
use uuid::Uuid;

use crate::config::SandboxConfig;
use crate::program::{ProgramFilter, Rejection};
use crate::runner::{CommandSpec, Confinement, ProcessOutput, ProcessRunner};
use crate::scratch::ScratchFile;
use crate::SandboxError;

/// Compiler diagnostics kept for the server log.
const BUILD_LOG_BYTES: usize = 64 * 1024;

/// A point in the request state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Stage {
    Received,
    SyntaxChecked,
    ImportChecked,
    Building,
    Built,
    BuildFailed,
    Running,
    Completed,
    RunFailed,
    CleanedUp,
}

/// What the client gets back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramOutcome {
    /// Refused by the static filter; nothing was built.
    Rejected(Rejection),
    /// The compiler failed or timed out.
    BuildFailed,
    /// The artifact ran. Output is returned verbatim whatever the exit state.
    Ran(ProcessOutput),
}

/// Outcome plus the stages visited to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct PipelineReport {
    pub outcome: ProgramOutcome,
    /// Always ends in [`Stage::CleanedUp`].
    pub trail: Vec<Stage>,
}

#[derive(Debug, Default)]
struct Trail(Vec<Stage>);

impl Trail {
    fn enter(&mut self, stage: Stage) {
        tracing::debug!(?stage, "pipeline stage");
        self.0.push(stage);
    }
}

/// Builds and runs submitted Go programs that pass the filter.
///
/// # Cancel Safety
/// Cancel safe. Dropping the future kills any running child via the runner
/// and removes scratch files via their guards.
pub struct BuildPipeline<R: ProcessRunner> {
    runner: R,
    config: SandboxConfig,
    filter: ProgramFilter,
}

impl<R: ProcessRunner> BuildPipeline<R> {
    /// Create a pipeline after validating `config`.
    ///
    /// # Errors
    /// Returns [`SandboxError::InvalidConfig`] if the layout is unsafe.
    pub fn new(runner: R, config: SandboxConfig) -> Result<Self, SandboxError> {
        config.validate()?;
        Ok(Self {
            runner,
            config,
            filter: ProgramFilter::new(),
        })
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// The process backend.
    #[must_use]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Take `source` through the whole pipeline.
    ///
    /// # Errors
    /// Returns [`SandboxError::ScratchCreate`] or [`SandboxError::ScratchWrite`]
    /// if scratch files cannot be made, and [`SandboxError::SpawnFailed`] if the
    /// confined run cannot start. Rejections and build failures are outcomes,
    /// not errors.
    pub async fn execute(&self, source: &[u8]) -> Result<PipelineReport, SandboxError> {
        let span = tracing::info_span!(
            "pipeline",
            request = %Uuid::new_v4().simple(),
            bytes = source.len()
        );
        async {
            let mut trail = Trail::default();
            trail.enter(Stage::Received);
            let result = self.execute_scoped(source, &mut trail).await;
            // Scratch guards were dropped when `execute_scoped` returned.
            trail.enter(Stage::CleanedUp);
            result.map(|outcome| PipelineReport {
                outcome,
                trail: trail.0,
            })
        }
        .instrument(span)
        .await
    }

    async fn execute_scoped(
        &self,
        source: &[u8],
        trail: &mut Trail,
    ) -> Result<ProgramOutcome, SandboxError> {
        let source_file =
            ScratchFile::with_contents(&self.config.upload_dir, "upload_", ".go", source).await?;

        match self.filter.check(source)? {
            Ok(()) => {
                trail.enter(Stage::SyntaxChecked);
                trail.enter(Stage::ImportChecked);
            }
            Err(rejection) => {
                if rejection == Rejection::Imports {
                    trail.enter(Stage::SyntaxChecked);
                }
                tracing::info!(%rejection, "program rejected");
                return Ok(ProgramOutcome::Rejected(rejection));
            }
        }

        let artifact = ScratchFile::create(&self.config.build_dir, "go-build", "").await?;

        trail.enter(Stage::Building);
        let build = CommandSpec::new(&self.config.go_binary, self.config.build_timeout)
            .arg("build")
            .arg("-buildmode=pie")
            .arg("-o")
            .arg(artifact.path())
            .arg(source_file.path())
            .in_dir(&self.config.upload_dir)
            .max_output(BUILD_LOG_BYTES);

        match self.runner.run(&build).await {
            Ok(out) if out.success() => trail.enter(Stage::Built),
            Ok(out) => {
                tracing::warn!(
                    exit = ?out.exit,
                    diagnostics = %String::from_utf8_lossy(&out.combined),
                    "build failed"
                );
                trail.enter(Stage::BuildFailed);
                return Ok(ProgramOutcome::BuildFailed);
            }
            Err(e) => {
                tracing::error!(error = %e, "build could not start");
                trail.enter(Stage::BuildFailed);
                return Ok(ProgramOutcome::BuildFailed);
            }
        }

        trail.enter(Stage::Running);
        let in_jail = self.config.path_in_jail(artifact.path())?;
        let run = CommandSpec::new(in_jail, self.config.run_timeout)
            .confined(Confinement::new(
                self.config.jail_root.clone(),
                self.config.sandbox_uid,
                self.config.sandbox_gid,
            ))
            .cpu_limit(cpu_seconds(self.config.run_timeout))
            .max_output(self.config.max_output_bytes);

        let output = self.runner.run(&run).await?;
        tracing::info!(
            exit = ?output.exit,
            elapsed_ms = u64::try_from(output.elapsed.as_millis()).unwrap_or(u64::MAX),
            bytes = output.combined.len(),
            truncated = output.truncated,
            "run completed"
        );
        trail.enter(if output.success() { Stage::Completed } else { Stage::RunFailed });

        drop(artifact);
        drop(source_file);
        Ok(ProgramOutcome::Ran(output))
    }
}

/// CPU budget matching a wall-clock limit, at least one second.
fn cpu_seconds(wall: Duration) -> u64 {
    wall.as_secs().max(1)
}
