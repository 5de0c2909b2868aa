//! Error types for the sandbox crate.

use std::path::PathBuf;

/// Errors that can occur while handling a submitted program.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SandboxError {
    /// A scratch file could not be created.
    #[error("failed to create temporary file in {dir}: {source}")]
    ScratchCreate {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A scratch file could not be written or flushed.
    #[error("failed to write temporary file {path}: {source}")]
    ScratchWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A process could not be started.
    #[error("spawn failed for {program}: {source}")]
    SpawnFailed {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The Go grammar could not be loaded into the parser.
    #[error("grammar unavailable: {0}")]
    Grammar(String),

    /// The sandbox configuration is inconsistent.
    #[error("invalid sandbox config: {0}")]
    InvalidConfig(String),

    /// Underlying I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
