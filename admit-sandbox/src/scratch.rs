//! Request-scoped scratch files.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::SandboxError;

/// A uniquely named file that is deleted when the handle is dropped.
///
/// Names are `<prefix><uuid><suffix>` and created with `create_new`, so two
/// requests sharing a directory never touch each other's files.
#[derive(Debug)]
#[must_use = "dropping a ScratchFile deletes it"]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Create an empty file in `dir`.
    ///
    /// The filesystem work runs on tokio's blocking pool. If this future is
    /// dropped early the finished guard is dropped with the task output, so
    /// the file is still removed.
    ///
    /// # Errors
    /// Returns [`SandboxError::ScratchCreate`] if the file cannot be created.
    pub async fn create(dir: &Path, prefix: &str, suffix: &str) -> Result<Self, SandboxError> {
        let (owned_dir, prefix, suffix) = (dir.to_owned(), prefix.to_owned(), suffix.to_owned());
        let task = tokio::task::spawn_blocking(move || {
            Self::create_blocking(&owned_dir, &prefix, &suffix)
        });
        task.await.map_err(|e| SandboxError::ScratchCreate {
            dir: dir.to_owned(),
            source: io::Error::other(e),
        })?
    }

    /// Create a file in `dir` holding `contents`.
    ///
    /// On a write failure the partially written file is removed before the
    /// error is returned.
    ///
    /// # Errors
    /// Returns [`SandboxError::ScratchCreate`] or [`SandboxError::ScratchWrite`].
    pub async fn with_contents(
        dir: &Path,
        prefix: &str,
        suffix: &str,
        contents: &[u8],
    ) -> Result<Self, SandboxError> {
        let (owned_dir, prefix, suffix) = (dir.to_owned(), prefix.to_owned(), suffix.to_owned());
        let contents = contents.to_vec();
        let task = tokio::task::spawn_blocking(move || -> Result<Self, SandboxError> {
            let scratch = Self::create_blocking(&owned_dir, &prefix, &suffix)?;
            scratch.fill(&contents)?;
            Ok(scratch)
        });
        task.await.map_err(|e| SandboxError::ScratchCreate {
            dir: dir.to_owned(),
            source: io::Error::other(e),
        })?
    }

    fn create_blocking(dir: &Path, prefix: &str, suffix: &str) -> Result<Self, SandboxError> {
        let path = dir.join(format!("{prefix}{}{suffix}", Uuid::new_v4().simple()));
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| SandboxError::ScratchCreate {
                dir: dir.to_owned(),
                source,
            })?;
        Ok(Self { path })
    }

    fn fill(&self, contents: &[u8]) -> Result<(), SandboxError> {
        OpenOptions::new()
            .write(true)
            .open(&self.path)
            .and_then(|mut file| {
                file.write_all(contents)?;
                file.sync_all()
            })
            .map_err(|source| SandboxError::ScratchWrite {
                path: self.path.clone(),
                source,
            })
    }

    /// Location on the host filesystem.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final path component.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "scratch file removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::error!(
                path = %self.path.display(),
                error = %e,
                "failed to remove scratch file"
            ),
        }
    }
}
