//! Sandbox layout and limits.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::SandboxError;

/// Largest accepted program, in bytes.
pub const MAX_PROGRAM_BYTES: usize = 10 * 1024;

/// Hard wall-clock limit on `go build`.
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(5);

/// Hard wall-clock limit on running the artifact.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(1);

/// Captured output beyond this many bytes is discarded.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Unprivileged identity the artifact runs as.
pub const DEFAULT_SANDBOX_ID: u32 = 1000;

/// Filesystem layout and limits for the build-and-run pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct SandboxConfig {
    /// Where uploaded sources are persisted. Must lie outside `jail_root`.
    pub upload_dir: PathBuf,

    /// Filesystem root the artifact is confined to.
    pub jail_root: PathBuf,

    /// Where artifacts are written. Must lie inside `jail_root`.
    pub build_dir: PathBuf,

    /// The `go` binary used for builds.
    pub go_binary: PathBuf,

    /// Wall-clock limit on the build.
    pub build_timeout: Duration,

    /// Wall-clock limit on the run.
    pub run_timeout: Duration,

    /// Uid the artifact runs as.
    pub sandbox_uid: u32,

    /// Gid the artifact runs as.
    pub sandbox_gid: u32,

    /// Cap on captured run output.
    pub max_output_bytes: usize,
}

impl SandboxConfig {
    /// Create a config with the default limits and identities.
    ///
    /// # Arguments
    /// - `upload_dir`: scratch directory for uploaded sources
    /// - `jail_root`: confinement root for the artifact
    /// - `build_dir`: scratch directory for artifacts, under `jail_root`
    #[must_use]
    pub fn new(upload_dir: PathBuf, jail_root: PathBuf, build_dir: PathBuf) -> Self {
        Self {
            upload_dir,
            jail_root,
            build_dir,
            go_binary: PathBuf::from("go"),
            build_timeout: DEFAULT_BUILD_TIMEOUT,
            run_timeout: DEFAULT_RUN_TIMEOUT,
            sandbox_uid: DEFAULT_SANDBOX_ID,
            sandbox_gid: DEFAULT_SANDBOX_ID,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    /// Check the layout invariants.
    ///
    /// # Errors
    /// Returns [`SandboxError::InvalidConfig`] if `build_dir` is not inside
    /// `jail_root`, if `upload_dir` is inside it, or if the sandbox identity
    /// is root.
    pub fn validate(&self) -> Result<(), SandboxError> {
        if !self.jail_root.is_absolute() || !self.build_dir.is_absolute() {
            return Err(SandboxError::InvalidConfig(
                "jail_root and build_dir must be absolute".to_owned(),
            ));
        }
        if self.build_dir == self.jail_root || !self.build_dir.starts_with(&self.jail_root) {
            return Err(SandboxError::InvalidConfig(format!(
                "build_dir {} must be a subdirectory of jail_root {}",
                self.build_dir.display(),
                self.jail_root.display()
            )));
        }
        if self.upload_dir.starts_with(&self.jail_root) {
            return Err(SandboxError::InvalidConfig(format!(
                "upload_dir {} must not be visible from the jail",
                self.upload_dir.display()
            )));
        }
        if self.sandbox_uid == 0 || self.sandbox_gid == 0 {
            return Err(SandboxError::InvalidConfig("sandbox identity must not be root".to_owned()));
        }
        Ok(())
    }

    /// Path of `artifact` as seen from inside the jail.
    ///
    /// # Errors
    /// Returns [`SandboxError::InvalidConfig`] if `artifact` is outside `jail_root`.
    pub fn path_in_jail(&self, artifact: &Path) -> Result<PathBuf, SandboxError> {
        artifact
            .strip_prefix(&self.jail_root)
            .map(|rel| Path::new("/").join(rel))
            .map_err(|_| {
                SandboxError::InvalidConfig(format!(
                    "artifact {} is outside jail {}",
                    artifact.display(),
                    self.jail_root.display()
                ))
            })
    }
}

impl Default for SandboxConfig {
    /// The layout of the original deployment.
    fn default() -> Self {
        Self::new(
            PathBuf::from("/uploads"),
            PathBuf::from("/home/ctf"),
            PathBuf::from("/home/ctf/builds"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_is_valid() {
        assert!(SandboxConfig::default().validate().is_ok());
    }

    #[test]
    fn build_dir_outside_jail_is_rejected() {
        let cfg = SandboxConfig::new("/uploads".into(), "/home/ctf".into(), "/tmp/builds".into());
        assert!(matches!(cfg.validate(), Err(SandboxError::InvalidConfig(_))));
    }

    #[test]
    fn build_dir_equal_to_jail_is_rejected() {
        let cfg = SandboxConfig::new("/uploads".into(), "/home/ctf".into(), "/home/ctf".into());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn upload_dir_inside_jail_is_rejected() {
        let cfg = SandboxConfig::new(
            "/home/ctf/uploads".into(),
            "/home/ctf".into(),
            "/home/ctf/builds".into(),
        );
        assert!(cfg.validate().is_err(), "sources must not be readable from the jail");
    }

    #[test]
    fn root_identity_is_rejected() {
        let mut cfg = SandboxConfig::default();
        cfg.sandbox_uid = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn path_in_jail_strips_root() {
        let cfg = SandboxConfig::default();
        let inside = match cfg.path_in_jail(Path::new("/home/ctf/builds/go-build1")) {
            Ok(p) => p,
            Err(e) => panic!("unexpected error: {e}"),
        };
        assert_eq!(inside, PathBuf::from("/builds/go-build1"));
        assert!(cfg.path_in_jail(Path::new("/uploads/x")).is_err());
    }
}
