//! Service configuration read from `ADMIT_*` environment variables.
//!
//! Every variable is optional except `ADMIT_DATABASE_URL` for the query
//! service. Unset variables fall back to the original deployment layout.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use admit_core::{EXEC_ROTATION_PERIOD, QUERY_ROTATION_PERIOD};
use admit_query::{QueryError, QueryTemplate};
use admit_sandbox::{SandboxConfig, SandboxError};

/// Default listen address of the execution service.
pub const DEFAULT_EXEC_ADDR: &str = "0.0.0.0:8080";

/// Default listen address of the query service.
pub const DEFAULT_QUERY_ADDR: &str = "0.0.0.0:8081";

/// Public commitment prefix of the execution service.
pub const DEFAULT_EXEC_PREFIX: &str = "RCTF2020_golang_interface_";

/// Public commitment prefix of the query service.
pub const DEFAULT_QUERY_PREFIX: &str = "RCTF2020_mysql_interface_";

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A required variable is unset.
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A variable holds a value that does not parse.
    #[error("{var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    /// The sandbox layout is unsafe.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// The query template is malformed.
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Typed view over a variable source.
struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn string(&self, var: &'static str, default: &str) -> String {
        (self.lookup)(var).unwrap_or_else(|| default.to_owned())
    }

    fn parsed<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.lookup)(var) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            }),
        }
    }

    fn path(&self, var: &'static str, default: PathBuf) -> PathBuf {
        (self.lookup)(var).map_or(default, PathBuf::from)
    }

    fn secs(&self, var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let secs = self.parsed(var, default.as_secs())?;
        if secs == 0 {
            return Err(ConfigError::Invalid {
                var,
                value: "0".to_owned(),
                reason: "must be at least one second".to_owned(),
            });
        }
        Ok(Duration::from_secs(secs))
    }
}

/// Execution service settings.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ExecServiceConfig {
    pub listen_addr: String,
    pub rotation_period: Duration,
    pub pow_prefix: String,
    pub sandbox: SandboxConfig,
}

impl ExecServiceConfig {
    /// Read from the process environment.
    ///
    /// # Errors
    /// Returns [`ConfigError`] for malformed values or an unsafe layout.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read from an arbitrary variable source.
    ///
    /// # Errors
    /// Returns [`ConfigError`] for malformed values or an unsafe layout.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars { lookup };
        let defaults = SandboxConfig::default();
        let mut sandbox = SandboxConfig::new(
            vars.path("ADMIT_UPLOAD_DIR", defaults.upload_dir),
            vars.path("ADMIT_JAIL_ROOT", defaults.jail_root),
            vars.path("ADMIT_BUILD_DIR", defaults.build_dir),
        );
        sandbox.go_binary = vars.path("ADMIT_GO_BINARY", defaults.go_binary);
        sandbox.sandbox_uid = vars.parsed("ADMIT_SANDBOX_UID", defaults.sandbox_uid)?;
        sandbox.sandbox_gid = vars.parsed("ADMIT_SANDBOX_GID", defaults.sandbox_gid)?;
        sandbox.build_timeout = vars.secs("ADMIT_BUILD_TIMEOUT_SECS", defaults.build_timeout)?;
        sandbox.run_timeout = vars.secs("ADMIT_RUN_TIMEOUT_SECS", defaults.run_timeout)?;
        sandbox.validate()?;

        Ok(Self {
            listen_addr: vars.string("ADMIT_LISTEN_ADDR", DEFAULT_EXEC_ADDR),
            rotation_period: vars.secs("ADMIT_ROTATION_SECS", EXEC_ROTATION_PERIOD)?,
            pow_prefix: vars.string("ADMIT_POW_PREFIX", DEFAULT_EXEC_PREFIX),
            sandbox,
        })
    }
}

/// Query service settings.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct QueryServiceConfig {
    pub listen_addr: String,
    pub rotation_period: Duration,
    pub pow_prefix: String,
    pub database_url: String,
    pub template: QueryTemplate,
    /// Return the store's own error text to clients.
    pub expose_store_errors: bool,
}

impl QueryServiceConfig {
    /// Read from the process environment.
    ///
    /// # Errors
    /// Returns [`ConfigError::Missing`] without `ADMIT_DATABASE_URL`, and
    /// [`ConfigError`] for malformed values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read from an arbitrary variable source.
    ///
    /// # Errors
    /// See [`QueryServiceConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars { lookup };
        let database_url =
            (vars.lookup)("ADMIT_DATABASE_URL").ok_or(ConfigError::Missing("ADMIT_DATABASE_URL"))?;
        let template = match (vars.lookup)("ADMIT_QUERY_TEMPLATE") {
            Some(raw) => QueryTemplate::parse(&raw)?,
            None => QueryTemplate::default(),
        };

        Ok(Self {
            listen_addr: vars.string("ADMIT_LISTEN_ADDR", DEFAULT_QUERY_ADDR),
            rotation_period: vars.secs("ADMIT_ROTATION_SECS", QUERY_ROTATION_PERIOD)?,
            pow_prefix: vars.string("ADMIT_POW_PREFIX", DEFAULT_QUERY_PREFIX),
            database_url,
            template,
            expose_store_errors: vars.parsed("ADMIT_EXPOSE_STORE_ERRORS", false)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn exec_defaults_match_original_deployment() {
        let cfg = match ExecServiceConfig::from_lookup(env(&[])) {
            Ok(c) => c,
            Err(e) => panic!("defaults must be valid: {e}"),
        };
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
        assert_eq!(cfg.rotation_period, Duration::from_secs(30));
        assert_eq!(cfg.pow_prefix, "RCTF2020_golang_interface_");
        assert_eq!(cfg.sandbox.upload_dir, PathBuf::from("/uploads"));
        assert_eq!(cfg.sandbox.jail_root, PathBuf::from("/home/ctf"));
        assert_eq!(cfg.sandbox.build_dir, PathBuf::from("/home/ctf/builds"));
        assert_eq!((cfg.sandbox.sandbox_uid, cfg.sandbox.sandbox_gid), (1000, 1000));
    }

    #[test]
    fn exec_overrides_are_applied() {
        let cfg = match ExecServiceConfig::from_lookup(env(&[
            ("ADMIT_LISTEN_ADDR", "127.0.0.1:9000"),
            ("ADMIT_ROTATION_SECS", "5"),
            ("ADMIT_RUN_TIMEOUT_SECS", "2"),
            ("ADMIT_SANDBOX_UID", "1500"),
        ])) {
            Ok(c) => c,
            Err(e) => panic!("overrides must be valid: {e}"),
        };
        assert_eq!(cfg.listen_addr, "127.0.0.1:9000");
        assert_eq!(cfg.rotation_period, Duration::from_secs(5));
        assert_eq!(cfg.sandbox.run_timeout, Duration::from_secs(2));
        assert_eq!(cfg.sandbox.sandbox_uid, 1500);
    }

    #[test]
    fn malformed_number_is_rejected() {
        let err = ExecServiceConfig::from_lookup(env(&[("ADMIT_ROTATION_SECS", "soon")]));
        assert!(matches!(err, Err(ConfigError::Invalid { var: "ADMIT_ROTATION_SECS", .. })));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = ExecServiceConfig::from_lookup(env(&[("ADMIT_BUILD_TIMEOUT_SECS", "0")]));
        assert!(matches!(err, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn build_dir_outside_jail_is_rejected() {
        let err = ExecServiceConfig::from_lookup(env(&[("ADMIT_BUILD_DIR", "/tmp/builds")]));
        assert!(matches!(err, Err(ConfigError::Sandbox(_))));
    }

    #[test]
    fn query_requires_database_url() {
        let err = QueryServiceConfig::from_lookup(env(&[]));
        assert!(matches!(err, Err(ConfigError::Missing("ADMIT_DATABASE_URL"))));
    }

    #[test]
    fn query_defaults_match_original_deployment() {
        let cfg = match QueryServiceConfig::from_lookup(env(&[(
            "ADMIT_DATABASE_URL",
            "mysql://u:p@mysqld:3306/db",
        )])) {
            Ok(c) => c,
            Err(e) => panic!("defaults must be valid: {e}"),
        };
        assert_eq!(cfg.listen_addr, "0.0.0.0:8081");
        assert_eq!(cfg.rotation_period, Duration::from_secs(60));
        assert_eq!(cfg.pow_prefix, "RCTF2020_mysql_interface_");
        assert_eq!(cfg.template, QueryTemplate::default());
        assert!(!cfg.expose_store_errors);
    }

    #[test]
    fn query_template_without_placeholder_is_rejected() {
        let err = QueryServiceConfig::from_lookup(env(&[
            ("ADMIT_DATABASE_URL", "mysql://u:p@mysqld:3306/db"),
            ("ADMIT_QUERY_TEMPLATE", "select 1"),
        ]));
        assert!(matches!(err, Err(ConfigError::Query(_))));
    }

    #[test]
    fn expose_store_errors_parses_bool() {
        let cfg = QueryServiceConfig::from_lookup(env(&[
            ("ADMIT_DATABASE_URL", "mysql://u:p@mysqld:3306/db"),
            ("ADMIT_EXPOSE_STORE_ERRORS", "true"),
        ]));
        assert!(cfg.is_ok_and(|c| c.expose_store_errors));
    }
}
