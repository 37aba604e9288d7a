//! Process configuration for the directory core.
//!
//! # Responsibility
//! - Hold settings read once at startup (database, query limits, logging).
//! - Parse TOML input and reject values the core cannot honor.
//!
//! # Invariants
//! - Configuration is passed explicitly into constructors; nothing here is global.
//! - Every field has a default so a partial file is valid.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_TAXONOMY_DEPTH: usize = 64;
pub const DEFAULT_SCAN_BATCH_SIZE: usize = 256;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Configuration load/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid { field, message } => write!(f, "invalid `{field}`: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid { .. } => None,
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirectoryConfig {
    pub database: DatabaseConfig,
    pub query: QueryConfig,
    pub logging: LoggingConfig,
}

/// SQLite connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database file. `None` opens an in-memory database.
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

/// Query engine limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    /// Maximum taxonomy depth walked below a root before failing.
    pub max_taxonomy_depth: usize,
    /// Buildings fetched per spatial scan batch; cancellation is checked between batches.
    pub scan_batch_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_taxonomy_depth: DEFAULT_MAX_TAXONOMY_DEPTH,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
        }
    }
}

/// Logging bootstrap settings consumed by `init_logging`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute log directory. `None` leaves logging uninitialized.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            dir: None,
        }
    }
}

impl DirectoryConfig {
    /// Reads and validates a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DirectoryConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query.max_taxonomy_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "query.max_taxonomy_depth",
                message: "must be at least 1".to_string(),
            });
        }
        if self.query.scan_batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "query.scan_batch_size",
                message: "must be at least 1".to_string(),
            });
        }
        if let Some(dir) = self.logging.dir.as_ref() {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid {
                    field: "logging.dir",
                    message: format!("must be an absolute path, got `{}`", dir.display()),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, DirectoryConfig, DEFAULT_MAX_TAXONOMY_DEPTH, DEFAULT_SCAN_BATCH_SIZE};
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn empty_document_uses_defaults() {
        let config = DirectoryConfig::from_toml_str("").unwrap();
        assert_eq!(config, DirectoryConfig::default());
        assert_eq!(config.query.max_taxonomy_depth, DEFAULT_MAX_TAXONOMY_DEPTH);
        assert_eq!(config.query.scan_batch_size, DEFAULT_SCAN_BATCH_SIZE);
        assert!(config.database.path.is_none());
    }

    #[test]
    fn partial_document_overrides_selected_fields() {
        let config = DirectoryConfig::from_toml_str(
            r#"
            [database]
            path = "/var/lib/orgdir/directory.db"

            [query]
            max_taxonomy_depth = 8
            "#,
        )
        .unwrap();
        assert_eq!(
            config.database.path,
            Some(PathBuf::from("/var/lib/orgdir/directory.db"))
        );
        assert_eq!(config.query.max_taxonomy_depth, 8);
        assert_eq!(config.query.scan_batch_size, DEFAULT_SCAN_BATCH_SIZE);
    }

    #[test]
    fn zero_limits_are_rejected() {
        let err = DirectoryConfig::from_toml_str("[query]\nscan_batch_size = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "query.scan_batch_size",
                ..
            }
        ));
    }

    #[test]
    fn relative_log_dir_is_rejected() {
        let err = DirectoryConfig::from_toml_str("[logging]\ndir = \"logs\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "logging.dir", .. }));
    }

    #[test]
    fn unknown_keys_fail_to_parse() {
        let err = DirectoryConfig::from_toml_str("[query]\nmax_depth = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orgdir.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[query]\nscan_batch_size = 32").unwrap();
        drop(file);

        let config = DirectoryConfig::from_file(&path).unwrap();
        assert_eq!(config.query.scan_batch_size, 32);

        let missing = DirectoryConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::ReadFile { .. }));
    }
}
