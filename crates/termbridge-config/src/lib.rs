//! Termbridge Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.termbridge/config.toml`
//! - Local config: `.termbridge/config.toml` (in workspace)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → CLI overrides.
//!
//! # Example TOML
//!
//! ```toml
//! [storage]
//! database = "/data/umls/termbridge.db"
//! table_prefix = "MRCONSO"
//!
//! [ingest]
//! batch_size = 100000
//! delimiter = "|"
//!
//! [query]
//! windows = 10
//! parallel_windows = true
//!
//! [cache]
//! capacity = 500000
//! ```

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest number of codes one lookup statement may bind (SQLite allows
/// 32766 parameters; one is taken by the source)
pub const MAX_WINDOW_PARAMS_LIMIT: usize = 32_765;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Root configuration for Termbridge.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct TermbridgeConfig {
    /// Storage configuration
    pub storage: StorageConfig,

    /// Reference file ingestion
    pub ingest: IngestConfig,

    /// Lookup batching
    pub query: QueryConfig,

    /// Half-map cache
    pub cache: CacheConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Where the reference store lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file (relative paths resolve against the workspace)
    pub database: PathBuf,

    /// Prefix of per-file-version table names
    pub table_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("termbridge.db"),
            table_prefix: "MRCONSO".to_string(),
        }
    }
}

/// How reference files are read and loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// Rows per committed batch during a rebuild
    pub batch_size: usize,

    /// Field delimiter of the reference file
    pub delimiter: char,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: 100_000,
            delimiter: '|',
        }
    }
}

/// Windowing of uncached code lookups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    /// Target number of windows per request
    pub windows: usize,

    /// Maximum codes bound in one statement
    pub max_window_params: usize,

    /// Run windows concurrently; sequential when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_windows: Option<bool>,
}

impl QueryConfig {
    /// Whether windows run concurrently
    pub fn parallel(&self) -> bool {
        self.parallel_windows.unwrap_or(false)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            windows: 10,
            max_window_params: 30_000,
            parallel_windows: None,
        }
    }
}

/// Half-map cache sizing.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum cached `(source, code)` keys; unbounded when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override database path
    pub database: Option<PathBuf>,

    /// Override table prefix
    pub table_prefix: Option<String>,

    /// Override rebuild batch size
    pub batch_size: Option<usize>,

    /// Override window count
    pub windows: Option<usize>,

    /// Override parallel window execution
    pub parallel_windows: Option<bool>,

    /// Override log level
    pub log_level: Option<String>,
}

impl TermbridgeConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref database) = overrides.database {
            self.storage.database = database.clone();
        }

        if let Some(ref prefix) = overrides.table_prefix {
            self.storage.table_prefix = prefix.clone();
        }

        if let Some(batch_size) = overrides.batch_size {
            self.ingest.batch_size = batch_size;
        }

        if let Some(windows) = overrides.windows {
            self.query.windows = windows;
        }

        if let Some(parallel) = overrides.parallel_windows {
            self.query.parallel_windows = Some(parallel);
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_identifier(&self.storage.table_prefix) {
            return Err(ConfigError::invalid_value(
                "storage.table_prefix",
                format!(
                    "'{}' must start with a letter or '_' and contain only letters, digits and '_'",
                    self.storage.table_prefix
                ),
            ));
        }

        if self.ingest.batch_size == 0 {
            return Err(ConfigError::invalid_value(
                "ingest.batch_size",
                "must be at least 1",
            ));
        }

        if matches!(self.ingest.delimiter, '\n' | '\r') {
            return Err(ConfigError::invalid_value(
                "ingest.delimiter",
                "line terminators cannot delimit fields",
            ));
        }

        if self.query.windows == 0 {
            return Err(ConfigError::invalid_value("query.windows", "must be at least 1"));
        }

        if self.query.max_window_params == 0 || self.query.max_window_params > MAX_WINDOW_PARAMS_LIMIT
        {
            return Err(ConfigError::invalid_value(
                "query.max_window_params",
                format!("must be between 1 and {}", MAX_WINDOW_PARAMS_LIMIT),
            ));
        }

        if self.cache.capacity == Some(0) {
            return Err(ConfigError::invalid_value(
                "cache.capacity",
                "must be at least 1 (omit it for an unbounded cache)",
            ));
        }

        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!(
                    "unknown level '{}'. Valid values: {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Get the effective database path for a workspace.
    pub fn database_path(&self, workspace_root: &Path) -> PathBuf {
        if self.storage.database.is_absolute() {
            self.storage.database.clone()
        } else {
            workspace_root.join(&self.storage.database)
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = TermbridgeConfig::default();
        assert_eq!(config.storage.database, PathBuf::from("termbridge.db"));
        assert_eq!(config.storage.table_prefix, "MRCONSO");
        assert_eq!(config.ingest.batch_size, 100_000);
        assert_eq!(config.ingest.delimiter, '|');
        assert_eq!(config.query.windows, 10);
        assert_eq!(config.cache.capacity, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = TermbridgeConfig::default();
        let overrides = ConfigOverrides {
            database: Some(PathBuf::from("/data/umls.db")),
            table_prefix: Some("UMLS2024AA".to_string()),
            parallel_windows: Some(true),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        config.apply_overrides(&overrides);

        assert_eq!(config.storage.database, PathBuf::from("/data/umls.db"));
        assert_eq!(config.storage.table_prefix, "UMLS2024AA");
        assert!(config.query.parallel());
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.query.windows, 10);
    }

    #[test]
    fn test_database_path_resolution() {
        let config = TermbridgeConfig::default();
        let workspace = PathBuf::from("/home/user/project");
        assert_eq!(
            config.database_path(&workspace),
            PathBuf::from("/home/user/project/termbridge.db")
        );
    }

    #[test]
    fn test_database_path_absolute() {
        let mut config = TermbridgeConfig::default();
        config.storage.database = PathBuf::from("/var/lib/termbridge.db");
        assert_eq!(
            config.database_path(Path::new("/project")),
            PathBuf::from("/var/lib/termbridge.db")
        );
    }

    #[test]
    fn test_validate_rejects_bad_prefix() {
        let mut config = TermbridgeConfig::default();
        config.storage.table_prefix = "mr-conso".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("storage.table_prefix"));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = TermbridgeConfig::default();
        config.query.windows = 0;
        assert!(config.validate().unwrap_err().to_string().contains("query.windows"));

        let mut config = TermbridgeConfig::default();
        config.ingest.batch_size = 0;
        assert!(config.validate().unwrap_err().to_string().contains("ingest.batch_size"));

        let mut config = TermbridgeConfig::default();
        config.cache.capacity = Some(0);
        assert!(config.validate().unwrap_err().to_string().contains("cache.capacity"));
    }

    #[test]
    fn test_validate_window_param_limit() {
        let mut config = TermbridgeConfig::default();
        config.query.max_window_params = 40_000;
        assert!(config.validate().is_err());

        config.query.max_window_params = MAX_WINDOW_PARAMS_LIMIT;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = TermbridgeConfig::default();
        config.logging.level = "WARN".to_string();
        assert!(config.validate().is_ok());

        config.logging.level = "loud".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("loud"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = TermbridgeConfig::default();
        config.ingest.delimiter = '\t';
        config.cache.capacity = Some(1_000);
        config.logging.level = "debug".to_string();

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: TermbridgeConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed, config);
    }
}
