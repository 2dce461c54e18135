//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.termbridge/config.toml`
//! 2. Local config: `.termbridge/config.toml` (in workspace)
//! 3. An explicit file given on the command line
//! 4. CLI overrides
//!
//! Later sources override earlier ones.

use crate::error::ConfigError;
use crate::{
    CacheConfig, ConfigOverrides, IngestConfig, LoggingConfig, QueryConfig, StorageConfig,
    TermbridgeConfig,
};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Global and local configuration directory name.
const CONFIG_DIR: &str = ".termbridge";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.termbridge`)
    global_config_dir: Option<PathBuf>,

    /// Cached global config
    global_config: Option<TermbridgeConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.termbridge`).
    pub fn new() -> Self {
        let global_config_dir = dirs::home_dir().map(|h| h.join(CONFIG_DIR));

        Self {
            global_config_dir,
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    ///
    /// Useful for testing.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    /// Get the global config file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Get the local config file path for a workspace.
    pub fn local_config_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for a workspace with optional CLI overrides.
    ///
    /// Merges config in order: global → local → overrides.
    pub fn load(
        &mut self,
        workspace_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<TermbridgeConfig, ConfigError> {
        self.load_with_file(workspace_root, None, overrides)
    }

    /// Like [`load`](Self::load), with an explicit config file layered
    /// between the local config and the overrides.
    ///
    /// Unlike the global and local files, an explicit file must exist.
    pub fn load_with_file(
        &mut self,
        workspace_root: &Path,
        explicit: Option<&Path>,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<TermbridgeConfig, ConfigError> {
        let mut config = TermbridgeConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        if let Some(local_config) = self.load_local(workspace_root)? {
            config = merge_configs(config, local_config);
        }

        if let Some(path) = explicit {
            debug!("Loading config from {:?}", path);
            config = merge_configs(config, load_config_file(path)?);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<TermbridgeConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let config = load_config_file(&global_path)?;

        self.global_config = Some(config.clone());

        Ok(Some(config))
    }

    /// Load only the local configuration for a workspace.
    pub fn load_local(&self, workspace_root: &Path) -> Result<Option<TermbridgeConfig>, ConfigError> {
        let local_path = self.local_config_path(workspace_root);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        load_config_file(&local_path).map(Some)
    }

    /// Clear cached global configuration.
    ///
    /// Forces reload on next `load_global()` call.
    pub fn clear_cache(&mut self) {
        self.global_config = None;
    }
}

/// Load a configuration file from disk.
fn load_config_file(path: &Path) -> Result<TermbridgeConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

/// Merge two configurations, with `overlay` taking precedence.
///
/// A field set to its default in `overlay` keeps the `base` value, so partial
/// files only change what they mention.
fn merge_configs(base: TermbridgeConfig, overlay: TermbridgeConfig) -> TermbridgeConfig {
    TermbridgeConfig {
        storage: merge_storage(base.storage, overlay.storage),
        ingest: merge_ingest(base.ingest, overlay.ingest),
        query: merge_query(base.query, overlay.query),
        cache: merge_cache(base.cache, overlay.cache),
        logging: merge_logging(base.logging, overlay.logging),
    }
}

/// Pick `overlay` unless it still holds the default
fn pick<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

fn merge_storage(base: StorageConfig, overlay: StorageConfig) -> StorageConfig {
    let default = StorageConfig::default();
    StorageConfig {
        database: pick(base.database, overlay.database, default.database),
        table_prefix: pick(base.table_prefix, overlay.table_prefix, default.table_prefix),
    }
}

fn merge_ingest(base: IngestConfig, overlay: IngestConfig) -> IngestConfig {
    let default = IngestConfig::default();
    IngestConfig {
        batch_size: pick(base.batch_size, overlay.batch_size, default.batch_size),
        delimiter: pick(base.delimiter, overlay.delimiter, default.delimiter),
    }
}

fn merge_query(base: QueryConfig, overlay: QueryConfig) -> QueryConfig {
    let default = QueryConfig::default();
    QueryConfig {
        windows: pick(base.windows, overlay.windows, default.windows),
        max_window_params: pick(
            base.max_window_params,
            overlay.max_window_params,
            default.max_window_params,
        ),
        parallel_windows: overlay.parallel_windows.or(base.parallel_windows),
    }
}

fn merge_cache(base: CacheConfig, overlay: CacheConfig) -> CacheConfig {
    CacheConfig {
        capacity: overlay.capacity.or(base.capacity),
    }
}

fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    LoggingConfig {
        level: pick(base.level, overlay.level, "info".to_string()),
    }
}
