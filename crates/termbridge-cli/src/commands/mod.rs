//! CLI command implementations
//!
//! This module contains all Termbridge CLI command implementations.

pub mod crossmap;
pub mod halfmaps;
pub mod labels;
pub mod lookup;
pub mod sync;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use termbridge_config::{ConfigLoader, TermbridgeConfig};
use termbridge_core::{
    ConceptMapper, MapperOptions, RowSource, RrfFile, SqliteConnectionFactory, SyncProgress,
};

use crate::progress;
use crate::GlobalOptions;

/// Everything a command needs after global options are resolved
pub struct CommandContext {
    pub workspace: PathBuf,
    pub config: TermbridgeConfig,
    pub quiet: bool,
}

/// Output format shared by commands that print results
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output for scripting
    Json,
}

/// Resolve the workspace path from options or current directory.
pub fn resolve_workspace(global: &GlobalOptions) -> Result<PathBuf> {
    if let Some(ref ws) = global.workspace {
        if !ws.is_dir() {
            anyhow::bail!("Workspace '{}' is not a directory", ws.display());
        }
        return ws
            .canonicalize()
            .with_context(|| format!("Failed to resolve workspace '{}'", ws.display()));
    }

    // Default to current directory
    std::env::current_dir().context("Failed to get current directory")
}

/// Load and validate configuration: global, local, `--config` file, then flags.
pub fn load_config(global: &GlobalOptions, workspace: &Path) -> Result<TermbridgeConfig> {
    let mut loader = ConfigLoader::new();
    let overrides = global.to_config_overrides();

    let config = loader
        .load_with_file(workspace, global.config.as_deref(), Some(&overrides))
        .context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    Ok(config)
}

/// Translate configuration into mapper options.
pub fn mapper_options(config: &TermbridgeConfig) -> MapperOptions {
    MapperOptions {
        table_prefix: config.storage.table_prefix.clone(),
        batch_size: config.ingest.batch_size,
        windows: config.query.windows,
        max_window_params: config.query.max_window_params,
        parallel_windows: config.query.parallel(),
        cache_capacity: config.cache.capacity,
    }
}

/// Open a reference file with the configured delimiter.
pub fn open_rows(ctx: &CommandContext, file: &Path) -> Result<RrfFile> {
    let spinner = progress::spinner(&format!("Reading {}", file.display()), ctx.quiet);
    let rows = RrfFile::with_delimiter(file, ctx.config.ingest.delimiter)
        .with_context(|| format!("Failed to read reference file '{}'", file.display()))?;
    progress::finish_spinner(spinner, &format!("Read {}", file.display()));
    Ok(rows)
}

/// Open a mapper over a reference file, showing a progress bar while the
/// store is rebuilt.
pub fn open_mapper(ctx: &CommandContext, file: &Path) -> Result<ConceptMapper> {
    let rows = open_rows(ctx, file)?;
    let database = ctx.config.database_path(&ctx.workspace);

    let bar = progress::LazyRowsBar::new(rows.row_count(), "Loading", ctx.quiet);
    let on_progress = |p: SyncProgress| bar.set_position(p.loaded);

    let factory = Arc::new(SqliteConnectionFactory::new(&database));
    let mapper =
        ConceptMapper::open_with_progress(factory, &rows, mapper_options(&ctx.config), &on_progress)
            .with_context(|| format!("Failed to open store at '{}'", database.display()))?;
    bar.finish();

    Ok(mapper)
}

/// Print a serializable value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize results")?;
    println!("{}", json);
    Ok(())
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}
