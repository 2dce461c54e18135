//! Termbridge CLI - Cross-terminology concept mapping
//!
//! A command-line interface for materializing a concept reference file into a
//! local store and mapping codes between source systems through shared
//! concepts.
//!
//! # Usage
//!
//! ```bash
//! # Load (or verify) the store for a reference file
//! termbridge sync MRCONSO.RRF
//!
//! # Map ICD-10-CM codes onto SNOMED CT
//! termbridge crossmap MRCONSO.RRF --from ICD10CM --to SNOMEDCT_US --from-code I21.9
//!
//! # Concepts carried by a set of codes
//! termbridge lookup MRCONSO.RRF cuis-for-codes --source MSH D009203
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod progress;

/// Termbridge - Map codes between terminologies via shared concepts
#[derive(Parser, Debug)]
#[command(name = "termbridge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Workspace directory (config lookup and relative database paths)
    #[arg(long, short = 'w', global = true, env = "TERMBRIDGE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, short = 'c', global = true, env = "TERMBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database holding the reference store
    #[arg(long, global = true, env = "TERMBRIDGE_DATABASE")]
    database: Option<PathBuf>,

    /// Prefix of the per-file-version table name
    #[arg(long, global = true)]
    table_prefix: Option<String>,

    /// Rows inserted per transaction when rebuilding the store
    #[arg(long, global = true, value_name = "ROWS")]
    batch_size: Option<usize>,

    /// Target number of windows for uncached code lookups
    #[arg(long, global = true)]
    windows: Option<usize>,

    /// Run lookup windows concurrently
    #[arg(long, global = true)]
    parallel_windows: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

impl GlobalOptions {
    /// Convert global options to config overrides
    pub fn to_config_overrides(&self) -> termbridge_config::ConfigOverrides {
        termbridge_config::ConfigOverrides {
            database: self.database.clone(),
            table_prefix: self.table_prefix.clone(),
            batch_size: self.batch_size,
            windows: self.windows,
            parallel_windows: self.parallel_windows.then_some(true),
            log_level: self.log_level_override(),
        }
    }

    fn log_level_override(&self) -> Option<String> {
        if self.quiet {
            Some("error".to_string())
        } else if self.verbose {
            Some("debug".to_string())
        } else {
            None
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the reference store for a file, rebuilding it when stale
    Sync(commands::sync::SyncArgs),

    /// Print half-maps for codes of one source system
    Halfmaps(commands::halfmaps::HalfmapsArgs),

    /// Map codes between two source systems
    Crossmap(commands::crossmap::CrossmapArgs),

    /// Identifier lookups between atoms, concepts and codes
    Lookup(commands::lookup::LookupArgs),

    /// Find ontology subjects by exact label
    Labels(commands::labels::LabelsArgs),
}

/// Install the stderr subscriber.
///
/// `RUST_LOG` wins when set; otherwise the configured level applies to the
/// termbridge crates.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,termbridge_core={level},termbridge_config={level},termbridge={level}"
        ))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging depends on the merged config, so load it before anything logs
    let workspace = commands::resolve_workspace(&cli.global)?;
    let config = commands::load_config(&cli.global, &workspace)?;
    init_tracing(&config.logging.level.to_lowercase());

    let ctx = commands::CommandContext {
        workspace,
        config,
        quiet: cli.global.quiet,
    };

    match cli.command {
        Commands::Sync(args) => commands::sync::execute(args, &ctx),
        Commands::Halfmaps(args) => commands::halfmaps::execute(args, &ctx),
        Commands::Crossmap(args) => commands::crossmap::execute(args, &ctx),
        Commands::Lookup(args) => commands::lookup::execute(args, &ctx),
        Commands::Labels(args) => commands::labels::execute(args, &ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_overrides_from_flags() {
        let cli = Cli::parse_from([
            "termbridge",
            "--database",
            "/tmp/umls.db",
            "--table-prefix",
            "UMLS",
            "-q",
            "sync",
            "MRCONSO.RRF",
        ]);
        let overrides = cli.global.to_config_overrides();
        assert_eq!(overrides.database, Some(PathBuf::from("/tmp/umls.db")));
        assert_eq!(overrides.table_prefix.as_deref(), Some("UMLS"));
        assert_eq!(overrides.log_level.as_deref(), Some("error"));
        assert_eq!(overrides.batch_size, None);
        assert_eq!(overrides.parallel_windows, None);
    }

    #[test]
    fn test_query_and_ingest_overrides_from_flags() {
        let cli = Cli::parse_from([
            "termbridge",
            "crossmap",
            "MRCONSO.RRF",
            "--from",
            "SRC1",
            "--to",
            "SRC2",
            "--batch-size",
            "500",
            "--windows",
            "3",
            "--parallel-windows",
        ]);
        let overrides = cli.global.to_config_overrides();
        assert_eq!(overrides.batch_size, Some(500));
        assert_eq!(overrides.windows, Some(3));
        assert_eq!(overrides.parallel_windows, Some(true));
    }

    #[test]
    fn test_quiet_wins_over_verbose() {
        let cli = Cli::parse_from(["termbridge", "-v", "-q", "sync", "x.RRF"]);
        assert_eq!(cli.global.log_level_override().as_deref(), Some("error"));

        let cli = Cli::parse_from(["termbridge", "-v", "sync", "x.RRF"]);
        assert_eq!(cli.global.log_level_override().as_deref(), Some("debug"));
    }
}
