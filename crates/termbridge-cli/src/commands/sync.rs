//! Sync command - Materialize the reference store for a file

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use termbridge_core::TableState;

use super::{open_mapper, print_json, CommandContext, OutputFormat};

/// Arguments for the sync command
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Reference file (MRCONSO.RRF layout)
    file: PathBuf,

    /// Output format: text (default), json
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    output: OutputFormat,
}

#[derive(Debug, Serialize)]
struct SyncSummary<'a> {
    table: &'a str,
    state: String,
    rebuilt: bool,
    rows_loaded: u64,
}

fn describe(state: &TableState) -> String {
    match state {
        TableState::Current => "current".to_string(),
        TableState::Absent => "absent".to_string(),
        TableState::Stale { found, expected } => {
            format!("stale ({} rows, expected {})", found, expected)
        }
    }
}

/// Execute the sync command
pub fn execute(args: SyncArgs, ctx: &CommandContext) -> Result<()> {
    let mapper = open_mapper(ctx, &args.file)?;
    let report = mapper.sync_report();

    let summary = SyncSummary {
        table: &report.table,
        state: describe(&report.state),
        rebuilt: report.rebuilt,
        rows_loaded: report.rows_loaded,
    };

    match args.output {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => {
            if summary.rebuilt {
                println!(
                    "Rebuilt {} ({} rows; store was {})",
                    summary.table, summary.rows_loaded, summary.state
                );
            } else {
                println!("{} is current", summary.table);
            }
        }
    }

    Ok(())
}
