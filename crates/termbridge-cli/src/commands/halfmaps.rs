//! Halfmaps command - Rows of one source system by code or concept

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use termbridge_core::HalfMap;

use super::{open_mapper, print_info, print_json, CommandContext, OutputFormat};

/// Arguments for the halfmaps command
#[derive(Args, Debug)]
pub struct HalfmapsArgs {
    /// Reference file (MRCONSO.RRF layout)
    file: PathBuf,

    /// Source system abbreviation (e.g. SNOMEDCT_US)
    #[arg(long, short = 's')]
    source: String,

    /// Codes to look up (every code of the source when omitted)
    codes: Vec<String>,

    /// Treat the positional values as concept ids instead of codes
    #[arg(long)]
    concepts: bool,

    /// Output format: text (default), json
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    output: OutputFormat,
}

/// Execute the halfmaps command
pub fn execute(args: HalfmapsArgs, ctx: &CommandContext) -> Result<()> {
    let mapper = open_mapper(ctx, &args.file)?;

    let halfmaps = if args.concepts {
        mapper.halfmaps_by_concept_ids(&args.codes, Some(&args.source))
    } else {
        mapper.halfmaps_for_codes(&args.source, &args.codes)
    }
    .context("Half-map lookup failed")?;

    if halfmaps.is_empty() {
        print_info(&format!("No half-maps found in {}", args.source), ctx.quiet);
        return Ok(());
    }

    match args.output {
        OutputFormat::Json => print_json(&halfmaps)?,
        OutputFormat::Text => {
            for line in render(&halfmaps) {
                println!("{}", line);
            }
        }
    }

    Ok(())
}

fn render(halfmaps: &[HalfMap]) -> Vec<String> {
    halfmaps
        .iter()
        .map(|h| format!("{}\t{}\t{}\t{}\t{}", h.source, h.code, h.concept_id, h.atom_id, h.label))
        .collect()
}
