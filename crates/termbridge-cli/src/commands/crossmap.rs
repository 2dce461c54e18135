//! Crossmap command - Map codes between two source systems

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use termbridge_core::Mapping;

use super::{open_mapper, print_info, print_json, CommandContext, OutputFormat};

/// Arguments for the crossmap command
#[derive(Args, Debug)]
pub struct CrossmapArgs {
    /// Reference file (MRCONSO.RRF layout)
    file: PathBuf,

    /// Source system to map from
    #[arg(long)]
    from: String,

    /// Source system to map to
    #[arg(long)]
    to: String,

    /// Restrict the from-side to these codes (repeatable; all codes when omitted)
    #[arg(long = "from-code", value_name = "CODE")]
    from_codes: Vec<String>,

    /// Restrict the to-side to these codes (repeatable; all codes when omitted)
    #[arg(long = "to-code", value_name = "CODE")]
    to_codes: Vec<String>,

    /// Emit one mapping per code pair, merging concepts that share it
    #[arg(long)]
    merge: bool,

    /// Output format: text (default), json
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    output: OutputFormat,
}

/// Execute the crossmap command
pub fn execute(args: CrossmapArgs, ctx: &CommandContext) -> Result<()> {
    let mapper = open_mapper(ctx, &args.file)?;

    let mappings = if args.merge {
        mapper.cross_map_merged(&args.from, &args.from_codes, &args.to, &args.to_codes)
    } else {
        mapper.cross_map(&args.from, &args.from_codes, &args.to, &args.to_codes)
    }
    .context("Cross-mapping failed")?;

    if mappings.is_empty() {
        print_info(
            &format!("No mappings from {} to {}", args.from, args.to),
            ctx.quiet,
        );
        return Ok(());
    }

    match args.output {
        OutputFormat::Json => print_json(&mappings)?,
        OutputFormat::Text => {
            if !ctx.quiet {
                println!("{} mappings from {} to {}:\n", mappings.len(), args.from, args.to);
            }
            for mapping in &mappings {
                println!("{}", render(mapping));
            }
        }
    }

    tracing::debug!("{:?}", mapper.stats());
    Ok(())
}

fn render(mapping: &Mapping) -> String {
    let join = |set: &std::collections::BTreeSet<String>| {
        set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
    };
    format!(
        "{}:{} -> {}:{}\n   concepts: {}\n   atoms: {}\n   labels: {}",
        mapping.from_source,
        mapping.from_code,
        mapping.to_source,
        mapping.to_code,
        join(&mapping.concept_ids),
        join(&mapping.atom_ids),
        join(&mapping.labels),
    )
}
