//! Lookup command - Identifier lookups between atoms, concepts and codes

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use super::{open_mapper, print_info, print_json, CommandContext, OutputFormat};

/// Arguments for the lookup command
#[derive(Args, Debug)]
pub struct LookupArgs {
    /// Reference file (MRCONSO.RRF layout)
    file: PathBuf,

    /// Output format: text (default), json
    #[arg(long, short = 'o', value_enum, default_value = "text", global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    kind: LookupKind,
}

#[derive(Subcommand, Debug)]
pub enum LookupKind {
    /// Concept ids carried by atom ids
    CuisForAuis {
        /// Atom ids (AUI)
        #[arg(required = true)]
        auis: Vec<String>,
    },

    /// Atom ids of concept ids
    AuisForCuis {
        /// Concept ids (CUI)
        #[arg(required = true)]
        cuis: Vec<String>,
    },

    /// Concept ids per code of one source system
    CuisForCodes {
        /// Source system abbreviation
        #[arg(long, short = 's')]
        source: String,

        /// Codes in that source
        #[arg(required = true)]
        codes: Vec<String>,
    },
}

/// Execute the lookup command
pub fn execute(args: LookupArgs, ctx: &CommandContext) -> Result<()> {
    let mapper = open_mapper(ctx, &args.file)?;

    match args.kind {
        LookupKind::CuisForAuis { auis } => {
            let cuis = mapper
                .concept_ids_for_atom_ids(&auis)
                .context("Concept lookup failed")?;
            print_set(&cuis, args.output, ctx.quiet)
        }
        LookupKind::AuisForCuis { cuis } => {
            let auis = mapper
                .atom_ids_for_concept_ids(&cuis)
                .context("Atom lookup failed")?;
            print_set(&auis, args.output, ctx.quiet)
        }
        LookupKind::CuisForCodes { source, codes } => {
            let by_code = mapper
                .concept_ids_for_codes(&source, &codes)
                .context("Concept lookup failed")?;
            print_by_code(&by_code, args.output, ctx.quiet)
        }
    }
}

fn print_set(ids: &BTreeSet<String>, output: OutputFormat, quiet: bool) -> Result<()> {
    if ids.is_empty() {
        print_info("No identifiers found", quiet);
        return Ok(());
    }

    match output {
        OutputFormat::Json => print_json(ids)?,
        OutputFormat::Text => {
            for id in ids {
                println!("{}", id);
            }
        }
    }
    Ok(())
}

fn print_by_code(
    by_code: &BTreeMap<String, Vec<String>>,
    output: OutputFormat,
    quiet: bool,
) -> Result<()> {
    if by_code.is_empty() {
        print_info("No codes found", quiet);
        return Ok(());
    }

    match output {
        OutputFormat::Json => print_json(by_code)?,
        OutputFormat::Text => {
            for (code, cuis) in by_code {
                println!("{}\t{}", code, cuis.join(","));
            }
        }
    }
    Ok(())
}
