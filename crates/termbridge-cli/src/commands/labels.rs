//! Labels command - Exact label search over an ontology triple file

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use termbridge_core::{LabelMatcher, Triple};

use super::{print_info, print_json, CommandContext, OutputFormat};

/// Arguments for the labels command
#[derive(Args, Debug)]
pub struct LabelsArgs {
    /// JSON array of `{subject, predicate, object}` triples
    triples: PathBuf,

    /// Label to match exactly
    label: String,

    /// Only match through these predicate IRIs (repeatable; any predicate when omitted)
    #[arg(long = "predicate", short = 'p', value_name = "IRI")]
    predicates: Vec<String>,

    /// Output format: text (default), json
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    output: OutputFormat,
}

fn load_triples(path: &Path) -> Result<LabelMatcher> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read triples from '{}'", path.display()))?;
    let triples: Vec<Triple> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse triples in '{}'", path.display()))?;
    Ok(LabelMatcher::new(triples))
}

/// Execute the labels command
pub fn execute(args: LabelsArgs, ctx: &CommandContext) -> Result<()> {
    let matcher = load_triples(&args.triples)?;
    tracing::debug!("Loaded {} triples from {:?}", matcher.len(), args.triples);

    let predicates: Vec<&str> = args.predicates.iter().map(String::as_str).collect();
    let subjects = matcher.matches(&args.label, &predicates);

    if subjects.is_empty() {
        print_info(&format!("No subjects labelled \"{}\"", args.label), ctx.quiet);
        return Ok(());
    }

    match args.output {
        OutputFormat::Json => print_json(&subjects)?,
        OutputFormat::Text => {
            for subject in &subjects {
                println!("{}", subject);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use termbridge_core::RDFS_LABEL;

    #[test]
    fn test_load_triples_from_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("triples.json");
        std::fs::write(
            &path,
            format!(
                r#"[
                    {{"subject": "http://ex.org/mi", "predicate": "{}", "object": {{"literal": {{"value": "Myocardial infarction", "language": "en"}}}}}},
                    {{"subject": "http://ex.org/mi", "predicate": "http://ex.org/see", "object": {{"iri": "http://ex.org/hf"}}}}
                ]"#,
                RDFS_LABEL
            ),
        )
        .unwrap();

        let matcher = load_triples(&path).unwrap();
        assert_eq!(matcher.len(), 2);
        let subjects = matcher.matches("Myocardial infarction", &[RDFS_LABEL]);
        assert!(subjects.contains("http://ex.org/mi"));
    }

    #[test]
    fn test_load_triples_rejects_bad_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("triples.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = load_triples(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse triples"));
    }
}
