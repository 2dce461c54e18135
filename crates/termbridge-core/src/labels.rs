//! Ontology label matching
//!
//! Finds the subjects of an RDF-style triple set whose label literal equals a
//! given string. Matching is exact: no case folding, no language fallback.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// `rdfs:label`
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
/// `skos:prefLabel`
pub const SKOS_PREF_LABEL: &str = "http://www.w3.org/2004/02/skos/core#prefLabel";
/// `skos:altLabel`
pub const SKOS_ALT_LABEL: &str = "http://www.w3.org/2004/02/skos/core#altLabel";

/// Object position of a triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Term {
    Iri(String),
    Literal {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    /// Plain literal without a language tag
    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            language: None,
        }
    }

    /// The literal's lexical value, `None` for IRIs
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Term::Literal { value, .. } => Some(value),
            Term::Iri(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }
}

/// Exact-label lookup over a triple set.
#[derive(Debug, Clone, Default)]
pub struct LabelMatcher {
    triples: Vec<Triple>,
}

impl LabelMatcher {
    pub fn new(triples: Vec<Triple>) -> Self {
        Self { triples }
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Subjects carrying `label` as a literal under one of `predicates`.
    ///
    /// An empty predicate list accepts any predicate.
    pub fn matches(&self, label: &str, predicates: &[&str]) -> BTreeSet<String> {
        self.triples
            .iter()
            .filter(|t| predicates.is_empty() || predicates.contains(&t.predicate.as_str()))
            .filter(|t| t.object.as_literal() == Some(label))
            .map(|t| t.subject.clone())
            .collect()
    }

    /// Subjects labelled `label` via `rdfs:label`, `skos:prefLabel` or
    /// `skos:altLabel`
    pub fn matches_any_label(&self, label: &str) -> BTreeSet<String> {
        self.matches(label, &[RDFS_LABEL, SKOS_PREF_LABEL, SKOS_ALT_LABEL])
    }
}

impl FromIterator<Triple> for LabelMatcher {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
