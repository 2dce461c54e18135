//! Half-maps and cross-terminology mappings
//!
//! A [`HalfMap`] is one row of the reference table projected onto the five
//! columns the mapper cares about: a concept, expressed by one atom in one
//! source system under one code, carries one label.
//!
//! A [`Mapping`] joins two half-map populations through their shared concept
//! identifiers. Mappings are derived per query and never persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One (concept, atom, source, code, label) assertion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HalfMap {
    /// Concept identifier (CUI), the grouping key for cross-mapping
    pub concept_id: String,
    /// Atom identifier (AUI)
    pub atom_id: String,
    /// Source-system abbreviation (SAB)
    pub source: String,
    /// Source-asserted code
    pub code: String,
    /// Label (STR)
    pub label: String,
}

impl HalfMap {
    /// Create a new half-map
    pub fn new(
        concept_id: impl Into<String>,
        atom_id: impl Into<String>,
        source: impl Into<String>,
        code: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            concept_id: concept_id.into(),
            atom_id: atom_id.into(),
            source: source.into(),
            code: code.into(),
            label: label.into(),
        }
    }

    /// The cache key this half-map is filed under
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.source, &self.code)
    }
}

/// Key of the half-map cache: a `(source, code)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub source: String,
    pub code: String,
}

impl CacheKey {
    pub fn new(source: &str, code: &str) -> Self {
        Self {
            source: source.to_string(),
            code: code.to_string(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source, self.code)
    }
}

/// A code-to-code correspondence between two source systems.
///
/// The aggregated sets hold every concept id, atom id and label seen in the
/// concept group(s) that produced this pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub from_source: String,
    pub from_code: String,
    pub to_source: String,
    pub to_code: String,
    pub concept_ids: BTreeSet<String>,
    pub atom_ids: BTreeSet<String>,
    pub labels: BTreeSet<String>,
}

impl Mapping {
    /// `(from_source, from_code, to_source, to_code)` identity of the pairing
    pub fn code_pair(&self) -> (&str, &str, &str, &str) {
        (
            &self.from_source,
            &self.from_code,
            &self.to_source,
            &self.to_code,
        )
    }
}
