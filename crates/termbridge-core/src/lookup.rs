//! Auxiliary identifier lookups
//!
//! Batch resolvers between atom ids, concept ids and source codes. Each call
//! is one `DISTINCT` statement sized to its input (no windowing), memoized
//! on its arguments. Empty input returns an empty result without touching
//! the store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::cache::{signature, Memo};
use crate::store::{ConceptStore, Result};

/// Memoized identifier lookups against one store.
pub struct AuxiliaryLookups {
    store: Arc<ConceptStore>,
    ids: Memo<BTreeSet<String>>,
    codes: Memo<BTreeMap<String, Vec<String>>>,
}

impl AuxiliaryLookups {
    pub fn new(store: Arc<ConceptStore>) -> Self {
        Self {
            store,
            ids: Memo::new(),
            codes: Memo::new(),
        }
    }

    /// Concept ids of the given atoms
    pub fn concept_ids_for_atom_ids<S: AsRef<str>>(&self, atom_ids: &[S]) -> Result<BTreeSet<String>> {
        if atom_ids.is_empty() {
            return Ok(BTreeSet::new());
        }
        self.ids
            .get_or_try_insert_with(signature("concept_ids_for_atom_ids", atom_ids), || {
                self.store.concepts_for_atoms(&unique(atom_ids))
            })
    }

    /// Atom ids of the given concepts
    pub fn atom_ids_for_concept_ids<S: AsRef<str>>(
        &self,
        concept_ids: &[S],
    ) -> Result<BTreeSet<String>> {
        if concept_ids.is_empty() {
            return Ok(BTreeSet::new());
        }
        self.ids
            .get_or_try_insert_with(signature("atom_ids_for_concept_ids", concept_ids), || {
                self.store.atoms_for_concepts(&unique(concept_ids))
            })
    }

    /// Concept ids per code of `source`.
    ///
    /// Codes the source does not know are absent from the result; each
    /// present code lists its concept ids in sorted order.
    pub fn concept_ids_for_codes<S: AsRef<str>>(
        &self,
        source: &str,
        codes: &[S],
    ) -> Result<BTreeMap<String, Vec<String>>> {
        if codes.is_empty() {
            return Ok(BTreeMap::new());
        }

        let operation = format!("concept_ids_for_codes:{}", source);
        self.codes
            .get_or_try_insert_with(signature(&operation, codes), || -> Result<_> {
                let mut by_code: BTreeMap<String, Vec<String>> = BTreeMap::new();
                for (code, cui) in self.store.concepts_for_codes(source, &unique(codes))? {
                    by_code.entry(code).or_default().push(cui);
                }
                for cuis in by_code.values_mut() {
                    cuis.sort();
                }
                Ok(by_code)
            })
    }

    /// Calls answered from the memo tables
    pub fn memo_hits(&self) -> u64 {
        self.ids.hits() + self.codes.hits()
    }
}

fn unique<S: AsRef<str>>(values: &[S]) -> Vec<&str> {
    let mut values: Vec<&str> = values.iter().map(|v| v.as_ref()).collect();
    values.sort_unstable();
    values.dedup();
    values
}
