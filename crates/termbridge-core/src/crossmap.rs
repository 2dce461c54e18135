//! Cross-Mapper
//!
//! Joins two half-map populations on shared concept ids. Every concept group
//! yields the full cross product of its from-codes and to-codes, and each
//! resulting mapping carries everything the group aggregated: all concept
//! ids, atom ids and labels, not only those of the two codes involved.
//!
//! A concept seen in only one of the two sources contributes nothing.

use std::collections::{BTreeMap, BTreeSet};

use crate::halfmap::{HalfMap, Mapping};

/// One concept's half-maps, split by side
#[derive(Default)]
struct ConceptGroup {
    from_codes: BTreeSet<String>,
    to_codes: BTreeSet<String>,
    concept_ids: BTreeSet<String>,
    atom_ids: BTreeSet<String>,
    labels: BTreeSet<String>,
}

impl ConceptGroup {
    fn add(&mut self, hm: &HalfMap, from_source: &str, to_source: &str) {
        if hm.source == from_source {
            self.from_codes.insert(hm.code.clone());
        }
        if hm.source == to_source {
            self.to_codes.insert(hm.code.clone());
        }
        self.concept_ids.insert(hm.concept_id.clone());
        self.atom_ids.insert(hm.atom_id.clone());
        self.labels.insert(hm.label.clone());
    }
}

/// Mappings between `from_source` and `to_source` codes implied by shared
/// concept ids.
///
/// Output is ordered by concept id, then from-code, then to-code. When both
/// sources are the same, each code also maps to itself.
pub fn cross_map(
    from_source: &str,
    from: &[HalfMap],
    to_source: &str,
    to: &[HalfMap],
) -> Vec<Mapping> {
    let mut groups: BTreeMap<&str, ConceptGroup> = BTreeMap::new();
    for hm in from.iter().chain(to) {
        groups
            .entry(hm.concept_id.as_str())
            .or_default()
            .add(hm, from_source, to_source);
    }

    let mut mappings = Vec::new();
    for group in groups.values() {
        for from_code in &group.from_codes {
            for to_code in &group.to_codes {
                mappings.push(Mapping {
                    from_source: from_source.to_string(),
                    from_code: from_code.clone(),
                    to_source: to_source.to_string(),
                    to_code: to_code.clone(),
                    concept_ids: group.concept_ids.clone(),
                    atom_ids: group.atom_ids.clone(),
                    labels: group.labels.clone(),
                });
            }
        }
    }
    mappings
}

/// Fold mappings that share a code pair into one, unioning their sets.
///
/// Two codes linked through several concepts otherwise appear once per
/// concept. Output is ordered by code pair.
pub fn merge_by_code_pair(mappings: Vec<Mapping>) -> Vec<Mapping> {
    let mut merged: BTreeMap<(String, String, String, String), Mapping> = BTreeMap::new();

    for mapping in mappings {
        let key = (
            mapping.from_source.clone(),
            mapping.from_code.clone(),
            mapping.to_source.clone(),
            mapping.to_code.clone(),
        );
        match merged.get_mut(&key) {
            Some(existing) => {
                existing.concept_ids.extend(mapping.concept_ids);
                existing.atom_ids.extend(mapping.atom_ids);
                existing.labels.extend(mapping.labels);
            }
            None => {
                merged.insert(key, mapping);
            }
        }
    }

    merged.into_values().collect()
}
