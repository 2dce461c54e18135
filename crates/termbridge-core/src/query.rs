//! Half-Map Query Engine
//!
//! Resolves half-maps for a source system through the cache first and the
//! store second. Uncached codes are fetched in bounded windows so that no
//! single statement exceeds the backend's parameter limit.
//!
//! Window plan for `n` uncached codes and a target of `w` windows:
//! every window holds `ceil(n / w)` codes (capped by `max_window_params`),
//! except the last, which holds whatever remains. So 25 codes over 10
//! windows gives eight windows of 3 and a ninth holding the last code;
//! windows never exceed the target size and never overlap.

use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{signature, HalfMapCache, Memo};
use crate::halfmap::{CacheKey, HalfMap};
use crate::store::{ConceptStore, Result};

/// Default number of windows an uncached request is split into
pub const DEFAULT_WINDOWS: usize = 10;

/// Default cap on codes per window (SQLite binds at most 32766 parameters)
pub const DEFAULT_MAX_WINDOW_PARAMS: usize = 30_000;

/// Tuning for windowed lookups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Target number of windows (minimum 1)
    pub windows: usize,
    /// Maximum codes bound in one statement
    pub max_window_params: usize,
    /// Query windows concurrently on the rayon pool
    pub parallel_windows: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            windows: DEFAULT_WINDOWS,
            max_window_params: DEFAULT_MAX_WINDOW_PARAMS,
            parallel_windows: false,
        }
    }
}

/// Number of codes per window for `n` codes split `windows` ways
pub fn window_size(n: usize, windows: usize, max_window_params: usize) -> usize {
    n.div_ceil(windows.max(1)).min(max_window_params).max(1)
}

/// Cache-fronted half-map lookups.
pub struct HalfMapQueryEngine {
    store: Arc<ConceptStore>,
    cache: Arc<dyn HalfMapCache>,
    options: QueryOptions,
    by_concepts: Memo<Vec<HalfMap>>,
}

impl HalfMapQueryEngine {
    pub fn new(store: Arc<ConceptStore>, cache: Arc<dyn HalfMapCache>, options: QueryOptions) -> Self {
        Self {
            store,
            cache,
            options,
            by_concepts: Memo::new(),
        }
    }

    pub fn store(&self) -> &ConceptStore {
        &self.store
    }

    pub fn cache(&self) -> &dyn HalfMapCache {
        self.cache.as_ref()
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Half-maps of `source` for `codes`, or for every code when `codes` is
    /// empty.
    ///
    /// Every requested code ends up cached, including codes the source does
    /// not know (as an empty entry), so repeating a call never reaches the
    /// store. Result order is unspecified.
    pub fn halfmaps_for_codes<S: AsRef<str>>(&self, source: &str, codes: &[S]) -> Result<Vec<HalfMap>> {
        let mut seen = HashSet::new();
        let codes: Vec<&str> = codes
            .iter()
            .map(|c| c.as_ref())
            .filter(|code| seen.insert(*code))
            .collect();

        if codes.is_empty() {
            return self.warm_source(source);
        }

        let mut halfmaps = Vec::new();
        let mut uncached = Vec::new();
        for code in codes {
            match self.cache.get(&CacheKey::new(source, code)) {
                Some(hit) => halfmaps.extend(hit),
                None => uncached.push(code),
            }
        }

        if uncached.is_empty() {
            debug!("All codes for {} served from cache", source);
            return Ok(halfmaps);
        }

        let fetched = self.fetch_windows(source, &uncached)?;

        let mut groups: HashMap<&str, Vec<HalfMap>> =
            uncached.iter().map(|code| (*code, Vec::new())).collect();
        for hm in &fetched {
            if let Some(group) = groups.get_mut(hm.code.as_str()) {
                group.push(hm.clone());
            }
        }
        for (code, group) in groups {
            self.cache.put(CacheKey::new(source, code), group);
        }

        halfmaps.extend(fetched);
        Ok(halfmaps)
    }

    /// Load every half-map of `source` and file each code's group in the
    /// cache. Always queries.
    fn warm_source(&self, source: &str) -> Result<Vec<HalfMap>> {
        let halfmaps = self.store.halfmaps_for_source(source)?;

        let mut groups: HashMap<&str, Vec<HalfMap>> = HashMap::new();
        for hm in &halfmaps {
            groups.entry(hm.code.as_str()).or_default().push(hm.clone());
        }
        let codes = groups.len();
        for (code, group) in groups {
            self.cache.put(CacheKey::new(source, code), group);
        }

        info!(
            "Warmed cache for {}: {} half-maps across {} codes",
            source,
            halfmaps.len(),
            codes
        );
        Ok(halfmaps)
    }

    /// Query `codes` in windows, concatenating results in window order
    fn fetch_windows(&self, source: &str, codes: &[&str]) -> Result<Vec<HalfMap>> {
        let size = window_size(codes.len(), self.options.windows, self.options.max_window_params);
        let windows: Vec<&[&str]> = codes.chunks(size).collect();
        let total = windows.len();
        debug!(
            "Fetching {} uncached {} codes in {} windows of up to {}",
            codes.len(),
            source,
            total,
            size
        );

        let run = |(i, window): (usize, &&[&str])| -> Result<Vec<HalfMap>> {
            let halfmaps = self.store.halfmaps_for_codes(source, window)?;
            debug!(
                "Window {}/{}: {} codes, {} half-maps",
                i + 1,
                total,
                window.len(),
                halfmaps.len()
            );
            Ok(halfmaps)
        };

        let results: Vec<Vec<HalfMap>> = if self.options.parallel_windows && total > 1 {
            windows.par_iter().enumerate().map(run).collect::<Result<_>>()?
        } else {
            windows.iter().enumerate().map(run).collect::<Result<_>>()?
        };

        Ok(results.into_iter().flatten().collect())
    }

    /// Half-maps of the given concepts, optionally restricted to one source.
    ///
    /// One statement for the whole set; results are memoized per argument
    /// set, apart from the per-code cache.
    pub fn halfmaps_by_concept_ids<S: AsRef<str>>(
        &self,
        concept_ids: &[S],
        source: Option<&str>,
    ) -> Result<Vec<HalfMap>> {
        if concept_ids.is_empty() {
            return Ok(Vec::new());
        }

        let operation = match source {
            Some(source) => format!("halfmaps_by_concept_ids:{}", source),
            None => "halfmaps_by_concept_ids".to_string(),
        };
        self.by_concepts
            .get_or_try_insert_with(signature(&operation, concept_ids), || {
                let mut ids: Vec<&str> = concept_ids.iter().map(|c| c.as_ref()).collect();
                ids.sort_unstable();
                ids.dedup();
                self.store.halfmaps_for_concepts(&ids, source)
            })
    }
}
