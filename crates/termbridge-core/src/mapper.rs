//! Concept Mapper
//!
//! Entry point tying the pieces together. Opening a mapper synchronizes the
//! store with the row source once; after that every lookup goes through the
//! shared cache and the store handle.
//!
//! # Example
//!
//! ```no_run
//! use termbridge_core::{ConceptMapper, RrfFile};
//!
//! let rows = RrfFile::open("MRCONSO.RRF")?;
//! let mapper = ConceptMapper::open("termbridge.db", &rows)?;
//! let mappings = mapper.cross_map("ICD10CM", &["I21.9"], "SNOMEDCT_US", &[] as &[&str])?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::cache::{BoundedCache, HalfMapCache, UnboundedCache};
use crate::crossmap::{cross_map, merge_by_code_pair};
use crate::halfmap::{HalfMap, Mapping};
use crate::lookup::AuxiliaryLookups;
use crate::query::{HalfMapQueryEngine, QueryOptions, DEFAULT_MAX_WINDOW_PARAMS, DEFAULT_WINDOWS};
use crate::rows::RowSource;
use crate::store::schema::DEFAULT_TABLE_PREFIX;
use crate::store::sync::DEFAULT_BATCH_SIZE;
use crate::store::{
    ConceptStore, ConnectionFactory, Result, SqliteConnectionFactory, StoreSynchronizer,
    SyncProgress, SyncReport,
};

/// Mapper settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperOptions {
    /// Prefix of the persisted table name
    pub table_prefix: String,
    /// Rows per committed batch during a rebuild
    pub batch_size: usize,
    /// Target window count for uncached code lookups
    pub windows: usize,
    /// Maximum codes bound in one lookup statement
    pub max_window_params: usize,
    /// Query windows concurrently
    pub parallel_windows: bool,
    /// Bound the half-map cache to this many keys (unbounded when `None`)
    pub cache_capacity: Option<usize>,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            windows: DEFAULT_WINDOWS,
            max_window_params: DEFAULT_MAX_WINDOW_PARAMS,
            parallel_windows: false,
            cache_capacity: None,
        }
    }
}

impl MapperOptions {
    fn query_options(&self) -> QueryOptions {
        QueryOptions {
            windows: self.windows,
            max_window_params: self.max_window_params,
            parallel_windows: self.parallel_windows,
        }
    }

    fn build_cache(&self) -> Arc<dyn HalfMapCache> {
        match self.cache_capacity {
            Some(capacity) => Arc::new(BoundedCache::new(capacity)),
            None => Arc::new(UnboundedCache::new()),
        }
    }
}

/// Counters for observing mapper behaviour
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MapperStats {
    /// Read statements issued against the store
    pub store_queries: u64,
    /// Half-map cache hits
    pub cache_hits: u64,
    /// Half-map cache misses
    pub cache_misses: u64,
    /// Keys held by the half-map cache
    pub cached_keys: usize,
}

/// Cross-terminology mapper over one reference file version.
///
/// Thread-safe: all lookups take `&self`.
pub struct ConceptMapper {
    store: Arc<ConceptStore>,
    engine: HalfMapQueryEngine,
    lookups: AuxiliaryLookups,
    sync_report: SyncReport,
}

impl ConceptMapper {
    /// Open a mapper over a SQLite database file with default options
    pub fn open(database: impl Into<PathBuf>, rows: &dyn RowSource) -> Result<Self> {
        let factory = Arc::new(SqliteConnectionFactory::new(database));
        Self::open_with_options(factory, rows, MapperOptions::default())
    }

    /// Open a mapper with explicit options
    pub fn open_with_options(
        factory: Arc<dyn ConnectionFactory>,
        rows: &dyn RowSource,
        options: MapperOptions,
    ) -> Result<Self> {
        let cache = options.build_cache();
        Self::build(factory, rows, &options, cache, None)
    }

    /// Open a mapper, reporting rebuild progress after every batch
    pub fn open_with_progress(
        factory: Arc<dyn ConnectionFactory>,
        rows: &dyn RowSource,
        options: MapperOptions,
        progress: &(dyn Fn(SyncProgress) + Sync),
    ) -> Result<Self> {
        let cache = options.build_cache();
        Self::build(factory, rows, &options, cache, Some(progress))
    }

    /// Open a mapper around a caller-supplied half-map cache
    pub fn open_with_cache(
        factory: Arc<dyn ConnectionFactory>,
        rows: &dyn RowSource,
        options: MapperOptions,
        cache: Arc<dyn HalfMapCache>,
    ) -> Result<Self> {
        Self::build(factory, rows, &options, cache, None)
    }

    fn build(
        factory: Arc<dyn ConnectionFactory>,
        rows: &dyn RowSource,
        options: &MapperOptions,
        cache: Arc<dyn HalfMapCache>,
        progress: Option<&(dyn Fn(SyncProgress) + Sync)>,
    ) -> Result<Self> {
        let location = factory.location();
        let store = Arc::new(ConceptStore::new(
            factory,
            &options.table_prefix,
            rows.fingerprint(),
        )?);

        let mut synchronizer = StoreSynchronizer::new(&store, options.batch_size);
        if let Some(progress) = progress {
            synchronizer = synchronizer.with_progress(progress);
        }
        let sync_report = synchronizer.ensure_store(rows)?;

        info!(
            "Opened concept mapper on {} ({}, {} rows, rebuilt: {})",
            location,
            sync_report.table,
            rows.row_count(),
            sync_report.rebuilt
        );

        let engine = HalfMapQueryEngine::new(Arc::clone(&store), cache, options.query_options());
        let lookups = AuxiliaryLookups::new(Arc::clone(&store));

        Ok(Self {
            store,
            engine,
            lookups,
            sync_report,
        })
    }

    /// Name of the backing table
    pub fn table(&self) -> &str {
        self.store.table()
    }

    /// What opening the mapper did to the store
    pub fn sync_report(&self) -> &SyncReport {
        &self.sync_report
    }

    /// Half-maps of `source` for `codes` (every code when empty)
    pub fn halfmaps_for_codes<S: AsRef<str>>(&self, source: &str, codes: &[S]) -> Result<Vec<HalfMap>> {
        self.engine.halfmaps_for_codes(source, codes)
    }

    /// Half-maps of the given concepts, optionally restricted to one source
    pub fn halfmaps_by_concept_ids<S: AsRef<str>>(
        &self,
        concept_ids: &[S],
        source: Option<&str>,
    ) -> Result<Vec<HalfMap>> {
        self.engine.halfmaps_by_concept_ids(concept_ids, source)
    }

    /// Code mappings from `from_source` to `to_source` through shared
    /// concepts.
    ///
    /// Empty code lists select every code of that source.
    pub fn cross_map<F: AsRef<str>, T: AsRef<str>>(
        &self,
        from_source: &str,
        from_codes: &[F],
        to_source: &str,
        to_codes: &[T],
    ) -> Result<Vec<Mapping>> {
        let from = self.engine.halfmaps_for_codes(from_source, from_codes)?;
        let to = self.engine.halfmaps_for_codes(to_source, to_codes)?;
        Ok(cross_map(from_source, &from, to_source, &to))
    }

    /// Like [`cross_map`](Self::cross_map), with one mapping per code pair
    pub fn cross_map_merged<F: AsRef<str>, T: AsRef<str>>(
        &self,
        from_source: &str,
        from_codes: &[F],
        to_source: &str,
        to_codes: &[T],
    ) -> Result<Vec<Mapping>> {
        let mappings = self.cross_map(from_source, from_codes, to_source, to_codes)?;
        Ok(merge_by_code_pair(mappings))
    }

    pub fn concept_ids_for_atom_ids<S: AsRef<str>>(&self, atom_ids: &[S]) -> Result<BTreeSet<String>> {
        self.lookups.concept_ids_for_atom_ids(atom_ids)
    }

    pub fn atom_ids_for_concept_ids<S: AsRef<str>>(
        &self,
        concept_ids: &[S],
    ) -> Result<BTreeSet<String>> {
        self.lookups.atom_ids_for_concept_ids(concept_ids)
    }

    pub fn concept_ids_for_codes<S: AsRef<str>>(
        &self,
        source: &str,
        codes: &[S],
    ) -> Result<BTreeMap<String, Vec<String>>> {
        self.lookups.concept_ids_for_codes(source, codes)
    }

    /// Snapshot of query and cache counters
    pub fn stats(&self) -> MapperStats {
        let cache = self.engine.cache();
        let metrics = cache.metrics();
        MapperStats {
            store_queries: self.store.query_count(),
            cache_hits: metrics.hits,
            cache_misses: metrics.misses,
            cached_keys: cache.len(),
        }
    }
}
