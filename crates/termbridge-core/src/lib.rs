//! Termbridge Core - Cross-terminology concept mapping
//!
//! This crate provides the mapping engine over a concept reference file
//! (`MRCONSO.RRF` layout):
//! - Row sources that stream and fingerprint the reference file
//! - A SQLite store materialized once per file version and rebuilt when stale
//! - A `(source, code)` half-map cache in front of the store
//! - Windowed batch lookups of half-maps by code or concept id
//! - Cross-mapping of codes between two source systems via shared concepts
//! - Identifier lookups between atoms, concepts and codes
//! - Exact label matching over RDF-style triples

pub mod cache;
pub mod crossmap;
pub mod halfmap;
pub mod labels;
pub mod lookup;
pub mod mapper;
pub mod query;
pub mod rows;
pub mod store;

// Re-exports for convenience
pub use cache::{BoundedCache, CacheMetrics, HalfMapCache, Memo, UnboundedCache};
pub use crossmap::{cross_map, merge_by_code_pair};
pub use halfmap::{CacheKey, HalfMap, Mapping};
pub use labels::{LabelMatcher, Term, Triple, RDFS_LABEL, SKOS_ALT_LABEL, SKOS_PREF_LABEL};
pub use lookup::AuxiliaryLookups;
pub use mapper::{ConceptMapper, MapperOptions, MapperStats};
pub use query::{window_size, HalfMapQueryEngine, QueryOptions};
pub use rows::{MemoryRows, RowSource, RowSourceError, RrfFile};

// Store re-exports
pub use store::{
    ConceptStore, ConnectionFactory, SqliteConnectionFactory, StoreError, StoreSynchronizer,
    SyncProgress, SyncReport, TableState,
};
