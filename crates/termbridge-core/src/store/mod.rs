//! Persisted Reference Store
//!
//! SQLite-backed storage for one version of the reference file:
//! - One table per file version, named from the content fingerprint
//! - Scoped connections acquired per operation
//! - Shared/exclusive per-table locking (reads vs. rebuild)
//! - Parameterized `DISTINCT` lookups used by the query engine
//!
//! # Architecture
//!
//! ```text
//! ConceptStore
//! ├── ConnectionFactory (fresh connection per operation)
//! ├── table lock (process-wide, keyed by database + table)
//! └── query counter
//!
//! StoreSynchronizer
//! └── staleness check → drop / create staging / batched load / index / rename
//! ```

pub mod connection;
pub mod schema;
pub mod sync;

pub use connection::{ConnectionFactory, SqliteConnectionFactory};
pub use sync::{StoreSynchronizer, SyncProgress, SyncReport, TableState};

use crate::halfmap::HalfMap;
use crate::rows::RowSourceError;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Result as SqliteResult};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store '{path}': {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to create store directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} on table '{table}' failed: {source}")]
    Query {
        table: String,
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("invalid table prefix '{0}': must be a plain SQL identifier")]
    InvalidTablePrefix(String),

    #[error("table '{table}' received {loaded} rows but the row source declared {expected}")]
    RowCountMismatch {
        table: String,
        expected: u64,
        loaded: u64,
    },

    #[error("row source error: {0}")]
    RowSource(#[from] RowSourceError),
}

impl StoreError {
    /// Create a Connect error.
    pub fn connect(path: impl Into<PathBuf>, source: rusqlite::Error) -> Self {
        Self::Connect {
            path: path.into(),
            source,
        }
    }

    /// Create a CreateDir error.
    pub fn create_dir(path: &Path, source: std::io::Error) -> Self {
        Self::CreateDir {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Create a Query error carrying the failed operation's intent.
    pub fn query(table: &str, operation: &'static str, source: rusqlite::Error) -> Self {
        Self::Query {
            table: table.to_string(),
            operation,
            source,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Per-table locks shared by every store handle in the process
static TABLE_LOCKS: Lazy<DashMap<String, Arc<RwLock<()>>>> = Lazy::new(DashMap::new);

fn table_lock(location: &str, table: &str) -> Arc<RwLock<()>> {
    TABLE_LOCKS
        .entry(format!("{}::{}", location, table))
        .or_insert_with(|| Arc::new(RwLock::new(())))
        .clone()
}

/// Handle on the persisted table for one file version.
///
/// Thread-safe: all methods take `&self`. Each call acquires a connection,
/// holds the table's shared lock while it runs, and releases both on return.
pub struct ConceptStore {
    factory: Arc<dyn ConnectionFactory>,
    table: String,
    lock: Arc<RwLock<()>>,
    queries: AtomicU64,
}

impl ConceptStore {
    /// Handle on `{prefix}_{fingerprint}` in the factory's database
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        prefix: &str,
        fingerprint: &str,
    ) -> Result<Self> {
        let table = schema::table_name(prefix, fingerprint);
        if !schema::is_identifier(prefix) || !schema::is_identifier(&table) {
            return Err(StoreError::InvalidTablePrefix(prefix.to_string()));
        }

        let lock = table_lock(&factory.location(), &table);
        Ok(Self {
            factory,
            table,
            lock,
            queries: AtomicU64::new(0),
        })
    }

    /// Name of the backing table
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Number of read queries issued through this handle
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    pub(crate) fn factory(&self) -> &dyn ConnectionFactory {
        self.factory.as_ref()
    }

    pub(crate) fn read_lock(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read()
    }

    pub(crate) fn write_lock(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write()
    }

    /// Run one read against a fresh connection under the shared lock
    fn read<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Connection) -> SqliteResult<T>,
    ) -> Result<T> {
        let _guard = self.read_lock();
        let conn = self.factory.connect()?;
        self.queries.fetch_add(1, Ordering::Relaxed);
        f(&conn).map_err(|e| StoreError::query(&self.table, operation, e))
    }

    // =========================================================================
    // Table state
    // =========================================================================

    /// Row count of the table, or `None` when it does not exist
    pub fn row_count(&self) -> Result<Option<u64>> {
        self.read("count rows", |conn| count_rows(conn, &self.table))
    }

    /// Compare the table against the row count a row source declares
    pub fn state(&self, expected: u64) -> Result<TableState> {
        Ok(TableState::from_count(self.row_count()?, expected))
    }

    // =========================================================================
    // Half-map queries
    // =========================================================================

    /// All half-maps of one source system
    pub fn halfmaps_for_source(&self, source: &str) -> Result<Vec<HalfMap>> {
        let sql = format!(
            "SELECT DISTINCT {} FROM \"{}\" WHERE SAB = ?",
            schema::HALFMAP_COLUMNS,
            self.table
        );
        self.read("select half-maps by source", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let halfmaps = stmt
                .query_map([source], row_to_halfmap)?
                .collect::<SqliteResult<Vec<_>>>()?;
            Ok(halfmaps)
        })
    }

    /// Half-maps of one source system restricted to `codes`
    pub fn halfmaps_for_codes(&self, source: &str, codes: &[&str]) -> Result<Vec<HalfMap>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT DISTINCT {} FROM \"{}\" WHERE SAB = ? AND CODE IN ({})",
            schema::HALFMAP_COLUMNS,
            self.table,
            schema::placeholders(codes.len())
        );
        let params = std::iter::once(source).chain(codes.iter().copied());

        self.read("select half-maps by code", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let halfmaps = stmt
                .query_map(params_from_iter(params), row_to_halfmap)?
                .collect::<SqliteResult<Vec<_>>>()?;
            Ok(halfmaps)
        })
    }

    /// Half-maps of the given concepts, optionally restricted to one source
    pub fn halfmaps_for_concepts(
        &self,
        concept_ids: &[&str],
        source: Option<&str>,
    ) -> Result<Vec<HalfMap>> {
        if concept_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "SELECT DISTINCT {} FROM \"{}\" WHERE CUI IN ({})",
            schema::HALFMAP_COLUMNS,
            self.table,
            schema::placeholders(concept_ids.len())
        );
        if source.is_some() {
            sql.push_str(" AND SAB = ?");
        }
        let params = concept_ids.iter().copied().chain(source);

        self.read("select half-maps by concept", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let halfmaps = stmt
                .query_map(params_from_iter(params), row_to_halfmap)?
                .collect::<SqliteResult<Vec<_>>>()?;
            Ok(halfmaps)
        })
    }

    // =========================================================================
    // Identifier lookups
    // =========================================================================

    /// Distinct concept ids of the given atoms
    pub fn concepts_for_atoms(&self, atom_ids: &[&str]) -> Result<BTreeSet<String>> {
        self.distinct_column("CUI", "AUI", atom_ids, "select concepts by atom")
    }

    /// Distinct atom ids of the given concepts
    pub fn atoms_for_concepts(&self, concept_ids: &[&str]) -> Result<BTreeSet<String>> {
        self.distinct_column("AUI", "CUI", concept_ids, "select atoms by concept")
    }

    /// Distinct `(code, concept id)` pairs of one source system
    pub fn concepts_for_codes(&self, source: &str, codes: &[&str]) -> Result<Vec<(String, String)>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT DISTINCT CODE, CUI FROM \"{}\" WHERE SAB = ? AND CODE IN ({})",
            self.table,
            schema::placeholders(codes.len())
        );
        let params = std::iter::once(source).chain(codes.iter().copied());

        self.read("select concepts by code", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let pairs = stmt
                .query_map(params_from_iter(params), |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<SqliteResult<Vec<_>>>()?;
            Ok(pairs)
        })
    }

    fn distinct_column(
        &self,
        select: &str,
        filter: &str,
        values: &[&str],
        operation: &'static str,
    ) -> Result<BTreeSet<String>> {
        if values.is_empty() {
            return Ok(BTreeSet::new());
        }

        let sql = format!(
            "SELECT DISTINCT {} FROM \"{}\" WHERE {} IN ({})",
            select,
            self.table,
            filter,
            schema::placeholders(values.len())
        );

        self.read(operation, |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let ids = stmt
                .query_map(params_from_iter(values.iter()), |row| row.get(0))?
                .collect::<SqliteResult<BTreeSet<String>>>()?;
            Ok(ids)
        })
    }
}

/// Row count of `table`, `None` if it does not exist
pub(crate) fn count_rows(conn: &Connection, table: &str) -> SqliteResult<Option<u64>> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if !exists {
        return Ok(None);
    }

    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |row| {
        row.get(0)
    })?;
    Ok(Some(count as u64))
}

/// Convert a database row to a HalfMap
fn row_to_halfmap(row: &rusqlite::Row<'_>) -> SqliteResult<HalfMap> {
    Ok(HalfMap {
        concept_id: row.get(0)?,
        atom_id: row.get(1)?,
        source: row.get(2)?,
        code: row.get(3)?,
        label: row.get(4)?,
    })
}
