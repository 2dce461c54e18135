//! Store Synchronizer
//!
//! Makes the persisted table match a row source. A table whose row count
//! equals the source's declared count is accepted as current; anything else
//! is rebuilt from scratch:
//!
//! 1. drop the table (and any leftover staging table)
//! 2. create a staging table and stream records into it, committing every
//!    `batch_size` rows
//! 3. index the lookup columns
//! 4. rename the staging table to its final name
//!
//! Only a completed build ever carries the final name, so an interrupted
//! rebuild shows up as `Absent` on the next run.

use rusqlite::{params_from_iter, Connection};
use tracing::{debug, info, warn};

use super::{count_rows, schema, ConceptStore, Result, StoreError};
use crate::rows::{RowSource, RowSourceError};

/// Default number of rows per committed batch
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// Freshness of the persisted table relative to a row source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    /// Table exists with exactly the expected number of rows
    Current,
    /// Table does not exist
    Absent,
    /// Table exists with a different number of rows
    Stale { found: u64, expected: u64 },
}

impl TableState {
    /// Classify an observed row count
    pub fn from_count(found: Option<u64>, expected: u64) -> Self {
        match found {
            None => TableState::Absent,
            Some(found) if found == expected => TableState::Current,
            Some(found) => TableState::Stale { found, expected },
        }
    }

    pub fn is_current(&self) -> bool {
        matches!(self, TableState::Current)
    }
}

/// Ingestion progress after a committed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncProgress {
    pub loaded: u64,
    pub total: u64,
}

impl SyncProgress {
    /// Percentage of the expected total loaded so far (0.0 - 100.0)
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.loaded as f64 * 100.0 / self.total as f64
        }
    }
}

/// Outcome of [`StoreSynchronizer::ensure_store`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Final table name
    pub table: String,
    /// State observed before any action was taken
    pub state: TableState,
    /// Whether the table was rebuilt
    pub rebuilt: bool,
    /// Rows loaded by the rebuild (0 when the table was current)
    pub rows_loaded: u64,
}

/// Brings a [`ConceptStore`]'s table in line with a row source.
pub struct StoreSynchronizer<'a> {
    store: &'a ConceptStore,
    batch_size: usize,
    progress: Option<&'a (dyn Fn(SyncProgress) + Sync)>,
}

impl<'a> StoreSynchronizer<'a> {
    /// Synchronizer committing every `batch_size` rows (minimum 1)
    pub fn new(store: &'a ConceptStore, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            progress: None,
        }
    }

    /// Report progress after every committed batch
    pub fn with_progress(mut self, progress: &'a (dyn Fn(SyncProgress) + Sync)) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Ensure the table is current, rebuilding it if not.
    ///
    /// Holds the table's exclusive lock for the whole check-and-rebuild, so
    /// concurrent readers wait and concurrent synchronizers rebuild at most
    /// once.
    pub fn ensure_store(&self, rows: &dyn RowSource) -> Result<SyncReport> {
        let table = self.store.table();
        let expected = rows.row_count();

        let _guard = self.store.write_lock();
        let mut conn = self.store.factory().connect()?;

        let found =
            count_rows(&conn, table).map_err(|e| StoreError::query(table, "count rows", e))?;
        let state = TableState::from_count(found, expected);

        match state {
            TableState::Current => {
                debug!("Table {} is current ({} rows)", table, expected);
                return Ok(SyncReport {
                    table: table.to_string(),
                    state,
                    rebuilt: false,
                    rows_loaded: 0,
                });
            }
            TableState::Absent => {
                info!("Table {} not found, building from {} rows", table, expected);
            }
            TableState::Stale { found, expected } => {
                warn!(
                    "Table {} is stale ({} rows, expected {}), rebuilding",
                    table, found, expected
                );
            }
        }

        let rows_loaded = self.rebuild(&mut conn, rows)?;
        info!("Table {} ready: {} rows indexed", table, rows_loaded);

        Ok(SyncReport {
            table: table.to_string(),
            state,
            rebuilt: true,
            rows_loaded,
        })
    }

    /// Drop, reload and reindex the table. Caller holds the write lock.
    fn rebuild(&self, conn: &mut Connection, rows: &dyn RowSource) -> Result<u64> {
        let table = self.store.table();
        let staging = schema::staging_name(table);
        let expected = rows.row_count();

        conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS \"{}\"; DROP TABLE IF EXISTS \"{}\";",
            table, staging
        ))
        .map_err(|e| StoreError::query(table, "drop table", e))?;
        conn.execute_batch(&schema::create_table_sql(&staging))
            .map_err(|e| StoreError::query(&staging, "create table", e))?;

        let insert = schema::insert_sql(&staging);
        let mut batch: Vec<Vec<String>> = Vec::with_capacity(self.batch_size.min(65_536));
        let mut loaded = 0u64;

        for record in rows.rows()? {
            let record = record?;
            if record.len() != schema::COLUMN_COUNT {
                return Err(RowSourceError::MalformedRow {
                    row: loaded + batch.len() as u64 + 1,
                    expected: schema::COLUMN_COUNT,
                    found: record.len(),
                }
                .into());
            }

            batch.push(record);
            if batch.len() == self.batch_size {
                self.flush(conn, &insert, &staging, &mut batch, &mut loaded, expected)?;
            }
        }
        self.flush(conn, &insert, &staging, &mut batch, &mut loaded, expected)?;

        if loaded != expected {
            return Err(StoreError::RowCountMismatch {
                table: table.to_string(),
                expected,
                loaded,
            });
        }

        conn.execute_batch(&schema::create_indexes_sql(&staging))
            .map_err(|e| StoreError::query(&staging, "create indexes", e))?;
        conn.execute_batch(&format!(
            "ALTER TABLE \"{}\" RENAME TO \"{}\"",
            staging, table
        ))
        .map_err(|e| StoreError::query(table, "rename staging table", e))?;

        Ok(loaded)
    }

    /// Insert and commit one batch, then report progress
    fn flush(
        &self,
        conn: &mut Connection,
        insert: &str,
        staging: &str,
        batch: &mut Vec<Vec<String>>,
        loaded: &mut u64,
        total: u64,
    ) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        insert_batch(conn, insert, batch)
            .map_err(|e| StoreError::query(staging, "insert rows", e))?;
        *loaded += batch.len() as u64;
        batch.clear();

        let progress = SyncProgress {
            loaded: *loaded,
            total,
        };
        info!(
            "Loaded {}/{} rows into {} ({:.1}%)",
            progress.loaded,
            total,
            staging,
            progress.percent()
        );
        if let Some(report) = self.progress {
            report(progress);
        }

        Ok(())
    }
}

/// Insert records in a single transaction
fn insert_batch(conn: &mut Connection, insert: &str, batch: &[Vec<String>]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached(insert)?;
        for record in batch {
            stmt.execute(params_from_iter(record.iter()))?;
        }
    }
    tx.commit()
}
