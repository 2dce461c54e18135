//! Connection acquisition for the reference store
//!
//! Every store operation acquires its own connection from a
//! [`ConnectionFactory`] and releases it when the operation returns. Dropping
//! the connection closes it on every exit path, including `?` early returns.

use rusqlite::{Connection, Result as SqliteResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::StoreError;

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of fresh store connections.
pub trait ConnectionFactory: Send + Sync {
    /// Open a new connection
    fn connect(&self) -> Result<Connection, StoreError>;

    /// Stable description of the database the connections point at
    fn location(&self) -> String;
}

/// Connections to a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteConnectionFactory {
    path: PathBuf,
}

impl SqliteConnectionFactory {
    /// Connections to the database at `path` (created on first connect)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configure connection with optimal settings
    fn configure_connection(conn: &Connection) -> SqliteResult<()> {
        // WAL lets readers proceed while a rebuild holds the write side
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        // Negative value = KB
        conn.pragma_update(None, "cache_size", -64000)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(())
    }
}

impl ConnectionFactory for SqliteConnectionFactory {
    fn connect(&self) -> Result<Connection, StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::create_dir(parent, e))?;
            }
        }

        let conn =
            Connection::open(&self.path).map_err(|e| StoreError::connect(&self.path, e))?;
        Self::configure_connection(&conn).map_err(|e| StoreError::connect(&self.path, e))?;
        Ok(conn)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
