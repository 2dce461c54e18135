//! Row sources for the reference table
//!
//! A row source knows how many records it holds, can fingerprint its content,
//! and streams delimited records lazily. The synchronizer uses the fingerprint
//! to name the persisted table and the row count to detect staleness.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Default field delimiter of `.RRF` reference files
pub const DEFAULT_DELIMITER: char = '|';

/// Errors produced while reading a row source
#[derive(Debug, Error)]
pub enum RowSourceError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed row {row}: expected {expected} fields, found {found}")]
    MalformedRow {
        row: u64,
        expected: usize,
        found: usize,
    },
}

impl RowSourceError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Lazy stream of field records
pub type Records<'a> = Box<dyn Iterator<Item = Result<Vec<String>, RowSourceError>> + Send + 'a>;

/// Supplier of reference-table records.
pub trait RowSource: Send + Sync {
    /// Number of records `rows()` will yield
    fn row_count(&self) -> u64;

    /// Content hash, stable for identical content
    fn fingerprint(&self) -> &str;

    /// Stream the records, fields in schema order
    fn rows(&self) -> Result<Records<'_>, RowSourceError>;
}

/// A delimited reference file on disk (`MRCONSO.RRF` layout).
///
/// Opening the file makes one streaming pass to hash the content and count
/// the non-blank lines; `rows()` re-reads it on demand.
#[derive(Debug, Clone)]
pub struct RrfFile {
    path: PathBuf,
    delimiter: char,
    row_count: u64,
    fingerprint: String,
}

impl RrfFile {
    /// Open a `|`-delimited file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RowSourceError> {
        Self::with_delimiter(path, DEFAULT_DELIMITER)
    }

    /// Open a file with a custom field delimiter
    pub fn with_delimiter(path: impl AsRef<Path>, delimiter: char) -> Result<Self, RowSourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| RowSourceError::io(path, e))?;

        let mut reader = BufReader::with_capacity(64 * 1024, file);
        let mut hasher = Sha256::new();
        let mut line = Vec::with_capacity(512);
        let mut row_count = 0u64;

        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| RowSourceError::io(path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&line);
            if !is_blank(&String::from_utf8_lossy(&line)) {
                row_count += 1;
            }
        }

        let fingerprint = format!("{:x}", hasher.finalize());
        debug!(
            "Fingerprinted {:?}: {} rows, sha256 {}",
            path, row_count, fingerprint
        );

        Ok(Self {
            path: path.to_path_buf(),
            delimiter,
            row_count,
            fingerprint,
        })
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RowSource for RrfFile {
    fn row_count(&self) -> u64 {
        self.row_count
    }

    fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn rows(&self) -> Result<Records<'_>, RowSourceError> {
        let file = File::open(&self.path).map_err(|e| RowSourceError::io(&self.path, e))?;
        let reader = BufReader::with_capacity(64 * 1024, file);
        let delimiter = self.delimiter;
        let path = self.path.clone();

        let records = reader.lines().filter_map(move |line| match line {
            Ok(line) if is_blank(&line) => None,
            Ok(line) => Some(Ok(split_record(&line, delimiter))),
            Err(e) => Some(Err(RowSourceError::io(&path, e))),
        });

        Ok(Box::new(records))
    }
}

/// Lines that hold no record. Counting and iteration both go through here.
fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Split one line into fields, dropping the single trailing delimiter RRF
/// lines carry.
pub fn split_record(line: &str, delimiter: char) -> Vec<String> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let line = line.strip_suffix(delimiter).unwrap_or(line);
    line.split(delimiter).map(str::to_string).collect()
}

/// Records held in memory.
#[derive(Debug, Clone)]
pub struct MemoryRows {
    records: Vec<Vec<String>>,
    fingerprint: String,
}

impl MemoryRows {
    /// Wrap already-split records
    pub fn new(records: Vec<Vec<String>>) -> Self {
        let mut hasher = Sha256::new();
        for record in &records {
            for (i, field) in record.iter().enumerate() {
                if i > 0 {
                    hasher.update([0x1f_u8]);
                }
                hasher.update(field.as_bytes());
            }
            hasher.update([b'\n']);
        }
        let fingerprint = format!("{:x}", hasher.finalize());
        Self {
            records,
            fingerprint,
        }
    }
}

impl RowSource for MemoryRows {
    fn row_count(&self) -> u64 {
        self.records.len() as u64
    }

    fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn rows(&self) -> Result<Records<'_>, RowSourceError> {
        Ok(Box::new(self.records.iter().cloned().map(Ok)))
    }
}
