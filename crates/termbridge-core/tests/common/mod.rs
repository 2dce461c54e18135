//! Common test utilities for integration tests.
//!
//! Builds reference records and files and opens mappers over temporary
//! databases.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use termbridge_core::store::schema::COLUMN_COUNT;
use termbridge_core::{ConceptMapper, MapperOptions, RowSource, SqliteConnectionFactory};

/// Path of a file under `tests/fixtures`
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// A full reference record with the five mapped columns set
pub fn record(cui: &str, aui: &str, sab: &str, code: &str, label: &str) -> Vec<String> {
    let mut fields = vec![String::new(); COLUMN_COUNT];
    fields[0] = cui.to_string();
    fields[1] = "ENG".to_string();
    fields[7] = aui.to_string();
    fields[11] = sab.to_string();
    fields[13] = code.to_string();
    fields[14] = label.to_string();
    fields
}

/// Write records as a `|`-terminated RRF file
pub fn write_rrf(dir: &Path, name: &str, records: &[Vec<String>]) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).expect("Failed to create RRF file");
    for record in records {
        writeln!(file, "{}|", record.join("|")).expect("Failed to write RRF line");
    }
    path
}

/// `n` single-atom concepts in `source` with codes `X0..Xn`
pub fn numbered_records(n: usize, source: &str) -> Vec<Vec<String>> {
    (0..n)
        .map(|i| {
            record(
                &format!("C{:04}", i),
                &format!("A{:04}", i),
                source,
                &format!("X{}", i),
                &format!("label {}", i),
            )
        })
        .collect()
}

/// Database path inside a fresh temp dir
pub fn temp_db() -> (TempDir, PathBuf) {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let db = temp.path().join("termbridge.db");
    (temp, db)
}

/// Open a mapper over `db` with the given options
pub fn open_mapper(db: &Path, rows: &dyn RowSource, options: MapperOptions) -> ConceptMapper {
    let factory = Arc::new(SqliteConnectionFactory::new(db));
    ConceptMapper::open_with_options(factory, rows, options).expect("Failed to open mapper")
}
