//! End-to-end mapping tests for termbridge-core.
//!
//! These tests drive the mapper the way callers do:
//! - Materializing a reference file and reopening it
//! - Cache behaviour observed through the query counter
//! - Windowed lookups against single-statement lookups
//! - Cross-mapping over a realistic sample file
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package termbridge-core --test mapping_integration
//! ```

mod common;

use std::collections::BTreeSet;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use pretty_assertions::assert_eq;
use termbridge_core::{
    ConceptMapper, HalfMap, MapperOptions, MemoryRows, RowSource, RrfFile,
    SqliteConnectionFactory, SyncProgress, TableState,
};

use common::{fixture, numbered_records, open_mapper, record, temp_db, write_rrf};

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn sorted(mut halfmaps: Vec<HalfMap>) -> Vec<HalfMap> {
    halfmaps.sort();
    halfmaps
}

// ============================================================================
// Store Lifecycle
// ============================================================================

#[test]
fn test_end_to_end_single_mapping() {
    let (temp, db) = temp_db();
    let path = write_rrf(
        temp.path(),
        "MRCONSO.RRF",
        &[
            record("C1", "A1", "SRC1", "X1", "label1"),
            record("C1", "A2", "SRC2", "Y1", "label2"),
        ],
    );
    let rows = RrfFile::open(&path).unwrap();
    let mapper = ConceptMapper::open(&db, &rows).unwrap();

    let mappings = mapper.cross_map("SRC1", &["X1"], "SRC2", &["Y1"]).unwrap();

    assert_eq!(mappings.len(), 1);
    let m = &mappings[0];
    assert_eq!(m.from_code, "X1");
    assert_eq!(m.to_code, "Y1");
    assert_eq!(m.concept_ids, set(&["C1"]));
    assert_eq!(m.atom_ids, set(&["A1", "A2"]));
    assert_eq!(m.labels, set(&["label1", "label2"]));
}

#[test]
fn test_reopen_does_not_rebuild() {
    let (temp, db) = temp_db();
    let path = write_rrf(temp.path(), "MRCONSO.RRF", &numbered_records(250, "SRC"));
    let rows = RrfFile::open(&path).unwrap();
    let options = MapperOptions {
        batch_size: 100,
        ..MapperOptions::default()
    };

    let first = open_mapper(&db, &rows, options.clone());
    assert!(first.sync_report().rebuilt);
    assert_eq!(first.sync_report().state, TableState::Absent);
    assert_eq!(first.sync_report().rows_loaded, 250);
    drop(first);

    let second = open_mapper(&db, &rows, options);
    assert!(!second.sync_report().rebuilt);
    assert_eq!(second.sync_report().state, TableState::Current);
    assert_eq!(second.halfmaps_for_codes::<&str>("SRC", &[]).unwrap().len(), 250);
}

#[test]
fn test_new_file_version_gets_new_table() {
    let (temp, db) = temp_db();
    let v1 = write_rrf(temp.path(), "v1.RRF", &numbered_records(3, "SRC"));
    let v2 = write_rrf(temp.path(), "v2.RRF", &numbered_records(4, "SRC"));

    let a = ConceptMapper::open(&db, &RrfFile::open(&v1).unwrap()).unwrap();
    let b = ConceptMapper::open(&db, &RrfFile::open(&v2).unwrap()).unwrap();

    assert_ne!(a.table(), b.table());
    assert!(b.sync_report().rebuilt);
    // The first version's table is untouched
    assert_eq!(a.halfmaps_for_codes::<&str>("SRC", &[]).unwrap().len(), 3);
}

#[test]
fn test_malformed_file_fails_open() {
    let (temp, db) = temp_db();
    let path = temp.path().join("broken.RRF");
    std::fs::write(&path, "C1|ENG|P|\n").unwrap();
    let rows = RrfFile::open(&path).unwrap();

    let err = ConceptMapper::open(&db, &rows).err().unwrap();
    assert!(err.to_string().contains("expected 18 fields, found 3"));
}

// ============================================================================
// Cache and Windowing
// ============================================================================

#[test]
fn test_repeat_lookup_issues_no_query() {
    let (_temp, db) = temp_db();
    let rows = MemoryRows::new(numbered_records(50, "SRC"));
    let mapper = open_mapper(&db, &rows, MapperOptions::default());
    let codes = ["X3", "X7", "X11", "MISSING"];

    let first = mapper.halfmaps_for_codes("SRC", &codes).unwrap();
    let queries = mapper.stats().store_queries;
    let second = mapper.halfmaps_for_codes("SRC", &codes).unwrap();

    assert_eq!(mapper.stats().store_queries, queries);
    assert_eq!(sorted(first), sorted(second));
}

#[test]
fn test_windowed_lookup_matches_single_statement() {
    let rows = MemoryRows::new(numbered_records(97, "SRC"));
    let codes: Vec<String> = (0..97).map(|i| format!("X{}", i)).collect();

    let (_t1, db1) = temp_db();
    let windowed = open_mapper(
        &db1,
        &rows,
        MapperOptions {
            windows: 7,
            ..MapperOptions::default()
        },
    );
    let (_t2, db2) = temp_db();
    let single = open_mapper(
        &db2,
        &rows,
        MapperOptions {
            windows: 1,
            ..MapperOptions::default()
        },
    );

    let a = windowed.halfmaps_for_codes("SRC", &codes).unwrap();
    let b = single.halfmaps_for_codes("SRC", &codes).unwrap();

    assert_eq!(a.len(), 97);
    assert_eq!(sorted(a), sorted(b));
    // 97 codes in windows of 14: six full windows and one of 13
    assert_eq!(windowed.stats().store_queries, 7);
    assert_eq!(single.stats().store_queries, 1);
}

#[test]
fn test_window_cap_splits_large_requests() {
    let (_temp, db) = temp_db();
    let rows = MemoryRows::new(numbered_records(30, "SRC"));
    let mapper = open_mapper(
        &db,
        &rows,
        MapperOptions {
            windows: 1,
            max_window_params: 8,
            ..MapperOptions::default()
        },
    );
    let codes: Vec<String> = (0..30).map(|i| format!("X{}", i)).collect();

    assert_eq!(mapper.halfmaps_for_codes("SRC", &codes).unwrap().len(), 30);
    assert_eq!(mapper.stats().store_queries, 4);
}

#[test]
fn test_empty_inputs_short_circuit() {
    let (_temp, db) = temp_db();
    let rows = MemoryRows::new(numbered_records(5, "SRC"));
    let mapper = open_mapper(&db, &rows, MapperOptions::default());
    let none: &[&str] = &[];

    assert!(mapper.halfmaps_by_concept_ids(none, None).unwrap().is_empty());
    assert!(mapper.concept_ids_for_atom_ids(none).unwrap().is_empty());
    assert!(mapper.atom_ids_for_concept_ids(none).unwrap().is_empty());
    assert!(mapper.concept_ids_for_codes("SRC", none).unwrap().is_empty());

    assert_eq!(mapper.stats().store_queries, 0);
}

#[test]
fn test_concurrent_readers_share_cache() {
    let (_temp, db) = temp_db();
    let rows = MemoryRows::new(numbered_records(200, "SRC"));
    let mapper = Arc::new(open_mapper(
        &db,
        &rows,
        MapperOptions {
            parallel_windows: true,
            ..MapperOptions::default()
        },
    ));

    thread::scope(|s| {
        for t in 0..4 {
            let mapper = Arc::clone(&mapper);
            s.spawn(move || {
                let codes: Vec<String> = (0..200).filter(|i| i % 4 == t).map(|i| format!("X{}", i)).collect();
                let halfmaps = mapper.halfmaps_for_codes("SRC", &codes).unwrap();
                assert_eq!(halfmaps.len(), 50);
            });
        }
    });

    let before = mapper.stats().store_queries;
    let all: Vec<String> = (0..200).map(|i| format!("X{}", i)).collect();
    assert_eq!(mapper.halfmaps_for_codes("SRC", &all).unwrap().len(), 200);
    assert_eq!(mapper.stats().store_queries, before);
    assert_eq!(mapper.stats().cached_keys, 200);
}

#[test]
fn test_racing_synchronizers_rebuild_once() {
    let (_temp, db) = temp_db();
    let rows = MemoryRows::new(numbered_records(300, "SRC"));
    let options = MapperOptions {
        batch_size: 25,
        ..MapperOptions::default()
    };

    let reports: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let (db, rows, options) = (&db, &rows, options.clone());
                s.spawn(move || open_mapper(db, rows, options).sync_report().clone())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let rebuilt: Vec<_> = reports.iter().filter(|r| r.rebuilt).collect();
    assert_eq!(rebuilt.len(), 1);
    assert_eq!(rebuilt[0].state, TableState::Absent);
    assert_eq!(rebuilt[0].rows_loaded, 300);
    assert!(reports
        .iter()
        .filter(|r| !r.rebuilt)
        .all(|r| r.state == TableState::Current));

    let mapper = open_mapper(&db, &rows, MapperOptions::default());
    assert_eq!(mapper.halfmaps_for_codes("SRC", &[] as &[&str]).unwrap().len(), 300);
}

#[test]
fn test_open_during_rebuild_waits_for_full_table() {
    let (_temp, db) = temp_db();
    let rows = MemoryRows::new(numbered_records(200, "SRC"));
    let (tx, rx) = mpsc::channel();
    let first_batch = Mutex::new(Some(tx));

    // Fires while the builder still holds the table lock
    let on_progress = |_: SyncProgress| {
        if let Some(tx) = first_batch.lock().unwrap().take() {
            tx.send(()).unwrap();
        }
    };

    thread::scope(|s| {
        let builder = s.spawn(|| {
            let factory = Arc::new(SqliteConnectionFactory::new(&db));
            let options = MapperOptions {
                batch_size: 10,
                ..MapperOptions::default()
            };
            ConceptMapper::open_with_progress(factory, &rows, options, &on_progress)
                .unwrap()
                .sync_report()
                .clone()
        });

        rx.recv().unwrap();
        let reader = open_mapper(&db, &rows, MapperOptions::default());
        assert!(!reader.sync_report().rebuilt);
        assert_eq!(reader.sync_report().state, TableState::Current);
        assert_eq!(reader.halfmaps_for_codes("SRC", &[] as &[&str]).unwrap().len(), 200);

        let built = builder.join().unwrap();
        assert!(built.rebuilt);
        assert_eq!(built.rows_loaded, 200);
    });
}

// ============================================================================
// Sample Reference File
// ============================================================================

#[test]
fn test_sample_file_cross_map() {
    let (_temp, db) = temp_db();
    let rows = RrfFile::open(fixture("MRCONSO.sample.RRF")).unwrap();
    assert_eq!(rows.row_count(), 8);
    let mapper = ConceptMapper::open(&db, &rows).unwrap();

    let mappings = mapper
        .cross_map("ICD10CM", &["I21.9", "I50.9"], "SNOMEDCT_US", &["22298006", "42343007", "38341003"])
        .unwrap();

    let pairs: Vec<_> = mappings
        .iter()
        .map(|m| (m.from_code.as_str(), m.to_code.as_str()))
        .collect();
    // Ordered by concept id: C0018802 before C0027051; hypertension has no ICD10CM code
    assert_eq!(pairs, vec![("I50.9", "42343007"), ("I21.9", "22298006")]);

    let mi = &mappings[1];
    assert_eq!(mi.concept_ids, set(&["C0027051"]));
    assert_eq!(mi.atom_ids, set(&["A2880798", "A3037362", "A31543810"]));
    assert_eq!(
        mi.labels,
        set(&[
            "Acute myocardial infarction, unspecified",
            "Heart attack",
            "Myocardial infarction",
        ])
    );
}

#[test]
fn test_sample_file_whole_source_cross_map() {
    let (_temp, db) = temp_db();
    let rows = RrfFile::open(fixture("MRCONSO.sample.RRF")).unwrap();
    let mapper = ConceptMapper::open(&db, &rows).unwrap();
    let all: &[&str] = &[];

    let mappings = mapper.cross_map("MSH", all, "SNOMEDCT_US", all).unwrap();
    let pairs: BTreeSet<_> = mappings
        .iter()
        .map(|m| (m.from_code.clone(), m.to_code.clone()))
        .collect();

    assert_eq!(
        pairs,
        BTreeSet::from([
            ("D006973".to_string(), "38341003".to_string()),
            ("D009203".to_string(), "22298006".to_string()),
        ])
    );
}

#[test]
fn test_sample_file_lookups() {
    let (_temp, db) = temp_db();
    let rows = RrfFile::open(fixture("MRCONSO.sample.RRF")).unwrap();
    let mapper = ConceptMapper::open(&db, &rows).unwrap();

    let cuis = mapper.concept_ids_for_atom_ids(&["A0090200", "A2878427"]).unwrap();
    assert_eq!(cuis, set(&["C0018802", "C0027051"]));

    let auis = mapper.atom_ids_for_concept_ids(&["C0020538"]).unwrap();
    assert_eq!(auis, set(&["A0066371", "A2882186"]));

    let by_code = mapper
        .concept_ids_for_codes("SNOMEDCT_US", &["22298006", "99999999"])
        .unwrap();
    assert_eq!(by_code.len(), 1);
    assert_eq!(by_code["22298006"], vec!["C0027051"]);

    let halfmaps = mapper
        .halfmaps_by_concept_ids(&["C0027051"], Some("SNOMEDCT_US"))
        .unwrap();
    assert_eq!(halfmaps.len(), 2);
}
