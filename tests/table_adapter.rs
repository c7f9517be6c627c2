mod support;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::thread;

use file_table_engine::catalog::NameRegistry;
use file_table_engine::common::{KeyRange, TableConfig, TableError, TableType};
use file_table_engine::driver::{FileDriver, MemoryDriver};
use file_table_engine::field_type::Value;
use file_table_engine::geometry::Envelope;
use file_table_engine::index::{IndexKind, IndexType};
use file_table_engine::row::Row;
use file_table_engine::table::{FileTable, IndexDefinition};

use support::*;

fn open(driver: Arc<dyn FileDriver>, config: TableConfig) -> (NameRegistry, FileTable) {
    let mut names = NameRegistry::default();
    names.reserve("T").unwrap();
    let table = FileTable::open(1, "T", driver, &mut names, config).unwrap();
    (names, table)
}

fn spatial(names: &mut NameRegistry, name: &str) -> IndexDefinition {
    names.reserve(name).unwrap();
    IndexDefinition::new(names.next_object_id(), name, &["THE_GEOM"], IndexType::Spatial)
}

fn index_names(t: &FileTable) -> Vec<String> {
    t.indexes().iter().map(|i| i.name().to_string()).collect()
}

#[test]
fn scan_index_always_present() {
    let (mut names, mut t) = open(Arc::new(memory_driver(&[1, 2])), TableConfig::default());
    assert_eq!(t.scan_index().unwrap().kind(), IndexKind::Scan);
    assert_eq!(t.indexes()[0].kind(), IndexKind::Scan);

    let scan_name = t.scan_index().unwrap().name().to_string();
    assert!(t.drop_index(&mut names, &scan_name).unwrap_err().is_unsupported());
    let unique_name = t.unique_index().unwrap().name().to_string();
    assert!(t.drop_index(&mut names, &unique_name).unwrap_err().is_unsupported());
    assert!(t.scan_index().is_ok());
    assert_eq!(t.indexes().len(), 2);
}

#[test]
fn empty_table_skips_bulk_build() {
    let progress = CollectingProgress::default();
    let (mut names, mut t) = open(Arc::new(memory_driver(&[])), TableConfig::default());
    let def = spatial(&mut names, "G");
    let idx = t.add_index(&mut names, Some(&progress), def).unwrap();
    assert_eq!(idx.row_count(), 0);
    assert!(progress.events.lock().unwrap().is_empty());

    // 不需要重建的空表同样不会调用 add
    let calls = Calls::default();
    names.reserve("R").unwrap();
    t.attach_index(&mut names, None, Box::new(RecordingIndex::new("R", calls.clone())), None).unwrap();
    assert!(calls.added().is_empty());
}

#[test]
fn built_index_matches_scan_row_count() {
    let progress = CollectingProgress::default();
    let (mut names, mut t) = open(
        Arc::new(memory_driver(&[5, 3, 9, 1, 7])),
        TableConfig::default().with_max_memory_rows(2),
    );
    let def = spatial(&mut names, "G");
    let built = t.add_index(&mut names, Some(&progress), def).unwrap().row_count();
    assert_eq!(built, 5);
    assert_eq!(built, t.scan_index().unwrap().row_count());

    let events = progress.events.lock().unwrap();
    assert_eq!(events.len(), 5);
    assert_eq!(events[0], ("T:G".to_string(), 0, 5));
    assert_eq!(events[4].1, 4);
}

#[test]
fn short_scan_is_an_internal_error() {
    let driver = LyingDriver { inner: memory_driver(&[1, 2, 3]), claimed_rows: 4 };
    let (mut names, mut t) = open(Arc::new(driver), TableConfig::default());
    let before = index_names(&t);

    let def = spatial(&mut names, "G");
    let err = t.add_index(&mut names, None, def).unwrap_err();
    assert!(err.is_internal(), "{err}");
    assert!(err.to_string().contains("rowcount remaining=1"));
    assert_eq!(index_names(&t), before);
    assert!(!names.contains("G"));
}

#[test]
fn long_scan_is_an_internal_error() {
    let driver = LyingDriver { inner: memory_driver(&[1, 2, 3]), claimed_rows: 2 };
    let (mut names, mut t) = open(Arc::new(driver), TableConfig::default());

    let def = spatial(&mut names, "G");
    let err = t.add_index(&mut names, None, def).unwrap_err();
    assert!(err.is_internal());
    assert!(t.index("G").is_none());
}

#[test]
fn writes_are_always_unsupported() {
    let (_, mut t) = open(Arc::new(memory_driver(&[1])), TableConfig::default());
    let row = t.get_row(1).unwrap();
    for _ in 0..2 {
        assert!(matches!(
            t.add_row(&row),
            Err(TableError::Unsupported { operation: "addRow", .. })
        ));
        assert!(matches!(
            t.remove_row(&row),
            Err(TableError::Unsupported { operation: "removeRow", .. })
        ));
    }
    let (_, mut empty) = open(Arc::new(memory_driver(&[])), TableConfig::default());
    assert!(empty.add_row(&Row::new(1, vec![])).unwrap_err().is_unsupported());
    assert!(t.check_support_alter().unwrap_err().is_unsupported());
    assert!(t.check_rename().unwrap_err().is_unsupported());
}

#[test]
fn non_spatial_index_types_are_rejected() {
    let (mut names, mut t) = open(Arc::new(memory_driver(&[1, 2])), TableConfig::default());
    let before = index_names(&t);
    for (name, ty) in [("B", IndexType::Btree), ("H", IndexType::Hash), ("U", IndexType::Unique)] {
        names.reserve(name).unwrap();
        let def = IndexDefinition::new(names.next_object_id(), name, &["ID"], ty);
        let err = t.add_index(&mut names, None, def).unwrap_err();
        assert!(matches!(err, TableError::Unsupported { operation: "addIndex", .. }));
        assert!(!names.contains(name));
    }
    assert_eq!(index_names(&t), before);
    assert_eq!(t.last_modification_id(), 0);
}

#[test]
fn batches_are_sorted_independently() {
    let (mut names, mut t) = open(
        Arc::new(memory_driver(&[30, 10, 20])),
        TableConfig::default().with_max_memory_rows(2),
    );
    let calls = Calls::default();
    names.reserve("R").unwrap();
    t.attach_index(&mut names, None, Box::new(RecordingIndex::new("R", calls.clone())), None)
        .unwrap();
    // 第一批 [30, 10] 排序后插入，第二批只有 20
    assert_eq!(calls.added(), vec![10, 30, 20]);
    assert_eq!(calls.removes(), 0);
}

#[test]
fn failed_insert_rolls_back_index() {
    let (mut names, mut t) = open(Arc::new(memory_driver(&[1, 2, 3])), TableConfig::default());
    let before = index_names(&t);
    let calls = Calls::default();
    let mut index = RecordingIndex::new("R", calls.clone());
    index.fail_on_add = Some(2);
    names.reserve("R").unwrap();

    let err = t.attach_index(&mut names, None, Box::new(index), None).unwrap_err();
    match err {
        TableError::IndexWrite { index, key, reason } => {
            assert_eq!(index, "R");
            assert_eq!(key, 2);
            assert_eq!(reason, "simulated insertion failure");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(calls.removes(), 1);
    assert_eq!(index_names(&t), before);
    assert!(!names.contains("R"));
}

#[test]
fn failed_cleanup_reports_both_errors() {
    let (mut names, mut t) = open(Arc::new(memory_driver(&[1, 2, 3])), TableConfig::default());
    let calls = Calls::default();
    let mut index = RecordingIndex::new("R", calls.clone());
    index.fail_on_add = Some(1);
    index.fail_remove = true;
    names.reserve("R").unwrap();

    let err = t.attach_index(&mut names, None, Box::new(index), None).unwrap_err();
    match &err {
        TableError::RollbackFailed { index, cause, cleanup } => {
            assert_eq!(index, "R");
            assert!(matches!(**cause, TableError::IndexWrite { .. }));
            assert!(matches!(**cleanup, TableError::Io(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(std::error::Error::source(&err).is_some());
    assert!(t.index("R").is_none());
}

#[test]
fn non_geometry_value_aborts_spatial_build() {
    let rows = (0..500i64)
        .map(|i| {
            let geom = if i % 7 == 3 { Value::Int64(i) } else { Value::Geometry(Envelope::point(i as f64, 0.0)) };
            vec![Value::Int64(i), geom]
        })
        .collect();
    let (mut names, mut t) = open(Arc::new(MemoryDriver::new(columns(), rows)), TableConfig::default());
    let before = index_names(&t);
    let modified = t.last_modification_id();

    let def = spatial(&mut names, "G");
    let err = t.add_index(&mut names, None, def).unwrap_err();
    match &err {
        TableError::Compare { index, reason } => {
            assert_eq!(index, "G");
            assert_eq!(reason, "value 3 is not a geometry");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(index_names(&t), before);
    assert!(!names.contains("G"));
    assert_eq!(t.last_modification_id(), modified);
}

#[test]
fn compare_failure_rolls_back_partial_build() {
    let (mut names, mut t) = open(
        Arc::new(memory_driver(&[4, 1, 3, 2])),
        TableConfig::default().with_max_memory_rows(2),
    );
    let calls = Calls::default();
    let mut index = RecordingIndex::new("R", calls.clone());
    index.fail_compare = Some(3);
    names.reserve("R").unwrap();

    let err = t.attach_index(&mut names, None, Box::new(index), None).unwrap_err();
    assert!(matches!(err, TableError::Compare { .. }), "{err}");
    // 第一批 [4, 1] 已插入，第二批 [3, 2] 在排序前被拒绝
    assert_eq!(calls.added(), vec![1, 4]);
    assert_eq!(calls.removes(), 1);
    assert!(t.index("R").is_none());
    assert!(!names.contains("R"));
}

#[test]
fn failed_drop_keeps_index_attached() {
    let (mut names, mut t) = open(Arc::new(memory_driver(&[1, 2])), TableConfig::default());
    let calls = Calls::default();
    let mut index = RecordingIndex::new("R", calls.clone());
    index.needs_rebuild = false;
    index.fail_remove = true;
    names.reserve("R").unwrap();
    t.attach_index(&mut names, None, Box::new(index), None).unwrap();
    let modified = t.last_modification_id();

    assert!(matches!(t.drop_index(&mut names, "R"), Err(TableError::Io(_))));
    assert_eq!(calls.removes(), 1);
    assert!(t.index("R").is_some());
    assert!(names.contains("R"));
    assert_eq!(t.last_modification_id(), modified);
}

#[test]
fn close_swallows_driver_failure() {
    let driver = Arc::new(FailingCloseDriver { inner: memory_driver(&[1, 2]), closes: AtomicUsize::new(0) });
    let (mut names, mut t) = open(driver.clone(), TableConfig::default());
    let calls = Calls::default();
    let mut index = RecordingIndex::new("R", calls.clone());
    index.needs_rebuild = false;
    names.reserve("R").unwrap();
    t.attach_index(&mut names, None, Box::new(index), None).unwrap();

    t.close();
    t.close();
    assert!(t.is_closed());
    assert_eq!(calls.closes(), 1);
    assert_eq!(driver.closes.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn readers_are_never_blocked_by_lock_hooks() {
    let (_, t) = open(Arc::new(memory_driver(&(0..200).collect::<Vec<i64>>())), TableConfig::default());
    let t = Arc::new(t);
    t.lock(true);

    let handles: Vec<_> = (0..8).map(|_| {
        let t = Arc::clone(&t);
        thread::spawn(move || {
            t.lock(false);
            let scanned = t.scan_index().unwrap().find(KeyRange::all()).unwrap().count();
            t.unlock();
            (t.row_count(), scanned)
        })
    }).collect();

    for h in handles {
        assert_eq!(h.join().unwrap(), (200, 200));
    }
    t.unlock();
    assert!(!t.is_locked_exclusively());
}

#[test]
fn structural_answers_are_constant() {
    let (_, t) = open(Arc::new(memory_driver(&[1, 2, 3])), TableConfig::default());
    assert_eq!(t.table_type(), TableType::External);
    assert_eq!(t.table_type().as_str(), "EXTERNAL");
    assert!(t.is_deterministic());
    assert!(t.can_get_row_count());
    assert!(t.can_drop());
    assert!(!t.is_locked_exclusively());
    assert_eq!(t.max_data_modification_id(), 0);
    assert_eq!(t.disk_space_used(), 0);
    assert_eq!(t.row_count_approximation(), 3);
    assert_eq!(t.rowid_column().name, "_ROWID_");
}

#[test]
fn new_index_inherits_temporary_flag_and_comment() {
    let (mut names, mut t) = open(Arc::new(memory_driver(&[1])), TableConfig::default().temporary());
    let def = spatial(&mut names, "G").with_comment("geometry lookup");
    let idx = t.add_index(&mut names, None, def).unwrap();
    assert!(idx.is_temporary());
    assert_eq!(idx.comment(), Some("geometry lookup"));
}
