#![allow(dead_code)]

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use file_table_engine::common::{KeyRange, Result, RowKey, TableError};
use file_table_engine::driver::{FileDriver, MemoryDriver, RowCursor};
use file_table_engine::field_type::{Column, ColumnType, Value};
use file_table_engine::geometry::Envelope;
use file_table_engine::index::{Index, IndexKind, IndexMeta};
use file_table_engine::progress::ProgressListener;
use file_table_engine::row::Row;

pub fn columns() -> Vec<Column> {
    vec![
        Column::new("ID", ColumnType::Int64),
        Column::new("THE_GEOM", ColumnType::Geometry),
    ]
}

/// `values[i]` 同时作为 ID 与点的 x 坐标
pub fn memory_driver(values: &[i64]) -> MemoryDriver {
    MemoryDriver::new(
        columns(),
        values.iter()
            .map(|v| vec![Value::Int64(*v), Value::Geometry(Envelope::point(*v as f64, 0.0))])
            .collect(),
    )
}

// ── 驱动替身 ──────────────────────────────────────────────────────────────────

/// 报告的行数与游标实际产出的行数不一致
pub struct LyingDriver {
    pub inner:       MemoryDriver,
    pub claimed_rows: u64,
}

impl FileDriver for LyingDriver {
    fn columns(&self) -> &[Column] { self.inner.columns() }
    fn row_count(&self) -> u64 { self.claimed_rows }
    fn get_row(&self, key: RowKey) -> Result<Row> { self.inner.get_row(key) }
    fn open_cursor(&self, range: KeyRange) -> Result<RowCursor<'_>> { self.inner.open_cursor(range) }
    fn close(&self) -> Result<()> { self.inner.close() }
}

/// 关闭时总是失败
pub struct FailingCloseDriver {
    pub inner:  MemoryDriver,
    pub closes: AtomicUsize,
}

impl FileDriver for FailingCloseDriver {
    fn columns(&self) -> &[Column] { self.inner.columns() }
    fn row_count(&self) -> u64 { self.inner.row_count() }
    fn get_row(&self, key: RowKey) -> Result<Row> { self.inner.get_row(key) }
    fn open_cursor(&self, range: KeyRange) -> Result<RowCursor<'_>> { self.inner.open_cursor(range) }
    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, AtomicOrdering::SeqCst);
        Err(TableError::Io(std::io::Error::other("disk went away")))
    }
}

// ── 索引替身 ──────────────────────────────────────────────────────────────────

/// 记录调用情况的空间类索引，按 ID 列升序比较
#[derive(Clone, Default)]
pub struct Calls {
    pub added:   Arc<Mutex<Vec<i64>>>,
    pub removes: Arc<AtomicUsize>,
    pub closes:  Arc<AtomicUsize>,
}

impl Calls {
    pub fn added(&self)   -> Vec<i64> { self.added.lock().unwrap().clone() }
    pub fn removes(&self) -> usize    { self.removes.load(AtomicOrdering::SeqCst) }
    pub fn closes(&self)  -> usize    { self.closes.load(AtomicOrdering::SeqCst) }
}

pub struct RecordingIndex {
    pub meta:          IndexMeta,
    pub calls:         Calls,
    pub needs_rebuild: bool,
    /// 第 n 次插入（从 1 开始）失败
    pub fail_on_add:   Option<usize>,
    pub fail_remove:   bool,
    /// 与该 ID 的行比较时失败
    pub fail_compare:  Option<i64>,
    rows:              u64,
}

impl RecordingIndex {
    pub fn new(name: &str, calls: Calls) -> Self {
        Self {
            meta: IndexMeta::new(100, name, vec![columns()[0].clone()]),
            calls,
            needs_rebuild: true,
            fail_on_add: None,
            fail_remove: false,
            fail_compare: None,
            rows: 0,
        }
    }
}

impl Index for RecordingIndex {
    fn meta(&self) -> &IndexMeta { &self.meta }
    fn meta_mut(&mut self) -> &mut IndexMeta { &mut self.meta }
    fn kind(&self) -> IndexKind { IndexKind::Spatial }
    fn needs_rebuild(&self) -> bool { self.needs_rebuild }
    fn row_count(&self) -> u64 { self.rows }

    fn add(&mut self, row: &Row) -> Result<()> {
        let mut added = self.calls.added.lock().unwrap();
        if self.fail_on_add == Some(added.len() + 1) {
            return Err(TableError::IndexWrite {
                index:  self.meta.name.clone(),
                key:    row.key,
                reason: "simulated insertion failure".into(),
            });
        }
        added.push(row.values[0].as_i64().unwrap());
        self.rows += 1;
        Ok(())
    }

    fn remove_row(&mut self, _row: &Row) -> Result<()> {
        self.rows -= 1;
        Ok(())
    }

    fn remove(&mut self) -> Result<()> {
        self.calls.removes.fetch_add(1, AtomicOrdering::SeqCst);
        if self.fail_remove {
            return Err(TableError::Io(std::io::Error::other("index storage corrupted")));
        }
        self.rows = 0;
        Ok(())
    }

    fn truncate(&mut self) -> Result<()> {
        self.rows = 0;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.calls.closes.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(())
    }

    fn compare_rows(&self, a: &Row, b: &Row) -> Result<Ordering> {
        let (x, y) = (a.values[0].as_i64(), b.values[0].as_i64());
        if let Some(bad) = self.fail_compare {
            if x == Some(bad) || y == Some(bad) {
                return Err(TableError::Compare {
                    index:  self.meta.name.clone(),
                    reason: format!("cannot order {bad}"),
                });
            }
        }
        Ok(x.cmp(&y))
    }

    fn find(&self, _range: KeyRange) -> Result<RowCursor<'_>> {
        Ok(Box::new(std::iter::empty()))
    }

    fn get_row(&self, key: RowKey) -> Result<Row> {
        Err(TableError::RowNotFound(key))
    }
}

// ── 进度替身 ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct CollectingProgress {
    pub events: Mutex<Vec<(String, u64, u64)>>,
}

impl ProgressListener for CollectingProgress {
    fn report(&self, task: &str, current: u64, total: u64) {
        self.events.lock().unwrap().push((task.to_string(), current, total));
    }
}
