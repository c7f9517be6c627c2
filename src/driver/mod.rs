//! 文件驱动（Row Source）
//!
//! 驱动把外部文件暴露为只读的行序列：报告行数、按行键读取单行、
//! 按文件顺序打开游标。驱动由表与其驱动索引共享（`Arc`），只有表负责关闭它。

pub mod row_file;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::common::{KeyRange, Result, RowKey, TableError};
use crate::field_type::{Column, Value};
use crate::row::Row;

pub use row_file::{RowFileDriver, RowFileWriter};

/// 按文件顺序产出行的游标
pub type RowCursor<'a> = Box<dyn Iterator<Item = Result<Row>> + Send + 'a>;

pub trait FileDriver: Send + Sync {
    /// 物理列定义
    fn columns(&self) -> &[Column];

    fn row_count(&self) -> u64;

    /// 按行键（从 1 开始）读取一行
    fn get_row(&self, key: RowKey) -> Result<Row>;

    /// 打开 [first, last] 范围内的游标，行按文件顺序产出
    fn open_cursor(&self, range: KeyRange) -> Result<RowCursor<'_>>;

    fn close(&self) -> Result<()>;
}

/// 把 KeyRange 裁剪到 [1, row_count]，空区间返回 None
pub(crate) fn clamp_range(range: KeyRange, row_count: u64) -> Option<(RowKey, RowKey)> {
    let first = range.first.unwrap_or(1).max(1);
    let last  = range.last.unwrap_or(row_count).min(row_count);
    (first <= last).then_some((first, last))
}

// ── MemoryDriver ──────────────────────────────────────────────────────────────

/// 内存中的只读行集合
pub struct MemoryDriver {
    columns: Vec<Column>,
    rows:    Vec<Vec<Value>>,
    closed:  AtomicBool,
}

impl MemoryDriver {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        let columns = columns.into_iter()
            .enumerate()
            .map(|(i, c)| c.at(i as i32))
            .collect();
        Self { columns, rows, closed: AtomicBool::new(false) }
    }

    pub fn is_closed(&self) -> bool { self.closed.load(Ordering::Acquire) }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() { Err(TableError::SourceClosed) } else { Ok(()) }
    }
}

impl FileDriver for MemoryDriver {
    fn columns(&self) -> &[Column] { &self.columns }

    fn row_count(&self) -> u64 { self.rows.len() as u64 }

    fn get_row(&self, key: RowKey) -> Result<Row> {
        self.check_open()?;
        key.checked_sub(1)
            .and_then(|i| self.rows.get(i as usize))
            .map(|values| Row::new(key, values.clone()))
            .ok_or(TableError::RowNotFound(key))
    }

    fn open_cursor(&self, range: KeyRange) -> Result<RowCursor<'_>> {
        self.check_open()?;
        let Some((first, last)) = clamp_range(range, self.row_count()) else {
            return Ok(Box::new(std::iter::empty()));
        };
        let rows = &self.rows[(first - 1) as usize..last as usize];
        Ok(Box::new(rows.iter().zip(first..).map(|(values, key)| {
            Ok(Row::new(key, values.clone()))
        })))
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
