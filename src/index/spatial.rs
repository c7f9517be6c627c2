//! 几何列上的空间二级索引
//!
//! 结构是一层打包叶子：每个叶子最多 [`LEAF_CAPACITY`] 个 (Envelope, RowKey)，
//! 并维护自身的外包矩形。新条目总是追加到最后一个叶子，叶子满了再开新叶子，
//! 所以按空间顺序批量插入时叶子外包矩形更紧，查询时能跳过更多叶子。

use std::cmp::Ordering;
use std::sync::Arc;

use crate::common::{IndexId, KeyRange, Result, RowKey, TableError};
use crate::driver::{FileDriver, RowCursor};
use crate::field_type::{Column, ColumnType, Value};
use crate::geometry::Envelope;
use crate::index::{Index, IndexKind, IndexMeta};
use crate::row::Row;

pub const LEAF_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
struct Leaf {
    bounds:  Envelope,
    entries: Vec<(Envelope, RowKey)>,
}

impl Leaf {
    fn new(env: Envelope, key: RowKey) -> Self {
        let mut entries = Vec::with_capacity(LEAF_CAPACITY);
        entries.push((env, key));
        Self { bounds: env, entries }
    }

    fn recompute_bounds(&mut self) {
        if let Some((first, _)) = self.entries.first() {
            let mut b = *first;
            for (e, _) in &self.entries[1..] {
                b.expand_to_include(e);
            }
            self.bounds = b;
        }
    }
}

pub struct SpatialIndex {
    meta:      IndexMeta,
    /// 被索引的几何列在行中的位置
    column:    usize,
    driver:    Arc<dyn FileDriver>,
    leaves:    Vec<Leaf>,
    /// 几何为 NULL 的行只记录行键
    nulls:     Vec<RowKey>,
    row_count: u64,
    removed:   bool,
    closed:    bool,
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("meta", &self.meta)
            .field("column", &self.column)
            .field("leaves", &self.leaves)
            .field("nulls", &self.nulls)
            .field("row_count", &self.row_count)
            .field("removed", &self.removed)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl SpatialIndex {
    pub fn new(
        id:     IndexId,
        name:   &str,
        column: Column,
        driver: Arc<dyn FileDriver>,
    ) -> Result<Self> {
        if column.column_type != ColumnType::Geometry || column.is_rowid() {
            return Err(TableError::unsupported("spatial index on non-geometry column", column.name));
        }
        let position = column.position as usize;
        Ok(Self {
            meta: IndexMeta::new(id, name, vec![column]),
            column: position,
            driver,
            leaves: Vec::new(),
            nulls: Vec::new(),
            row_count: 0,
            removed: false,
            closed: false,
        })
    }

    pub fn leaf_count(&self) -> usize { self.leaves.len() }

    /// 所有叶子外包矩形面积之和，越小说明叶子越紧凑
    pub fn total_leaf_area(&self) -> f64 {
        self.leaves.iter().map(|l| l.bounds.area()).sum()
    }

    pub fn is_removed(&self) -> bool { self.removed }

    /// 与 `query` 相交的行键，按叶子顺序返回
    pub fn intersecting(&self, query: &Envelope) -> Vec<RowKey> {
        self.leaves.iter()
            .filter(|l| l.bounds.intersects(query))
            .flat_map(|l| l.entries.iter())
            .filter(|(e, _)| e.intersects(query))
            .map(|(_, k)| *k)
            .collect()
    }

    fn geometry<'r>(&self, row: &'r Row) -> std::result::Result<Option<&'r Envelope>, String> {
        match row.value(self.column) {
            Some(Value::Geometry(e)) => Ok(Some(e)),
            Some(Value::Null)        => Ok(None),
            Some(other)              => Err(format!("value {other} is not a geometry")),
            None                     => Err(format!("row has no column {}", self.column)),
        }
    }

    fn check_writable(&self, key: RowKey) -> Result<()> {
        if self.removed || self.closed {
            return Err(TableError::IndexWrite {
                index:  self.meta.name.clone(),
                key,
                reason: "index is no longer open".into(),
            });
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.leaves.clear();
        self.nulls.clear();
        self.row_count = 0;
    }
}

impl Index for SpatialIndex {
    fn meta(&self)         -> &IndexMeta     { &self.meta }
    fn meta_mut(&mut self) -> &mut IndexMeta { &mut self.meta }
    fn kind(&self)         -> IndexKind      { IndexKind::Spatial }

    fn needs_rebuild(&self) -> bool { self.row_count == 0 }

    fn row_count(&self) -> u64 { self.row_count }

    fn add(&mut self, row: &Row) -> Result<()> {
        self.check_writable(row.key)?;
        let env = self.geometry(row).map_err(|reason| TableError::IndexWrite {
            index: self.meta.name.clone(), key: row.key, reason,
        })?;
        match env {
            None => self.nulls.push(row.key),
            Some(env) => match self.leaves.last_mut() {
                Some(leaf) if leaf.entries.len() < LEAF_CAPACITY => {
                    leaf.bounds.expand_to_include(env);
                    leaf.entries.push((*env, row.key));
                }
                _ => self.leaves.push(Leaf::new(*env, row.key)),
            },
        }
        self.row_count += 1;
        Ok(())
    }

    fn remove_row(&mut self, row: &Row) -> Result<()> {
        self.check_writable(row.key)?;
        let env = self.geometry(row).map_err(|reason| TableError::IndexWrite {
            index: self.meta.name.clone(), key: row.key, reason,
        })?;
        let Some(env) = env else {
            let pos = self.nulls.iter().position(|k| *k == row.key)
                .ok_or(TableError::RowNotFound(row.key))?;
            self.nulls.remove(pos);
            self.row_count -= 1;
            return Ok(());
        };

        let hit = self.leaves.iter().enumerate()
            .filter(|(_, l)| l.bounds.intersects(env))
            .find_map(|(li, l)| {
                l.entries.iter().position(|(_, k)| *k == row.key).map(|ei| (li, ei))
            });
        let (li, ei) = hit.ok_or(TableError::RowNotFound(row.key))?;
        let leaf = &mut self.leaves[li];
        leaf.entries.remove(ei);
        if leaf.entries.is_empty() {
            self.leaves.remove(li);
        } else {
            leaf.recompute_bounds();
        }
        self.row_count -= 1;
        Ok(())
    }

    fn remove(&mut self) -> Result<()> {
        self.clear();
        self.removed = true;
        Ok(())
    }

    fn truncate(&mut self) -> Result<()> {
        self.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn compare_rows(&self, a: &Row, b: &Row) -> Result<Ordering> {
        let compare_err = |reason| TableError::Compare { index: self.meta.name.clone(), reason };
        let ea = self.geometry(a).map_err(compare_err)?;
        let eb = self.geometry(b).map_err(compare_err)?;
        Ok(match (ea, eb) {
            (None, None)       => Ordering::Equal,
            (None, Some(_))    => Ordering::Less,
            (Some(_), None)    => Ordering::Greater,
            (Some(x), Some(y)) => x.cmp_lower_left(y),
        })
    }

    fn check_comparable(&self, row: &Row) -> Result<()> {
        self.geometry(row)
            .map(|_| ())
            .map_err(|reason| TableError::Compare { index: self.meta.name.clone(), reason })
    }

    fn find(&self, range: KeyRange) -> Result<RowCursor<'_>> {
        let keys: Vec<RowKey> = self.nulls.iter().copied()
            .chain(self.leaves.iter().flat_map(|l| l.entries.iter().map(|(_, k)| *k)))
            .filter(|k| range.contains(*k))
            .collect();
        let driver = Arc::clone(&self.driver);
        Ok(Box::new(keys.into_iter().map(move |k| driver.get_row(k))))
    }

    fn get_row(&self, key: RowKey) -> Result<Row> {
        self.driver.get_row(key)
    }

    fn find_intersecting(&self, query: &Envelope) -> Result<Vec<RowKey>> {
        Ok(self.intersecting(query))
    }
}
