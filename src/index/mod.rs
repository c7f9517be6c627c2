//! 索引能力（Index Capability）
//!
//! 表只通过 [`Index`] trait 驱动索引，从不关心索引内部结构。三种索引：
//! - **Scan**    — 驱动的直接视图，按文件顺序访问所有行，表创建时生成且不可删除
//! - **Unique**  — 首列上的行键索引，同样直接读驱动
//! - **Spatial** — 几何列上的二级索引，创建后需要从已有行批量构建

pub mod spatial;

use std::cmp::Ordering;
use std::sync::Arc;

use crate::common::{IndexId, KeyRange, Result, RowKey, TableError};
use crate::driver::{FileDriver, RowCursor};
use crate::field_type::Column;
use crate::geometry::Envelope;
use crate::row::Row;

pub use spatial::SpatialIndex;

// ── 索引类别 ──────────────────────────────────────────────────────────────────

/// 已创建索引的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Scan,
    Unique,
    Spatial,
}

impl IndexKind {
    pub fn is_scan(self)    -> bool { self == Self::Scan }
    pub fn is_unique(self)  -> bool { self == Self::Unique }
    pub fn is_spatial(self) -> bool { self == Self::Spatial }
}

/// 引擎在 CREATE INDEX 时请求的索引类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    Btree,
    Hash,
    Unique,
    Spatial,
}

impl IndexType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Btree   => "BTREE",
            Self::Hash    => "HASH",
            Self::Unique  => "UNIQUE",
            Self::Spatial => "SPATIAL",
        }
    }
}

// ── 公共元数据 ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct IndexMeta {
    pub id:        IndexId,
    pub name:      String,
    pub columns:   Vec<Column>,
    pub temporary: bool,
    pub comment:   Option<String>,
}

impl IndexMeta {
    pub fn new(id: IndexId, name: &str, columns: Vec<Column>) -> Self {
        Self { id, name: name.into(), columns, temporary: false, comment: None }
    }
}

// ── Index trait ───────────────────────────────────────────────────────────────

pub trait Index: Send + Sync {
    fn meta(&self) -> &IndexMeta;
    fn meta_mut(&mut self) -> &mut IndexMeta;

    fn kind(&self) -> IndexKind;

    /// 索引是空的，需要从已有行构建后才能使用
    fn needs_rebuild(&self) -> bool;

    fn row_count(&self) -> u64;

    fn add(&mut self, row: &Row) -> Result<()>;

    fn remove_row(&mut self, row: &Row) -> Result<()>;

    /// 删除索引自身的存储
    fn remove(&mut self) -> Result<()>;

    fn truncate(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    /// 批量构建时的排序规则
    fn compare_rows(&self, a: &Row, b: &Row) -> Result<Ordering>;

    /// 行能否参与 `compare_rows`；通过检查的行之间比较不会失败
    fn check_comparable(&self, row: &Row) -> Result<()> {
        self.compare_rows(row, row).map(|_| ())
    }

    fn find(&self, range: KeyRange) -> Result<RowCursor<'_>>;

    fn get_row(&self, key: RowKey) -> Result<Row>;

    /// 外包矩形与 `query` 相交的行键；只有空间索引支持
    fn find_intersecting(&self, _query: &Envelope) -> Result<Vec<RowKey>> {
        Err(TableError::unsupported("findIntersecting", self.name()))
    }

    fn id(&self)          -> IndexId          { self.meta().id }
    fn name(&self)        -> &str             { &self.meta().name }
    fn columns(&self)     -> &[Column]        { &self.meta().columns }
    fn is_temporary(&self) -> bool            { self.meta().temporary }
    fn comment(&self)     -> Option<&str>     { self.meta().comment.as_deref() }

    fn set_temporary(&mut self, temporary: bool) {
        self.meta_mut().temporary = temporary;
    }

    fn set_comment(&mut self, comment: Option<String>) {
        self.meta_mut().comment = comment;
    }
}

impl std::fmt::Debug for dyn Index + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("kind", &self.kind())
            .field("meta", self.meta())
            .finish()
    }
}

// ── DriverIndex ───────────────────────────────────────────────────────────────

/// 直接读取驱动的索引（Scan 或首列 Unique），永远不需要重建
pub struct DriverIndex {
    meta:   IndexMeta,
    kind:   IndexKind,
    driver: Arc<dyn FileDriver>,
}

impl DriverIndex {
    /// 表的扫描索引，名字为 `<TABLE>_DATA`
    pub fn scan(id: IndexId, table_name: &str, driver: Arc<dyn FileDriver>) -> Self {
        let meta = IndexMeta::new(id, &format!("{table_name}_DATA"), Vec::new());
        Self { meta, kind: IndexKind::Scan, driver }
    }

    /// 首列上的唯一行键索引
    pub fn unique(id: IndexId, name: &str, column: Column, driver: Arc<dyn FileDriver>) -> Self {
        let meta = IndexMeta::new(id, name, vec![column]);
        Self { meta, kind: IndexKind::Unique, driver }
    }
}

impl Index for DriverIndex {
    fn meta(&self)         -> &IndexMeta     { &self.meta }
    fn meta_mut(&mut self) -> &mut IndexMeta { &mut self.meta }
    fn kind(&self)         -> IndexKind      { self.kind }

    fn needs_rebuild(&self) -> bool { false }

    fn row_count(&self) -> u64 { self.driver.row_count() }

    fn add(&mut self, _row: &Row) -> Result<()> {
        Err(TableError::unsupported("add", self.meta.name.clone()))
    }

    fn remove_row(&mut self, _row: &Row) -> Result<()> {
        Err(TableError::unsupported("removeRow", self.meta.name.clone()))
    }

    // 驱动由表持有并关闭，这几个操作对驱动索引没有可释放的东西
    fn remove(&mut self)   -> Result<()> { Ok(()) }
    fn truncate(&mut self) -> Result<()> { Ok(()) }
    fn close(&mut self)    -> Result<()> { Ok(()) }

    fn compare_rows(&self, a: &Row, b: &Row) -> Result<Ordering> {
        Ok(a.key.cmp(&b.key))
    }

    fn find(&self, range: KeyRange) -> Result<RowCursor<'_>> {
        self.driver.open_cursor(range)
    }

    fn get_row(&self, key: RowKey) -> Result<Row> {
        self.driver.get_row(key)
    }
}
