//! 外部文件表（Table Adapter）
//!
//! `FileTable` 把只读的 [`FileDriver`] 包装成查询引擎眼中的一张表：
//! 回答行数、扫描/唯一索引、表类型等结构性问题，并且是增删索引的唯一入口。
//!
//! 并发约定：读操作（行数、取行、游标、`lock`/`unlock`）只需要 `&self`，
//! 可以多线程同时进行，因为底层数据在注册后不会再变；
//! 结构性修改（`add_index`、`drop_index`、`truncate`、`close`）需要 `&mut self`，
//! 由调用方串行化。

use std::sync::{Arc, OnceLock};

use crate::build::build_index;
use crate::catalog::NameRegistry;
use crate::common::{IndexId, Result, RowKey, TableConfig, TableError, TableId, TableType};
use crate::driver::FileDriver;
use crate::field_type::Column;
use crate::index::{DriverIndex, Index, IndexKind, IndexType, SpatialIndex};
use crate::progress::ProgressListener;
use crate::row::Row;

/// CREATE INDEX 请求
#[derive(Debug, Clone)]
pub struct IndexDefinition {
    pub id:         IndexId,
    /// 已在 NameRegistry 中预留的名字
    pub name:       String,
    pub columns:    Vec<String>,
    pub index_type: IndexType,
    pub comment:    Option<String>,
}

impl IndexDefinition {
    pub fn new(id: IndexId, name: &str, columns: &[&str], index_type: IndexType) -> Self {
        Self {
            id, name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            index_type, comment: None,
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.into()); self
    }
}

// ── FileTable ─────────────────────────────────────────────────────────────────

pub struct FileTable {
    id:              TableId,
    name:            String,
    driver:          Arc<dyn FileDriver>,
    /// 位置 0 是扫描索引，位置 1（如有）是首列唯一索引
    indexes:         Vec<Box<dyn Index>>,
    rowid_column:    OnceLock<Column>,
    config:          TableConfig,
    modification_id: u64,
    closed:          bool,
}

impl FileTable {
    /// 注册外部表，同时创建扫描索引与首列唯一索引
    pub fn open(
        id:     TableId,
        name:   &str,
        driver: Arc<dyn FileDriver>,
        names:  &mut NameRegistry,
        config: TableConfig,
    ) -> Result<Self> {
        let mut indexes: Vec<Box<dyn Index>> = Vec::with_capacity(2);
        indexes.push(Box::new(DriverIndex::scan(names.next_object_id(), name, Arc::clone(&driver))));

        if let Some(first) = driver.columns().first() {
            let index_name = names.unique_index_name(name, &first.name);
            names.reserve(&index_name)?;
            indexes.push(Box::new(DriverIndex::unique(
                names.next_object_id(), &index_name, first.clone(), Arc::clone(&driver),
            )));
        }

        tracing::debug!(table = name, rows = driver.row_count(), "registered file table");
        Ok(Self {
            id, name: name.into(), driver, indexes,
            rowid_column: OnceLock::new(),
            config,
            modification_id: 0,
            closed: false,
        })
    }

    pub fn id(&self)       -> TableId      { self.id }
    pub fn name(&self)     -> &str         { &self.name }
    pub fn config(&self)   -> &TableConfig { &self.config }
    pub fn columns(&self)  -> &[Column]    { self.driver.columns() }
    pub fn is_closed(&self) -> bool        { self.closed }

    // ── 行数与取行 ────────────────────────────────────────────────────────────

    pub fn row_count(&self) -> u64 { self.driver.row_count() }

    pub fn row_count_approximation(&self) -> u64 { self.driver.row_count() }

    pub fn get_row(&self, key: RowKey) -> Result<Row> {
        self.scan_index()?.get_row(key)
    }

    // ── 索引访问 ──────────────────────────────────────────────────────────────

    pub fn scan_index(&self) -> Result<&dyn Index> {
        self.indexes.iter()
            .find(|idx| idx.kind().is_scan())
            .map(|idx| idx.as_ref())
            .ok_or_else(|| TableError::Internal(format!("no scan index on table {}", self.name)))
    }

    pub fn unique_index(&self) -> Option<&dyn Index> {
        self.indexes.iter()
            .find(|idx| idx.kind().is_unique())
            .map(|idx| idx.as_ref())
    }

    pub fn indexes(&self) -> &[Box<dyn Index>] { &self.indexes }

    pub fn index(&self, name: &str) -> Option<&dyn Index> {
        self.indexes.iter().find(|idx| idx.name() == name).map(|idx| idx.as_ref())
    }

    // ── 增删索引 ──────────────────────────────────────────────────────────────

    /// 按定义创建索引；文件表只支持空间二级索引
    ///
    /// 失败时 `def.name` 会从 `names` 中释放，`indexes()` 保持不变。
    pub fn add_index(
        &mut self,
        names:    &mut NameRegistry,
        progress: Option<&dyn ProgressListener>,
        def:      IndexDefinition,
    ) -> Result<&dyn Index> {
        let index = match self.new_index(&def) {
            Ok(index) => index,
            Err(e) => {
                names.free(&def.name);
                return Err(e);
            }
        };
        self.attach_index(names, progress, index, def.comment)
    }

    fn new_index(&self, def: &IndexDefinition) -> Result<Box<dyn Index>> {
        match def.index_type {
            IndexType::Spatial => {
                let [column] = def.columns.as_slice() else {
                    return Err(TableError::unsupported(
                        "addIndex",
                        format!("spatial index on {} columns of {}", def.columns.len(), self.name),
                    ));
                };
                let column = self.columns().iter()
                    .find(|c| c.name.eq_ignore_ascii_case(column))
                    .cloned()
                    .ok_or_else(|| TableError::ColumnNotFound(format!("{}.{column}", self.name)))?;
                Ok(Box::new(SpatialIndex::new(def.id, &def.name, column, Arc::clone(&self.driver))?))
            }
            other => Err(TableError::unsupported(
                "addIndex",
                format!("{} index on external table {}", other.as_str(), self.name),
            )),
        }
    }

    /// 挂上一个已经构造好的二级索引；需要时先从已有行批量构建
    ///
    /// 构建成功后才追加到 `indexes()`，失败时索引会删除自身并释放名字。
    pub fn attach_index(
        &mut self,
        names:    &mut NameRegistry,
        progress: Option<&dyn ProgressListener>,
        mut index: Box<dyn Index>,
        comment:  Option<String>,
    ) -> Result<&dyn Index> {
        if !index.kind().is_spatial() {
            names.free(index.name());
            return Err(TableError::unsupported(
                "addIndex",
                format!("{:?} index on external table {}", index.kind(), self.name),
            ));
        }

        if index.needs_rebuild() && self.row_count() > 0 {
            let task = format!("{}:{}", self.name, index.name());
            let built = build_index(
                self.scan_index()?, index.as_mut(), &task, self.config.max_memory_rows, progress,
            );
            if let Err(e) = built {
                names.free(index.name());
                return Err(e);
            }
        }

        index.set_temporary(self.config.temporary);
        index.set_comment(comment);
        self.indexes.push(index);
        self.set_modified();
        Ok(self.indexes[self.indexes.len() - 1].as_ref())
    }

    /// 删除二级索引；扫描索引与唯一索引属于表本身，不能删除
    pub fn drop_index(&mut self, names: &mut NameRegistry, name: &str) -> Result<()> {
        let pos = self.indexes.iter()
            .position(|idx| idx.name() == name)
            .ok_or_else(|| TableError::IndexNotFound(name.into()))?;
        if !self.indexes[pos].kind().is_spatial() {
            return Err(TableError::unsupported("dropIndex", name));
        }
        self.indexes[pos].remove()?;
        self.indexes.remove(pos);
        names.free(name);
        self.set_modified();
        Ok(())
    }

    // ── 只读表：写操作一律拒绝 ─────────────────────────────────────────────────

    pub fn add_row(&mut self, _row: &Row) -> Result<()> {
        Err(TableError::unsupported("addRow", format!("file table {}", self.name)))
    }

    pub fn remove_row(&mut self, _row: &Row) -> Result<()> {
        Err(TableError::unsupported("removeRow", format!("file table {}", self.name)))
    }

    pub fn check_support_alter(&self) -> Result<()> {
        Err(TableError::unsupported("alter", format!("file table {}", self.name)))
    }

    pub fn check_rename(&self) -> Result<()> {
        Err(TableError::unsupported("rename", format!("file table {}", self.name)))
    }

    // ── 生命周期 ──────────────────────────────────────────────────────────────

    /// 清空所有索引缓存的结构，不会删除底层文件
    pub fn truncate(&mut self) -> Result<()> {
        for index in &mut self.indexes {
            index.truncate()?;
        }
        self.set_modified();
        Ok(())
    }

    /// 关闭所有索引后关闭驱动；驱动关闭失败只记日志
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for index in &mut self.indexes {
            if let Err(e) = index.close() {
                tracing::warn!(table = %self.name, index = index.name(), error = %e, "error while closing index");
            }
        }
        if let Err(e) = self.driver.close() {
            tracing::error!(table = %self.name, error = %e, "error while closing the file driver");
        }
    }

    /// 文件表没有锁协议，仅为满足引擎接口
    pub fn lock(&self, _exclusive: bool) {}

    pub fn unlock(&self) {}

    pub fn rowid_column(&self) -> &Column {
        self.rowid_column.get_or_init(Column::rowid)
    }

    fn set_modified(&mut self) {
        self.modification_id += 1;
    }

    /// 结构性修改（增删索引、truncate）的次数
    pub fn last_modification_id(&self) -> u64 { self.modification_id }

    // ── 结构性谓词 ────────────────────────────────────────────────────────────

    pub fn table_type(&self)               -> TableType { TableType::External }
    pub fn is_deterministic(&self)         -> bool      { true }
    pub fn can_get_row_count(&self)        -> bool      { true }
    pub fn can_drop(&self)                 -> bool      { true }
    pub fn is_locked_exclusively(&self)    -> bool      { false }
    /// 底层数据不可变，始终是最小值
    pub fn max_data_modification_id(&self) -> u64       { 0 }
    pub fn disk_space_used(&self)          -> u64       { 0 }
}
