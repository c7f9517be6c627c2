//! 名字注册表与 Catalog

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::common::{Result, TableConfig, TableError, TableId};
use crate::driver::FileDriver;
use crate::index::IndexType;
use crate::progress::{ProgressListener, TracingProgress};
use crate::table::{FileTable, IndexDefinition};

// ── NameRegistry ──────────────────────────────────────────────────────────────

/// Schema 对象（表、索引）的名字与 id 分配
#[derive(Debug, Default)]
pub struct NameRegistry {
    names:   HashSet<String>,
    next_id: u32,
}

impl NameRegistry {
    pub fn reserve(&mut self, name: &str) -> Result<()> {
        if !self.names.insert(name.to_string()) {
            return Err(TableError::DuplicateName(name.into()));
        }
        Ok(())
    }

    /// 释放名字，返回它之前是否被占用
    pub fn free(&mut self, name: &str) -> bool {
        self.names.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// `<table>.<column>_INDEX_<n>` 中第一个未被占用的名字
    pub fn unique_index_name(&self, table: &str, column: &str) -> String {
        let prefix = format!("{table}.{column}_INDEX_");
        (1u32..)
            .map(|n| format!("{prefix}{n}"))
            .find(|candidate| !self.names.contains(candidate))
            .unwrap_or(prefix)
    }

    pub fn next_object_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

// ── Database ──────────────────────────────────────────────────────────────────

/// 单进程内的外部表 Catalog
///
/// 持有所有已链接的文件表；结构性操作都需要 `&mut self`，由调用方串行化。
pub struct Database {
    names:    NameRegistry,
    tables:   HashMap<String, FileTable>,
    config:   TableConfig,
    progress: Option<Arc<dyn ProgressListener>>,
}

impl Database {
    /// 默认按 `config.progress_interval` 输出建索引进度日志
    pub fn new(config: TableConfig) -> Self {
        let progress: Arc<dyn ProgressListener> = Arc::new(TracingProgress::new(config.progress_interval));
        Self { names: NameRegistry::default(), tables: HashMap::new(), config, progress: Some(progress) }
    }

    pub fn with_progress(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.progress = Some(listener); self
    }

    pub fn names(&self) -> &NameRegistry { &self.names }

    /// 把驱动注册为一张外部表
    pub fn link_table(&mut self, name: &str, driver: Arc<dyn FileDriver>) -> Result<TableId> {
        self.names.reserve(name)?;
        let id = self.names.next_object_id();
        match FileTable::open(id, name, driver, &mut self.names, self.config.clone()) {
            Ok(table) => {
                self.tables.insert(name.to_string(), table);
                tracing::info!(table = name, id, "linked file table");
                Ok(id)
            }
            Err(e) => {
                self.names.free(name);
                Err(e)
            }
        }
    }

    pub fn table(&self, name: &str) -> Result<&FileTable> {
        self.tables.get(name).ok_or_else(|| TableError::TableNotFound(name.into()))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut FileTable> {
        self.tables.get_mut(name).ok_or_else(|| TableError::TableNotFound(name.into()))
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// CREATE INDEX；`name` 为空时生成 `<table>.<column>_INDEX_<n>`
    pub fn create_index(
        &mut self,
        table:      &str,
        name:       Option<&str>,
        columns:    &[&str],
        index_type: IndexType,
        comment:    Option<&str>,
    ) -> Result<String> {
        let t = self.tables.get_mut(table).ok_or_else(|| TableError::TableNotFound(table.into()))?;
        let name = match name {
            Some(n) => n.to_string(),
            None    => self.names.unique_index_name(table, columns.first().copied().unwrap_or("")),
        };
        self.names.reserve(&name)?;

        let mut def = IndexDefinition::new(self.names.next_object_id(), &name, columns, index_type);
        def.comment = comment.map(str::to_string);
        t.add_index(&mut self.names, self.progress.as_deref(), def)?;
        Ok(name)
    }

    pub fn create_spatial_index(&mut self, table: &str, column: &str) -> Result<String> {
        self.create_index(table, None, &[column], IndexType::Spatial, None)
    }

    pub fn drop_index(&mut self, table: &str, index: &str) -> Result<()> {
        let t = self.tables.get_mut(table).ok_or_else(|| TableError::TableNotFound(table.into()))?;
        t.drop_index(&mut self.names, index)
    }

    /// 关闭并移除表，释放表名与其所有索引名
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        let mut table = self.tables.remove(name).ok_or_else(|| TableError::TableNotFound(name.into()))?;
        table.close();
        for index in table.indexes() {
            self.names.free(index.name());
        }
        self.names.free(name);
        tracing::info!(table = name, "dropped file table");
        Ok(())
    }

    pub fn close(&mut self) {
        for table in self.tables.values_mut() {
            table.close();
        }
    }
}
