//! # file-table-engine
//!
//! 把外部只读文件（如几何数据文件）暴露为查询引擎中的一张表，
//! 并管理其索引与批量建索引。
//!
//! ## 整体架构
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      Database                            │
//! │   NameRegistry (名字/ID)     tables: name → FileTable     │
//! │                                   │                      │
//! │                               FileTable                  │
//! │        ┌──────────────────────────┼────────────────┐     │
//! │   DriverIndex (Scan)     DriverIndex (Unique)  SpatialIndex
//! │        │                          │                ▲     │
//! │        └──────────┬───────────────┘                │     │
//! │                   ▼                         build_index  │
//! │              FileDriver  ── 按页游标 ──────────────┘     │
//! │   ┌──────────────────────────────────────────────┐       │
//! │   │ RowFileDriver: Row Page (LZ4 + CRC32)         │       │
//! │   │ MemoryDriver                                  │       │
//! │   └──────────────────────────────────────────────┘       │
//! └──────────────────────────────────────────────────────────┘
//! ```

// ── 基础类型 ──────────────────────────────────────────────────────────────────
pub mod common;
pub mod field_type;
pub mod geometry;
pub mod row;

// ── 文件层 ────────────────────────────────────────────────────────────────────
pub mod compression;
pub mod page;
pub mod driver;

// ── 表与索引 ──────────────────────────────────────────────────────────────────
pub mod index;
pub mod progress;
pub mod build;
pub mod table;
pub mod catalog;

pub use catalog::{Database, NameRegistry};
pub use common::{KeyRange, Result, RowKey, TableConfig, TableError};
pub use driver::{FileDriver, MemoryDriver, RowFileDriver, RowFileWriter};
pub use index::{Index, IndexKind, IndexType};
pub use table::{FileTable, IndexDefinition};
