//! 全局基础类型、配置与错误定义

use thiserror::Error;

// ── ID 类型别名 ───────────────────────────────────────────────────────────────

pub type TableId  = u32;
pub type IndexId  = u32;
/// 行的稳定标识：行在文件中的位置，从 1 开始
pub type RowKey   = u64;

/// 单批次在内存中最多缓存的行数（批量建索引时使用）
pub const DEFAULT_MAX_MEMORY_ROWS: usize = 40_000;

/// 每隔多少行输出一次建索引进度日志
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

// ── KeyRange ──────────────────────────────────────────────────────────────────

/// [first, last] 闭区间的行键范围；None 表示该端无界
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyRange {
    pub first: Option<RowKey>,
    pub last:  Option<RowKey>,
}

impl KeyRange {
    pub fn new(first: Option<RowKey>, last: Option<RowKey>) -> Self { Self { first, last } }
    pub fn all() -> Self { Self::default() }
    pub fn point(key: RowKey) -> Self { Self::new(Some(key), Some(key)) }

    pub fn contains(&self, key: RowKey) -> bool {
        self.first.map_or(true, |f| key >= f) && self.last.map_or(true, |l| key <= l)
    }
}

impl std::fmt::Display for KeyRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.first, self.last) {
            (Some(a), Some(b)) => write!(f, "[{a},{b}]"),
            (Some(a), None)    => write!(f, "[{a},∞)"),
            (None, Some(b))    => write!(f, "(∞,{b}]"),
            (None, None)       => write!(f, "(∞,∞)"),
        }
    }
}

// ── 枚举 ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableType {
    /// 由外部文件驱动提供数据的表
    External,
}

impl TableType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::External => "EXTERNAL",
        }
    }
}

// ── 配置 ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TableConfig {
    /// 批量建索引时每批最多缓存的行数
    pub max_memory_rows:   usize,
    /// 新建索引是否为临时对象
    pub temporary:         bool,
    /// TracingProgress 的日志间隔（行）
    pub progress_interval: u64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            max_memory_rows:   DEFAULT_MAX_MEMORY_ROWS,
            temporary:         false,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl TableConfig {
    pub fn with_max_memory_rows(mut self, rows: usize) -> Self {
        self.max_memory_rows = rows; self
    }
    pub fn temporary(mut self) -> Self {
        self.temporary = true; self
    }
    pub fn with_progress_interval(mut self, rows: u64) -> Self {
        self.progress_interval = rows.max(1); self
    }
}

// ── 错误 ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TableError {
    #[error("feature not supported: {operation} on {target}")]
    Unsupported { operation: &'static str, target: String },
    #[error("internal error: {0}")]
    Internal(String),
    #[error("index not found: {0}")]
    IndexNotFound(String),
    #[error("table not found: {0}")]
    TableNotFound(String),
    #[error("column not found: {0}")]
    ColumnNotFound(String),
    #[error("row not found: key={0}")]
    RowNotFound(RowKey),
    #[error("object name already in use: {0}")]
    DuplicateName(String),
    #[error("cannot add row {key} to index {index}: {reason}")]
    IndexWrite { index: String, key: RowKey, reason: String },
    #[error("cannot compare rows in index {index}: {reason}")]
    Compare { index: String, reason: String },
    #[error("row source I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt row file: {0}")]
    Corrupt(String),
    #[error("compression error: {0}")]
    Compression(String),
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("row source is closed")]
    SourceClosed,
    #[error("could not remove index {index} after failed build: {cleanup} (build failed with: {cause})")]
    RollbackFailed {
        index:   String,
        cause:   Box<TableError>,
        #[source]
        cleanup: Box<TableError>,
    },
}

impl TableError {
    pub fn unsupported(operation: &'static str, target: impl Into<String>) -> Self {
        Self::Unsupported { operation, target: target.into() }
    }

    /// 是否为“不支持的操作”（回滚失败时看原始原因）
    pub fn is_unsupported(&self) -> bool {
        match self {
            Self::Unsupported { .. }           => true,
            Self::RollbackFailed { cause, .. } => cause.is_unsupported(),
            _                                  => false,
        }
    }

    /// 是否为内部一致性错误
    pub fn is_internal(&self) -> bool {
        match self {
            Self::Internal(_)                  => true,
            Self::RollbackFailed { cause, .. } => cause.is_internal(),
            _                                  => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TableError>;
