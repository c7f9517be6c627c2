//! 列定义与运行时值

use crate::geometry::Envelope;

/// 伪列 `_ROWID_` 的名字
pub const ROWID_COLUMN: &str = "_ROWID_";

/// 行文件中列的存储类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int32,
    Int64,
    Float64,
    /// 变长字节（Varchar / String）
    Varchar,
    /// 几何值，只保留外包矩形
    Geometry,
}

impl ColumnType {
    pub fn tag(self) -> u8 {
        match self {
            Self::Int32    => 1,
            Self::Int64    => 2,
            Self::Float64  => 3,
            Self::Varchar  => 4,
            Self::Geometry => 5,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Int32),
            2 => Some(Self::Int64),
            3 => Some(Self::Float64),
            4 => Some(Self::Varchar),
            5 => Some(Self::Geometry),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name:        String,
    pub column_type: ColumnType,
    /// 在表中的位置；伪列为 -1
    pub position:    i32,
}

impl Column {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self { name: name.into(), column_type, position: 0 }
    }

    pub fn at(mut self, position: i32) -> Self {
        self.position = position; self
    }

    /// `_ROWID_` 伪列，不属于任何物理列
    pub fn rowid() -> Self {
        Self { name: ROWID_COLUMN.into(), column_type: ColumnType::Int64, position: -1 }
    }

    pub fn is_rowid(&self) -> bool { self.position < 0 }
}

/// 列值（运行时表示）
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Bytes(Vec<u8>),
    Geometry(Envelope),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int32(v) => Some(*v as i64),
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null        => write!(f, "NULL"),
            Self::Int32(v)    => write!(f, "{v}"),
            Self::Int64(v)    => write!(f, "{v}"),
            Self::Float64(v)  => write!(f, "{v}"),
            Self::Bytes(b)    => write!(f, "{}", String::from_utf8_lossy(b)),
            Self::Geometry(e) => write!(f, "{e}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Self::Bytes(s.as_bytes().to_vec()) }
}
