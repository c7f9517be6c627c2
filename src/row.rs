//! 行

use crate::common::RowKey;
use crate::field_type::Value;

/// 从驱动读出的一行，读出后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub key:    RowKey,
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(key: RowKey, values: Vec<Value>) -> Self { Self { key, values } }

    pub fn value(&self, column: usize) -> Option<&Value> { self.values.get(column) }
}
