//! 批量建索引
//!
//! 把扫描索引里的所有行灌进一个新建的索引：
//!
//! 1. `buffer_size = min(total, max_memory_rows)`
//! 2. 打开全范围游标，每行先上报进度再放入批次
//! 3. 批次满了就按目标索引的 `compare_rows` 排序后逐行插入，然后清空
//! 4. 游标耗尽后把剩余的半批同样处理
//! 5. 读到的行数必须与 `total` 完全一致，否则视为内部错误
//!
//! 只对每个批次排序而不是全局排序：内存峰值是 O(buffer_size)，
//! 树状二级索引仍能得到大部分顺序插入的好处。
//!
//! 任何一步失败都会让目标索引删除自身，调用方负责释放索引名，
//! 并且只在成功后才把索引挂到表上。

use std::cmp::Ordering;

use crate::common::{KeyRange, Result, TableError};
use crate::index::Index;
use crate::progress::ProgressListener;
use crate::row::Row;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildStats {
    /// 插入目标索引的行数
    pub rows:    u64,
    /// 每次 flush 的批次大小，按发生顺序
    pub flushes: Vec<usize>,
}

/// 用 `scan` 中的所有行构建 `target`，失败时让 `target` 删除自身
pub fn build_index(
    scan:            &dyn Index,
    target:          &mut dyn Index,
    task:            &str,
    max_memory_rows: usize,
    progress:        Option<&dyn ProgressListener>,
) -> Result<BuildStats> {
    match populate(scan, target, task, max_memory_rows, progress) {
        Ok(stats) => {
            tracing::info!(task, rows = stats.rows, batches = stats.flushes.len(), "index built");
            Ok(stats)
        }
        Err(cause) => {
            tracing::warn!(task, error = %cause, "index build failed, removing index");
            if let Err(cleanup) = target.remove() {
                tracing::error!(task, error = %cleanup, "could not remove index");
                return Err(TableError::RollbackFailed {
                    index:   target.name().to_string(),
                    cause:   Box::new(cause),
                    cleanup: Box::new(cleanup),
                });
            }
            Err(cause)
        }
    }
}

fn populate(
    scan:            &dyn Index,
    target:          &mut dyn Index,
    task:            &str,
    max_memory_rows: usize,
    progress:        Option<&dyn ProgressListener>,
) -> Result<BuildStats> {
    let total       = scan.row_count();
    let buffer_size = usize::try_from(total).unwrap_or(usize::MAX).min(max_memory_rows).max(1);
    let mut remaining = total as i64;
    let mut processed = 0u64;
    let mut batch: Vec<Row> = Vec::with_capacity(buffer_size);
    let mut stats = BuildStats::default();

    for row in scan.find(KeyRange::all())? {
        if let Some(listener) = progress {
            listener.report(task, processed, total);
        }
        processed += 1;
        batch.push(row?);
        if batch.len() >= buffer_size {
            flush(target, &mut batch, &mut stats)?;
        }
        remaining -= 1;
    }
    if !batch.is_empty() {
        flush(target, &mut batch, &mut stats)?;
    }

    if remaining != 0 {
        return Err(TableError::Internal(format!("rowcount remaining={remaining} {task}")));
    }
    Ok(stats)
}

/// 排序后插入，然后清空批次
///
/// 排序前先逐行检查可比较性，无法比较的行在任何插入发生前就让构建失败，
/// 排序时比较器对这一批是全序。
fn flush(target: &mut dyn Index, batch: &mut Vec<Row>, stats: &mut BuildStats) -> Result<()> {
    for row in batch.iter() {
        target.check_comparable(row)?;
    }

    // 比较器违反自身约定时记下第一个错误
    let mut failure = None;
    batch.sort_by(|a, b| {
        target.compare_rows(a, b).unwrap_or_else(|e| {
            failure.get_or_insert(e);
            Ordering::Equal
        })
    });
    if let Some(e) = failure {
        return Err(e);
    }

    for row in batch.iter() {
        target.add(row)?;
    }
    tracing::debug!(index = target.name(), rows = batch.len(), "flushed batch");
    stats.rows += batch.len() as u64;
    stats.flushes.push(batch.len());
    batch.clear();
    Ok(())
}
