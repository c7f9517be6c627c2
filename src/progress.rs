//! 建索引进度回调

use std::sync::atomic::{AtomicU64, Ordering};

/// 批量建索引时每处理一行调用一次
pub trait ProgressListener: Send + Sync {
    fn report(&self, task: &str, current: u64, total: u64);
}

/// 每隔 `interval` 行输出一条 tracing 日志
pub struct TracingProgress {
    interval: u64,
    reported: AtomicU64,
}

impl TracingProgress {
    pub fn new(interval: u64) -> Self {
        Self { interval: interval.max(1), reported: AtomicU64::new(0) }
    }

    /// 已输出的日志条数
    pub fn reported(&self) -> u64 { self.reported.load(Ordering::Relaxed) }
}

impl ProgressListener for TracingProgress {
    fn report(&self, task: &str, current: u64, total: u64) {
        if current % self.interval == 0 || current + 1 == total {
            self.reported.fetch_add(1, Ordering::Relaxed);
            tracing::info!(task, current, total, "creating index");
        }
    }
}
