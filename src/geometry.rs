//! 几何外包矩形
//!
//! 表层不解析几何体本身，空间索引只需要每个几何值的 Envelope。

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    /// 两个角点构造，自动规范化为 min <= max
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2), min_y: y1.min(y2),
            max_x: x1.max(x2), max_y: y1.max(y2),
        }
    }

    pub fn point(x: f64, y: f64) -> Self { Self::new(x, y, x, y) }

    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x && self.max_x >= other.min_x
            && self.min_y <= other.max_y && self.max_y >= other.min_y
    }

    pub fn expand_to_include(&mut self, other: &Envelope) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    pub fn area(&self) -> f64 {
        (self.max_x - self.min_x) * (self.max_y - self.min_y)
    }

    /// 按左下角 (min_x, min_y) 排序
    pub fn cmp_lower_left(&self, other: &Envelope) -> Ordering {
        self.min_x.total_cmp(&other.min_x)
            .then_with(|| self.min_y.total_cmp(&other.min_y))
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ENVELOPE({} {}, {} {})", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}
