use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// 逻辑爬取位置
///
/// 同一单元内题号分子单调不减，用于判断是否卡住以及重置后恢复。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePosition {
    pub course: String,
    pub unit: Option<String>,
    /// 形如 `k/n`
    pub question_number: String,
}

impl PagePosition {
    pub fn new(
        course: impl Into<String>,
        unit: Option<String>,
        question_number: impl Into<String>,
    ) -> Self {
        Self {
            course: course.into(),
            unit,
            question_number: question_number.into(),
        }
    }

    /// 题号分子
    pub fn numerator(&self) -> Option<u32> {
        self.question_number
            .split('/')
            .next()
            .and_then(|k| k.trim().parse().ok())
    }

    /// 本单元题目总数
    pub fn total(&self) -> Option<u32> {
        self.question_number
            .split_once('/')
            .and_then(|(_, n)| n.trim().parse().ok())
    }

    pub fn unit_or_empty(&self) -> &str {
        self.unit.as_deref().unwrap_or_default()
    }

    /// 与另一位置是否处于同一单元
    pub fn same_unit(&self, other: &PagePosition) -> bool {
        self.unit_or_empty() == other.unit_or_empty()
    }
}

impl Display for PagePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} > {} > {}",
            self.course,
            self.unit_or_empty(),
            self.question_number
        )
    }
}
