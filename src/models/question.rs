use serde::{Deserialize, Serialize};

use crate::models::position::PagePosition;

/// 单题（A1/A2 型）
///
/// 序列化字段名沿用落盘文档的格式：`cls`、`numb`、`test`、`option` 等。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleQuestion {
    /// 课程名
    #[serde(rename = "cls")]
    pub course: String,
    /// 题号，形如 `3/20`
    #[serde(rename = "numb")]
    pub no: String,
    pub unit: Option<String>,
    /// 题型，如 `A1型题`
    pub mode: Option<String>,
    /// 题干
    #[serde(rename = "test")]
    pub stem: Option<String>,
    #[serde(rename = "option")]
    pub options: Vec<String>,
    pub answer: Option<String>,
    /// 正确率，带百分号；没有统计时为空串
    #[serde(rename = "rate", default)]
    pub accuracy: String,
    /// 考点，可以合法地为空串
    #[serde(rename = "point", default)]
    pub key_point: String,
    /// 解析，可以合法地为空串
    #[serde(rename = "discuss", default)]
    pub discussion: String,
}

/// 多子题（A3/A4、案例分析）中的一问
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubPart {
    /// Tab 上的标签，如 `第1问`
    #[serde(rename = "sub_numb")]
    pub label: String,
    #[serde(rename = "sub_test")]
    pub stem: String,
    #[serde(rename = "option")]
    pub options: Vec<String>,
    pub answer: Option<String>,
    #[serde(rename = "rate", default)]
    pub accuracy: String,
    #[serde(rename = "point", default)]
    pub key_point: String,
    #[serde(rename = "discuss", default)]
    pub discussion: String,
}

/// 多子题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiPartQuestion {
    #[serde(rename = "cls")]
    pub course: String,
    #[serde(rename = "numb")]
    pub no: String,
    pub unit: Option<String>,
    pub mode: Option<String>,
    /// 共享题干（Tab 上方）
    #[serde(rename = "test")]
    pub shared_stem: String,
    /// 子题，顺序与 Tab 从左到右一致
    #[serde(rename = "sub_questions")]
    pub parts: Vec<SubPart>,
}

/// 题目记录
///
/// 落盘格式不带类型标签，靠 `sub_questions` 字段区分，
/// 因此 `MultiPart` 必须排在前面参与反序列化尝试。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionRecord {
    MultiPart(MultiPartQuestion),
    Single(SingleQuestion),
}

impl QuestionRecord {
    pub fn course(&self) -> &str {
        match self {
            QuestionRecord::Single(q) => &q.course,
            QuestionRecord::MultiPart(q) => &q.course,
        }
    }

    pub fn no(&self) -> &str {
        match self {
            QuestionRecord::Single(q) => &q.no,
            QuestionRecord::MultiPart(q) => &q.no,
        }
    }

    pub fn unit(&self) -> Option<&str> {
        match self {
            QuestionRecord::Single(q) => q.unit.as_deref(),
            QuestionRecord::MultiPart(q) => q.unit.as_deref(),
        }
    }

    pub fn mode(&self) -> Option<&str> {
        match self {
            QuestionRecord::Single(q) => q.mode.as_deref(),
            QuestionRecord::MultiPart(q) => q.mode.as_deref(),
        }
    }

    /// 记录对应的爬取位置
    pub fn position(&self) -> PagePosition {
        PagePosition::new(self.course(), self.unit().map(str::to_string), self.no())
    }

    /// 用于日志的题干预览
    pub fn stem_preview(&self) -> &str {
        match self {
            QuestionRecord::Single(q) => q.stem.as_deref().unwrap_or_default(),
            QuestionRecord::MultiPart(q) => &q.shared_stem,
        }
    }

    pub fn is_multi_part(&self) -> bool {
        matches!(self, QuestionRecord::MultiPart(_))
    }
}

/// 落盘文档：记录 + 文件名和包名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDocument {
    /// 时间戳文件名（不含扩展名）
    pub name: String,
    pub pkg: String,
    #[serde(flatten)]
    pub record: QuestionRecord,
}
