//! 记录完整性校验 - 业务能力层
//!
//! 考点、解析、正确率允许为空串；缺失与空串是两回事。

use crate::models::question::{MultiPartQuestion, QuestionRecord, SingleQuestion};

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn blank_opt(value: &Option<String>) -> bool {
    value.as_deref().map(blank).unwrap_or(true)
}

fn check_single(q: &SingleQuestion, missing: &mut Vec<String>) {
    if blank(&q.course) {
        missing.push("cls".to_string());
    }
    if blank(&q.no) {
        missing.push("numb".to_string());
    }
    if q.unit.is_none() {
        missing.push("unit".to_string());
    }
    if q.mode.is_none() {
        missing.push("mode".to_string());
    }
    if q.stem.is_none() {
        missing.push("test".to_string());
    }
    if q.options.is_empty() {
        missing.push("option".to_string());
    }
    if q.answer.is_none() {
        missing.push("answer".to_string());
    }
}

fn check_multi(q: &MultiPartQuestion, missing: &mut Vec<String>) {
    if blank(&q.course) {
        missing.push("cls".to_string());
    }
    if blank(&q.no) {
        missing.push("numb".to_string());
    }
    if blank_opt(&q.mode) {
        missing.push("mode".to_string());
    }
    if blank(&q.shared_stem) {
        missing.push("test".to_string());
    }
    if q.parts.is_empty() {
        missing.push("sub_questions".to_string());
    }
    for (i, part) in q.parts.iter().enumerate() {
        if blank(&part.label) {
            missing.push(format!("sub_questions[{}].sub_numb", i));
        }
        if blank(&part.stem) {
            missing.push(format!("sub_questions[{}].sub_test", i));
        }
        if part.options.is_empty() {
            missing.push(format!("sub_questions[{}].option", i));
        }
        if blank_opt(&part.answer) {
            missing.push(format!("sub_questions[{}].answer", i));
        }
    }
}

/// 缺失字段列表，为空表示记录完整
pub fn missing_fields(record: &QuestionRecord) -> Vec<String> {
    let mut missing = Vec::new();
    match record {
        QuestionRecord::Single(q) => check_single(q, &mut missing),
        QuestionRecord::MultiPart(q) => check_multi(q, &mut missing),
    }
    missing
}
