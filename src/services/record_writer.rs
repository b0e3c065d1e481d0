//! 题目保存服务 - 业务能力层
//!
//! 只负责"把一条记录写成一个 JSON 文件"，不关心流程。
//! 路径：`<输出目录>/<课程>/<单元>/<时间戳>.json`，目录按需创建，只追加不覆盖。

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::info;

use crate::models::question::{QuestionDocument, QuestionRecord};

/// 记录接收端
#[allow(async_fn_in_trait)]
pub trait RecordSink {
    /// 保存一条记录，返回可用于日志和恢复的引用（文件路径）
    async fn persist(&self, record: &QuestionRecord) -> Result<String>;
}

/// 文档名的时间戳格式，精确到毫秒
pub fn document_name() -> String {
    chrono::Local::now()
        .format("%Y-%m-%d-%H-%M-%S-%3f")
        .to_string()
}

/// 把课程名、单元名变成安全的目录名
pub fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// JSON 文件写入
pub struct JsonRecordWriter {
    output_dir: PathBuf,
    package: String,
}

impl JsonRecordWriter {
    pub fn new(output_dir: impl Into<PathBuf>, package: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            package: package.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn directory_for(&self, record: &QuestionRecord) -> PathBuf {
        let mut dir = self.output_dir.join(sanitize_segment(record.course()));
        let unit = record.unit().map(sanitize_segment).unwrap_or_default();
        if !unit.is_empty() {
            dir.push(unit);
        }
        dir
    }

    /// 同一毫秒内写入多条时追加序号，避免覆盖；无法确认文件是否存在时报错
    async fn free_name(dir: &Path, base: &str) -> Result<(String, PathBuf)> {
        let mut name = base.to_string();
        let mut n = 1;
        loop {
            let path = dir.join(format!("{}.json", name));
            let exists = fs::try_exists(&path)
                .await
                .with_context(|| format!("无法检查文件: {}", path.display()))?;
            if !exists {
                return Ok((name, path));
            }
            name = format!("{}-{}", base, n);
            n += 1;
        }
    }
}

impl RecordSink for JsonRecordWriter {
    async fn persist(&self, record: &QuestionRecord) -> Result<String> {
        let dir = self.directory_for(record);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("无法创建目录: {}", dir.display()))?;

        let (name, path) = Self::free_name(&dir, &document_name()).await?;
        let document = QuestionDocument {
            name,
            pkg: self.package.clone(),
            record: record.clone(),
        };
        let json = serde_json::to_string_pretty(&document).context("序列化题目失败")?;

        fs::write(&path, json)
            .await
            .with_context(|| format!("无法写入文件: {}", path.display()))?;

        info!("  ✔ 保存成功 {}", record.no());
        Ok(path.to_string_lossy().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::loaders::load_document;
    use crate::models::question::SingleQuestion;

    fn record(unit: Option<&str>) -> QuestionRecord {
        QuestionRecord::Single(SingleQuestion {
            course: "内科学".to_string(),
            no: "1/3".to_string(),
            unit: unit.map(str::to_string),
            mode: Some("A1型题".to_string()),
            stem: Some("题干".to_string()),
            options: vec!["A. 甲".to_string()],
            answer: Some("A".to_string()),
            accuracy: "50%".to_string(),
            key_point: String::new(),
            discussion: String::new(),
        })
    }

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment("第一章/第二节"), "第一章_第二节");
        assert_eq!(sanitize_segment(" .. "), "_");
        assert_eq!(sanitize_segment("内科学"), "内科学");
    }

    #[test]
    fn test_document_name_format() {
        let name = document_name();
        // 2026-10-18-09-30-15-123
        assert_eq!(name.len(), 23);
        assert_eq!(name.matches('-').count(), 6);
    }

    #[tokio::test]
    async fn test_persist_writes_under_course_and_unit() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonRecordWriter::new(dir.path(), "com.yikaobang.yixue");

        let first = writer.persist(&record(Some("第一章/总论"))).await.unwrap();
        let second = writer.persist(&record(Some("第一章/总论"))).await.unwrap();

        assert_ne!(first, second);
        let first = PathBuf::from(first);
        assert_eq!(first.parent().unwrap(), dir.path().join("内科学").join("第一章_总论"));

        let doc = load_document(&first).await.unwrap();
        assert_eq!(doc.pkg, "com.yikaobang.yixue");
        assert_eq!(doc.record, record(Some("第一章/总论")));
    }

    #[tokio::test]
    async fn test_persist_without_unit_goes_to_course_dir() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonRecordWriter::new(dir.path(), "pkg");

        let path = PathBuf::from(writer.persist(&record(None)).await.unwrap());
        assert_eq!(path.parent().unwrap(), dir.path().join("内科学"));
    }

    #[tokio::test]
    async fn test_free_name_skips_taken_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("stamp.json"), "{}").await.unwrap();
        fs::write(dir.path().join("stamp-1.json"), "{}").await.unwrap();

        let (name, path) = JsonRecordWriter::free_name(dir.path(), "stamp").await.unwrap();
        assert_eq!(name, "stamp-2");
        assert_eq!(path, dir.path().join("stamp-2.json"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_free_name_reports_unreadable_directory() {
        // 目录位置其实是个文件
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("file");
        fs::write(&not_a_dir, "x").await.unwrap();

        let err = JsonRecordWriter::free_name(&not_a_dir, "stamp").await.unwrap_err();
        assert!(format!("{:#}", err).contains("无法检查文件"));
    }
}
