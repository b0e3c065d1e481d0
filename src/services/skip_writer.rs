//! 跳过记录写入服务 - 业务能力层
//!
//! 只负责"写 skipped.txt"能力，不关心流程

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use tracing::debug;

use crate::models::position::PagePosition;

/// 跳过记录写入服务
///
/// 职责：
/// - 将重试后仍不完整的题目追加到 skipped.txt
/// - 只处理单个题目
/// - 不关心流程顺序
pub struct SkipWriter {
    skip_file_path: String,
}

impl SkipWriter {
    pub fn new() -> Self {
        Self {
            skip_file_path: "skipped.txt".to_string(),
        }
    }

    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            skip_file_path: path.into(),
        }
    }

    /// 写入一条跳过记录
    ///
    /// # 参数
    /// - `position`: 题目位置
    /// - `missing`: 缺失字段
    pub async fn write(&self, position: &PagePosition, missing: &[String]) -> Result<()> {
        debug!("写入跳过记录: {} | 缺失 {:?}", position, missing);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.skip_file_path)
            .with_context(|| format!("无法打开 {}", self.skip_file_path))?;

        let line = format!(
            "{} | {} | 缺失: {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            position,
            missing.join(", ")
        );

        file.write_all(line.as_bytes())?;

        Ok(())
    }
}

impl Default for SkipWriter {
    fn default() -> Self {
        Self::new()
    }
}
