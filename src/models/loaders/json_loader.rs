use crate::models::question::QuestionDocument;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 JSON 文件加载一条已保存的题目文档
pub async fn load_document(json_file_path: &Path) -> Result<QuestionDocument> {
    let content = fs::read_to_string(json_file_path)
        .await
        .with_context(|| format!("无法读取JSON文件: {}", json_file_path.display()))?;

    let document: QuestionDocument = serde_json::from_str(&content)
        .with_context(|| format!("无法解析JSON文件: {}", json_file_path.display()))?;

    Ok(document)
}

/// 递归加载目录下所有 JSON 文档，按文档名（时间戳）升序
///
/// 单个文件解析失败只记录警告，不中断加载。
pub async fn load_all_documents(folder_path: &Path) -> Result<Vec<(PathBuf, QuestionDocument)>> {
    if !folder_path.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path.display());
    }

    let mut documents = Vec::new();
    let mut pending = vec![folder_path.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir)
            .await
            .with_context(|| format!("无法读取文件夹: {}", dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
                continue;
            }
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            match load_document(&path).await {
                Ok(document) => documents.push((path, document)),
                Err(e) => {
                    tracing::warn!("加载文件失败 {}: {:#}", path.display(), e);
                }
            }
        }
    }

    documents.sort_by(|a, b| a.1.name.cmp(&b.1.name));
    Ok(documents)
}

/// 最近保存的一条文档（按时间戳文件名）
pub async fn latest_document(folder_path: &Path) -> Result<Option<(PathBuf, QuestionDocument)>> {
    if !folder_path.exists() {
        tracing::info!("输出目录 {} 尚不存在，没有可恢复的记录", folder_path.display());
        return Ok(None);
    }
    let mut documents = load_all_documents(folder_path).await?;
    Ok(documents.pop())
}
