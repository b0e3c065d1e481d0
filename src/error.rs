use thiserror::Error;

/// 爬取过程中的错误分类
///
/// 业务代码统一返回 `anyhow::Result`，需要区分处理方式时由状态机
/// 通过 `downcast_ref::<CrawlError>()` 取出具体类别：
///
/// - `TransientUi` / `IncompleteRecord`：本地重试；必需元素重试耗尽时直接重置
/// - `NavigationDrift`：交给状态迁移处理，不致命
/// - `UnrecoverableState`：终止爬取，已保存的题目保留
#[derive(Debug, Error)]
pub enum CrawlError {
    /// 期望的元素在超时时间内没有出现
    #[error("界面元素未就绪: {what}")]
    TransientUi {
        what: String,
        /// 必需元素，且已用完有限次重试
        required: bool,
    },

    /// 提取结果校验不通过
    #[error("题目数据不完整 ({position}): 缺失 {missing:?}")]
    IncompleteRecord {
        position: String,
        missing: Vec<String>,
    },

    /// 题号意外重复，或章节切换时缺少预期标记
    #[error("导航偏移: {0}")]
    NavigationDrift(String),

    /// 重置流程本身无法回到基线界面
    #[error("无法恢复: {0}")]
    UnrecoverableState(String),
}

impl CrawlError {
    /// 创建元素未就绪错误
    pub fn transient(what: impl Into<String>) -> Self {
        CrawlError::TransientUi {
            what: what.into(),
            required: false,
        }
    }

    /// 创建必需元素重试耗尽错误
    pub fn exhausted(what: impl Into<String>) -> Self {
        CrawlError::TransientUi {
            what: what.into(),
            required: true,
        }
    }

    /// 创建不可恢复错误
    pub fn unrecoverable(reason: impl Into<String>) -> Self {
        CrawlError::UnrecoverableState(reason.into())
    }
}

/// 判断 anyhow 错误是否属于致命类别
pub fn is_unrecoverable(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<CrawlError>(),
        Some(CrawlError::UnrecoverableState(_))
    )
}

/// 判断 anyhow 错误是否为必需元素重试耗尽
pub fn is_required_missing(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<CrawlError>(),
        Some(CrawlError::TransientUi { required: true, .. })
    )
}

/// 判断 anyhow 错误是否为元素未就绪
pub fn is_transient_ui(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<CrawlError>(),
        Some(CrawlError::TransientUi { .. })
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let fatal: anyhow::Error = CrawlError::unrecoverable("基线界面未出现").into();
        assert!(is_unrecoverable(&fatal));
        assert!(!is_transient_ui(&fatal));

        let transient: anyhow::Error = CrawlError::transient("题号").into();
        assert!(is_transient_ui(&transient));
        assert!(!is_required_missing(&transient));
        assert!(!is_unrecoverable(&transient));

        let exhausted: anyhow::Error = CrawlError::exhausted("课程名").into();
        assert!(is_transient_ui(&exhausted));
        assert!(is_required_missing(&exhausted));

        let plain = anyhow::anyhow!("网络错误");
        assert!(!is_unrecoverable(&plain));
    }

    #[test]
    fn test_error_display() {
        let err = CrawlError::IncompleteRecord {
            position: "3/20".to_string(),
            missing: vec!["answer".to_string()],
        };
        assert_eq!(err.to_string(), "题目数据不完整 (3/20): 缺失 [\"answer\"]");
    }
}
