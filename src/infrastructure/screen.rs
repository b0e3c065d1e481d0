//! 屏幕能力 - 基础设施层
//!
//! 定义宿主无障碍接口暴露给爬取核心的最小能力集合：
//! 查找元素、点击、滑动、等待，以及被驱动 App 的启动控制。
//! 核心只读取元素快照，从不持有宿主的 UI 树。

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// 屏幕坐标系下的矩形
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn center_x(&self) -> i32 {
        (self.left + self.right) / 2
    }

    pub fn center_y(&self) -> i32 {
        (self.top + self.bottom) / 2
    }

    /// `other` 的上下边是否都落在本矩形内
    pub fn contains_vertically(&self, other: &Bounds) -> bool {
        other.top >= self.top && other.bottom <= self.bottom
    }

    /// 上下各收缩 `inset` 像素
    pub fn inset_vertical(&self, inset: i32) -> Bounds {
        Bounds::new(self.left, self.top + inset, self.right, self.bottom - inset)
    }
}

/// 文本匹配方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "value")]
pub enum TextMatch {
    Exact(String),
    Contains(String),
}

/// 元素定位条件：资源 id + 可选文本谓词
///
/// id 支持完整形式（`pkg:id/name`）和简写（`name`），
/// 简写匹配任意包名下同名的 id。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Locator {
    pub id: Option<String>,
    pub text: Option<TextMatch>,
}

impl Locator {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            text: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: Some(TextMatch::Exact(text.into())),
        }
    }

    pub fn text_contains(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: Some(TextMatch::Contains(text.into())),
        }
    }

    /// 在 id 条件上追加精确文本条件
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(TextMatch::Exact(text.into()));
        self
    }

    /// 判断一个节点是否满足条件
    pub fn matches(&self, node_id: &str, node_text: Option<&str>) -> bool {
        if let Some(id) = &self.id {
            let short_match = node_id
                .rsplit_once(":id/")
                .map(|(_, name)| name == id)
                .unwrap_or(false);
            if node_id != id && !short_match {
                return false;
            }
        }
        match &self.text {
            None => true,
            Some(TextMatch::Exact(expected)) => node_text == Some(expected.as_str()),
            Some(TextMatch::Contains(part)) => {
                node_text.map(|t| t.contains(part.as_str())).unwrap_or(false)
            }
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.id, &self.text) {
            (Some(id), None) => write!(f, "id={}", id),
            (None, Some(text)) => write!(f, "text={:?}", text),
            (Some(id), Some(text)) => write!(f, "id={} text={:?}", id, text),
            (None, None) => write!(f, "*"),
        }
    }
}

/// 元素快照
///
/// `handle` 是宿主侧的不透明引用，只用于回传给 `Screen` 做点击和取父节点。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub handle: String,
    #[serde(default)]
    pub id: String,
    pub bounds: Bounds,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub clickable: bool,
}

impl Element {
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// 去掉首尾空白后非空的文本
    pub fn non_empty_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

/// 屏幕提供者
///
/// 所有操作都是顺序执行的：调用方 await 完成后才会发出下一步动作。
#[allow(async_fn_in_trait)]
pub trait Screen {
    /// 屏幕宽度（像素）
    fn width(&self) -> i32;

    /// 屏幕高度（像素）
    fn height(&self) -> i32;

    /// 查找所有匹配的元素（不做可见性过滤）
    async fn find(&self, locator: &Locator) -> Result<Vec<Element>>;

    async fn exists(&self, locator: &Locator) -> Result<bool> {
        Ok(!self.find(locator).await?.is_empty())
    }

    /// 点击元素，返回宿主是否接受了点击
    async fn click(&self, element: &Element) -> Result<bool>;

    /// 按坐标点击
    async fn tap(&self, x: i32, y: i32) -> Result<()>;

    async fn parent(&self, element: &Element) -> Result<Option<Element>>;

    async fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32, duration_ms: u64) -> Result<()>;

    /// 固定时长空闲，让界面稳定下来
    async fn idle(&self, ms: u64);
}

/// 被驱动 App 的进程控制
#[allow(async_fn_in_trait)]
pub trait AppControl {
    async fn launch(&self, app_name: &str) -> Result<()>;

    /// 打开 App 的系统设置页（用于强行停止）
    async fn open_settings(&self, package: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_short_id_matches_full_id() {
        let locator = Locator::id("close");
        assert!(locator.matches("com.yikaobang.yixue:id/close", None));
        assert!(locator.matches("close", None));
        assert!(!locator.matches("com.yikaobang.yixue:id/close_btn", None));
    }

    #[test]
    fn test_locator_text_predicates() {
        let exact = Locator::id("pkg:id/labeltext").with_text("背题模式");
        assert!(exact.matches("pkg:id/labeltext", Some("背题模式")));
        assert!(!exact.matches("pkg:id/labeltext", Some("全部")));

        let contains = Locator::text_contains("内科");
        assert!(contains.matches("anything", Some("内科学 第一章")));
        assert!(!contains.matches("anything", None));
    }

    #[test]
    fn test_bounds_helpers() {
        let b = Bounds::new(100, 400, 300, 600);
        assert_eq!(b.center_x(), 200);
        assert_eq!(b.center_y(), 500);
        assert_eq!(b.height(), 200);
        assert_eq!(b.inset_vertical(50), Bounds::new(100, 450, 300, 550));
        assert!(b.contains_vertically(&Bounds::new(0, 400, 10, 600)));
        assert!(!b.contains_vertically(&Bounds::new(0, 399, 10, 600)));
    }
}
