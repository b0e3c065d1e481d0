//! 页面分类服务 - 业务能力层
//!
//! 根据标记元素是否存在给当前界面贴标签，判断顺序固定。

use std::fmt::Display;

use anyhow::Result;

use crate::infrastructure::screen::{Locator, Screen};
use crate::models::selectors::Selectors;
use crate::services::viewport::{filter_in_scope, Scope};

/// 页面类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// 题目详情页
    Detail,
    /// 题号列表页
    ListGrid,
    /// 本章最后一题后的"跳转下一章"弹窗
    ChapterTransition,
    /// 广告或其它遮挡弹层
    Overlay,
    /// 列表页的筛选面板（选择背题模式）
    ModeSelect,
    Unknown,
}

impl Display for PageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PageKind::Detail => "详情页",
            PageKind::ListGrid => "列表页",
            PageKind::ChapterTransition => "章节切换",
            PageKind::Overlay => "弹层",
            PageKind::ModeSelect => "模式选择",
            PageKind::Unknown => "未知页面",
        };
        write!(f, "{}", name)
    }
}

/// 一次采样得到的标记
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageSignals {
    pub overlay: bool,
    pub transition: bool,
    pub list_grid: bool,
    pub mode_select: bool,
    pub detail: bool,
}

impl PageSignals {
    /// 优先级：弹层 > 章节切换 > 列表 > 模式选择 > 详情 > 未知
    pub fn classify(&self) -> PageKind {
        if self.overlay {
            PageKind::Overlay
        } else if self.transition {
            PageKind::ChapterTransition
        } else if self.list_grid {
            PageKind::ListGrid
        } else if self.mode_select {
            PageKind::ModeSelect
        } else if self.detail {
            PageKind::Detail
        } else {
            PageKind::Unknown
        }
    }
}

pub struct PageClassifier {
    overlay: Vec<Locator>,
    transition: Locator,
    list_item: Locator,
    mode_filter: Locator,
    stem: Locator,
}

impl PageClassifier {
    pub fn new(selectors: &Selectors) -> Self {
        let mut overlay = vec![Locator::id(selectors.ad_close_id.as_str())];
        overlay.extend(Selectors::by_texts(&selectors.ad_close_texts));
        Self {
            overlay,
            transition: Locator::id(selectors.next_chapter.as_str()),
            list_item: Locator::id(selectors.list_item.as_str()),
            mode_filter: Locator::id(selectors.filter_label.as_str())
                .with_text(selectors.filter_recite_text.as_str()),
            stem: Locator::id(selectors.stem.as_str()),
        }
    }

    pub async fn signals<S: Screen>(&self, screen: &S) -> Result<PageSignals> {
        let mut signals = PageSignals::default();

        for locator in &self.overlay {
            if screen.exists(locator).await? {
                signals.overlay = true;
                break;
            }
        }
        signals.transition = screen.exists(&self.transition).await?;
        signals.list_grid = screen.exists(&self.list_item).await?;
        signals.mode_select = !signals.list_grid && screen.exists(&self.mode_filter).await?;

        // 题干必须在屏幕范围内，轮播邻页的不算
        let stems = screen.find(&self.stem).await?;
        signals.detail = !filter_in_scope(stems, Scope::Global, screen.width()).is_empty();

        Ok(signals)
    }

    pub async fn classify<S: Screen>(&self, screen: &S) -> Result<PageKind> {
        Ok(self.signals(screen).await?.classify())
    }
}
