//! 视口解析服务 - 业务能力层
//!
//! 轮播相邻页会同时挂载在界面树里，只有水平中心最接近屏幕中心的
//! 那个内容容器才是当前页。所有字段读取都要先经过这里过滤。

use anyhow::Result;
use tracing::debug;

use crate::infrastructure::screen::{Bounds, Element, Locator, Screen};
use crate::infrastructure::wait::poll_until;

/// 低于此高度的元素视为尚未布局的幽灵节点
pub const MIN_ELEMENT_HEIGHT: i32 = 1;

/// 查询范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// 整个屏幕宽度内
    Global,
    /// 屏幕宽度内且上下都落在当前页内容容器中
    Pane(Bounds),
}

/// 从候选容器中选出当前页
///
/// 取水平中心偏移最小者；最小偏移超过一个屏宽说明页面还没就位。
pub fn pick_active(containers: &[Bounds], screen_width: i32) -> Option<Bounds> {
    let half = screen_width / 2;
    let (offset, bounds) = containers
        .iter()
        .map(|b| ((b.center_x() - half).abs(), *b))
        .min_by_key(|(offset, _)| *offset)?;

    if offset > screen_width {
        return None;
    }
    Some(bounds)
}

/// 按范围过滤元素，并按阅读顺序（先上后下，同一行先左后右）排序
pub fn filter_in_scope(elements: Vec<Element>, scope: Scope, screen_width: i32) -> Vec<Element> {
    let mut kept: Vec<Element> = elements
        .into_iter()
        .filter(|e| {
            let b = &e.bounds;
            b.left >= 0 && b.left < b.right && b.right <= screen_width
        })
        .filter(|e| e.bounds.height() >= MIN_ELEMENT_HEIGHT)
        .filter(|e| match scope {
            Scope::Global => true,
            Scope::Pane(pane) => pane.contains_vertically(&e.bounds),
        })
        .collect();

    kept.sort_by_key(|e| (e.bounds.top, e.bounds.left));
    kept
}

/// 视口解析器
pub struct ViewportResolver {
    container: Locator,
}

impl ViewportResolver {
    pub fn new(container_id: &str) -> Self {
        Self {
            container: Locator::id(container_id),
        }
    }

    /// 当前页的内容容器范围，没有就位时返回 `None`
    pub async fn active_viewport<S: Screen>(&self, screen: &S) -> Result<Option<Bounds>> {
        let containers: Vec<Bounds> = screen
            .find(&self.container)
            .await?
            .into_iter()
            .map(|e| e.bounds)
            .collect();

        let active = pick_active(&containers, screen.width());
        if active.is_none() {
            debug!("未找到就位的内容容器 (候选 {} 个)", containers.len());
        }
        Ok(active)
    }

    /// 按范围查询元素
    pub async fn query<S: Screen>(
        &self,
        screen: &S,
        locator: &Locator,
        scope: Scope,
    ) -> Result<Vec<Element>> {
        let elements = screen.find(locator).await?;
        Ok(filter_in_scope(elements, scope, screen.width()))
    }

    /// 范围内第一个非空文本
    pub async fn first_text<S: Screen>(
        &self,
        screen: &S,
        locator: &Locator,
        scope: Scope,
    ) -> Result<Option<String>> {
        Ok(self
            .query(screen, locator, scope)
            .await?
            .iter()
            .find_map(|e| e.non_empty_text().map(str::to_string)))
    }

    /// 等待内容容器就位
    pub async fn wait_viewport<S: Screen>(
        &self,
        screen: &S,
        timeout_ms: u64,
        poll_ms: u64,
    ) -> Result<Option<Bounds>> {
        let ready = poll_until(screen, timeout_ms, poll_ms, || async {
            Ok::<_, anyhow::Error>(self.active_viewport(screen).await?.is_some())
        })
        .await?;

        if !ready {
            return Ok(None);
        }
        self.active_viewport(screen).await
    }
}
