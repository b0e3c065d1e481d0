//! 题号定位服务 - 业务能力层
//!
//! 在可滚动的题号列表中找到目标题号并点进去。
//!
//! - 每一步先由纯函数 `plan` 根据当前渲染的题号决定点击还是滚动
//! - 点击按固定顺序尝试多种方式，直到列表消失
//! - 连续几次滚动后渲染范围不变即判定到达边界，报告未找到

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::{Config, Gestures, Swipe, Timings};
use crate::infrastructure::screen::{Bounds, Element, Locator, Screen};
use crate::infrastructure::wait::{wait_until, Condition};
use crate::services::viewport::{filter_in_scope, Scope};

/// 滚动方向（按题号大小）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    TowardSmaller,
    TowardLarger,
}

/// 下一步动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocateStep {
    Tap(Element),
    Scroll(ScrollDirection),
}

/// 点击方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapStrategy {
    /// 第 n 层祖先容器
    Ancestor(u8),
    /// 元素中心坐标
    Coordinates,
    /// 格子里的辅助图标
    AuxiliaryIcon,
}

pub const TAP_CHAIN: [TapStrategy; 4] = [
    TapStrategy::Ancestor(1),
    TapStrategy::Ancestor(2),
    TapStrategy::Coordinates,
    TapStrategy::AuxiliaryIcon,
];

/// 前后两次的中心纵坐标差小于此值视为没动
const UNMOVED_TOLERANCE: i32 = 10;

fn item_number(element: &Element) -> Option<u32> {
    element.text().and_then(|t| t.trim().parse().ok())
}

fn find_target(target: u32, items: &[Element]) -> Option<&Element> {
    items.iter().find(|e| item_number(e) == Some(target))
}

/// 渲染出的题号范围
pub fn rendered_range(items: &[Element]) -> Option<(u32, u32)> {
    let numbers = items.iter().filter_map(item_number);
    let (min, max) = numbers.fold((u32::MAX, 0), |(lo, hi), n| (lo.min(n), hi.max(n)));
    (min <= max).then_some((min, max))
}

/// 根据当前渲染的题号决定下一步
///
/// - 目标在安全区内：点击
/// - 目标已渲染但贴边：往离它近的那一侧滚
/// - 目标比最小的还小：往小号方向滚；否则往大号方向滚
pub fn plan(target: u32, items: &[Element], safe: &Bounds) -> LocateStep {
    if let Some(element) = find_target(target, items) {
        if safe.contains_vertically(&element.bounds) {
            return LocateStep::Tap(element.clone());
        }
        let y = element.bounds.center_y();
        let direction = if y - safe.top < safe.bottom - y {
            ScrollDirection::TowardSmaller
        } else {
            ScrollDirection::TowardLarger
        };
        return LocateStep::Scroll(direction);
    }

    match rendered_range(items) {
        Some((min, _)) if target < min => LocateStep::Scroll(ScrollDirection::TowardSmaller),
        _ => LocateStep::Scroll(ScrollDirection::TowardLarger),
    }
}

/// 列表的一次快照
struct GridSnapshot {
    items: Vec<Element>,
    safe: Bounds,
}

impl GridSnapshot {
    fn range(&self) -> Option<(u32, u32)> {
        rendered_range(&self.items)
    }
}

/// 题号定位器
pub struct PositionLocator {
    list_item: Locator,
    list_item_icon: Locator,
    list_grid: Locator,
    safe_inset: i32,
    stuck_threshold: usize,
    timings: Timings,
    gestures: Gestures,
}

impl PositionLocator {
    pub fn new(config: &Config) -> Self {
        let s = &config.selectors;
        Self {
            list_item: Locator::id(s.list_item.as_str()),
            list_item_icon: Locator::id(s.list_item_icon.as_str()),
            list_grid: Locator::id(s.list_grid.as_str()),
            safe_inset: config.layout.safe_inset,
            stuck_threshold: config.stall_threshold.max(1),
            timings: config.timings.clone(),
            gestures: config.gestures.clone(),
        }
    }

    pub fn list_item(&self) -> &Locator {
        &self.list_item
    }

    async fn snapshot<S: Screen>(&self, screen: &S) -> Result<GridSnapshot> {
        let items = filter_in_scope(
            screen.find(&self.list_item).await?,
            Scope::Global,
            screen.width(),
        );
        let grid = screen
            .find(&self.list_grid)
            .await?
            .into_iter()
            .next()
            .map(|g| g.bounds)
            .unwrap_or(Bounds::new(0, 0, screen.width(), screen.height()));

        Ok(GridSnapshot {
            items,
            safe: grid.inset_vertical(self.safe_inset),
        })
    }

    fn gesture(&self, direction: ScrollDirection) -> &Swipe {
        match direction {
            ScrollDirection::TowardSmaller => &self.gestures.list_scroll_up,
            ScrollDirection::TowardLarger => &self.gestures.list_scroll_down,
        }
    }

    /// 找到并点进目标题号，到达边界仍未找到时返回 false
    pub async fn locate<S: Screen>(&self, screen: &S, target: u32) -> Result<bool> {
        info!("  定位题号 {}", target);

        let mut unchanged = 0;
        let mut scrolls = 0;
        // 上一次因贴边而调整时目标的位置
        let mut nudged_from: Option<Bounds> = None;

        loop {
            let snapshot = self.snapshot(screen).await?;
            let mut step = plan(target, &snapshot.items, &snapshot.safe);

            // 贴边调整后位置没变，说明列表已经到头，直接点
            if let (LocateStep::Scroll(_), Some(before), Some(element)) =
                (&step, nudged_from, find_target(target, &snapshot.items))
            {
                if (element.bounds.center_y() - before.center_y()).abs() < UNMOVED_TOLERANCE {
                    debug!("  题号 {} 贴边且列表无法再滚动，直接点击", target);
                    step = LocateStep::Tap(element.clone());
                }
            }

            let direction = match step {
                LocateStep::Tap(element) => {
                    if self.tap(screen, &element).await? {
                        info!("  ✓ 已进入题号 {}", target);
                        return Ok(true);
                    }
                    warn!("  点击题号 {} 后仍在列表页，继续滚动查找", target);
                    nudged_from = None;
                    ScrollDirection::TowardLarger
                }
                LocateStep::Scroll(direction) => {
                    nudged_from = find_target(target, &snapshot.items).map(|e| e.bounds);
                    direction
                }
            };

            let before = snapshot.range();
            self.gesture(direction).perform(screen).await?;
            screen.idle(self.timings.scroll_settle_ms).await;
            scrolls += 1;

            let after = self.snapshot(screen).await?.range();
            if after == before {
                unchanged += 1;
                if unchanged >= self.stuck_threshold {
                    warn!(
                        "  定位失败，渲染范围 {:?} 连续 {} 次未变化，未找到题号 {} (共滚动 {} 次)",
                        after, unchanged, target, scrolls
                    );
                    return Ok(false);
                }
            } else {
                unchanged = 0;
            }

            if scrolls % 10 == 0 {
                info!("  滚动中... (已滚动 {} 次，当前范围 {:?})", scrolls, after);
            }
        }
    }

    /// 依次尝试点击方式，列表消失即成功
    async fn tap<S: Screen>(&self, screen: &S, element: &Element) -> Result<bool> {
        for strategy in TAP_CHAIN {
            if !self.apply(screen, element, strategy).await? {
                continue;
            }
            let entered = wait_until(
                screen,
                Condition::Absent(&self.list_item),
                self.timings.tap_verify_ms,
                self.timings.poll_ms,
            )
            .await?;
            if entered {
                debug!("  点击方式 {:?} 生效", strategy);
                return Ok(true);
            }
            debug!("  点击方式 {:?} 未生效", strategy);
        }
        Ok(false)
    }

    /// 执行一种点击方式，返回是否真正发出了点击
    async fn apply<S: Screen>(
        &self,
        screen: &S,
        element: &Element,
        strategy: TapStrategy,
    ) -> Result<bool> {
        match strategy {
            TapStrategy::Ancestor(depth) => {
                let mut current = element.clone();
                for _ in 0..depth {
                    match screen.parent(&current).await? {
                        Some(parent) => current = parent,
                        None => return Ok(false),
                    }
                }
                screen.click(&current).await
            }
            TapStrategy::Coordinates => {
                screen
                    .tap(element.bounds.center_x(), element.bounds.center_y())
                    .await?;
                Ok(true)
            }
            TapStrategy::AuxiliaryIcon => {
                let target = element.bounds;
                let icon = screen
                    .find(&self.list_item_icon)
                    .await?
                    .into_iter()
                    .filter(|i| i.bounds.left < target.right && i.bounds.right > target.left)
                    .min_by_key(|i| (i.bounds.center_y() - target.center_y()).abs());
                match icon {
                    Some(icon) => screen.click(&icon).await,
                    None => Ok(false),
                }
            }
        }
    }
}
