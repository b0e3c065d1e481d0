//! 重置恢复服务 - 业务能力层
//!
//! 完整重置：关弹层 → 强行停止 → 重新启动 → 等待首页 → 尽力导航回上次位置。
//! 只有回不到首页才算失败；导航回原位置失败只记录日志。

use anyhow::Result;
use tracing::{info, warn};

use crate::config::{Config, Gestures, Timings};
use crate::error::CrawlError;
use crate::infrastructure::screen::{AppControl, Bounds, Element, Locator, Screen};
use crate::infrastructure::wait::{wait_until, Condition};
use crate::models::position::PagePosition;
use crate::models::selectors::Selectors;
use crate::services::overlay::OverlayService;
use crate::services::position_locator::PositionLocator;
use crate::services::viewport::{filter_in_scope, Scope};

/// 贴底调整滚动的次数上限
const MAX_ADJUST_SCROLLS: usize = 5;

pub struct RecoveryController {
    app_name: String,
    package: String,
    baseline_polls: usize,
    max_search_scrolls: usize,
    safe_inset: i32,
    ad_close: Locator,
    baseline: Locator,
    refresh: Locator,
    force_stop: Vec<Locator>,
    confirm: Vec<Locator>,
    list_item: Locator,
    timings: Timings,
    gestures: Gestures,
    overlay: OverlayService,
    locator: PositionLocator,
}

impl RecoveryController {
    pub fn new(config: &Config) -> Self {
        let s = &config.selectors;
        Self {
            app_name: config.app_name.clone(),
            package: config.app_package.clone(),
            baseline_polls: config.baseline_polls,
            max_search_scrolls: config.max_search_scrolls,
            safe_inset: config.layout.safe_inset,
            ad_close: Locator::id(s.ad_close_id.as_str()),
            baseline: Locator::text(s.baseline_text.as_str()),
            refresh: Locator::text(s.refresh_text.as_str()),
            force_stop: Selectors::by_texts(&s.force_stop_texts),
            confirm: Selectors::by_texts(&s.confirm_texts),
            list_item: Locator::id(s.list_item.as_str()),
            timings: config.timings.clone(),
            gestures: config.gestures.clone(),
            overlay: OverlayService::new(s, config.timings.overlay_idle_ms),
            locator: PositionLocator::new(config),
        }
    }

    /// 完整重置，`target` 为需要导航回去的位置
    pub async fn reset<S: Screen + AppControl>(
        &self,
        screen: &S,
        target: Option<&PagePosition>,
    ) -> Result<()> {
        info!("========== 开始重置 ==========");
        self.overlay.dismiss(screen).await?;
        self.force_stop(screen).await?;

        info!("启动: {}", self.app_name);
        screen.launch(&self.app_name).await?;

        if !self.wait_baseline(screen).await? {
            return Err(CrawlError::unrecoverable(format!(
                "重启后 {} 次轮询内未回到首页",
                self.baseline_polls
            ))
            .into());
        }

        screen.idle(self.timings.relaunch_idle_ms).await;
        self.overlay.dismiss(screen).await?;
        screen.idle(self.timings.action_idle_ms).await;
        self.overlay.dismiss(screen).await?;

        if let Some(target) = target {
            self.renavigate(screen, target).await;
        }

        info!("========== 重置完成 ==========");
        Ok(())
    }

    /// 通过系统设置页强行停止 App
    async fn force_stop<S: Screen + AppControl>(&self, screen: &S) -> Result<()> {
        info!("强制停止 App");
        screen.open_settings(&self.package).await?;
        screen.idle(self.timings.action_idle_ms).await;

        if let Some(stop) = self.first_present(screen, &self.force_stop).await? {
            screen.click(&stop).await?;
            screen.idle(self.timings.action_idle_ms).await;
            if let Some(confirm) = self.first_present(screen, &self.confirm).await? {
                screen.click(&confirm).await?;
            }
        } else {
            warn!("  设置页未找到停止按钮");
        }

        screen.idle(self.timings.force_stop_wait_ms).await;
        Ok(())
    }

    /// 在超时内等待任意一个按钮出现，返回第一个匹配的元素
    async fn first_present<S: Screen>(
        &self,
        screen: &S,
        candidates: &[Locator],
    ) -> Result<Option<Element>> {
        let present = wait_until(
            screen,
            Condition::AnyPresent(candidates),
            self.timings.force_stop_wait_ms,
            self.timings.poll_ms,
        )
        .await?;
        if !present {
            return Ok(None);
        }

        for locator in candidates {
            if let Some(element) = screen.find(locator).await?.into_iter().next() {
                return Ok(Some(element));
            }
        }
        Ok(None)
    }

    /// 等待首页稳定标记，期间遇到"点击刷新页面"就点
    async fn wait_baseline<S: Screen>(&self, screen: &S) -> Result<bool> {
        for poll in 0..self.baseline_polls {
            if screen.exists(&self.ad_close).await? || screen.exists(&self.baseline).await? {
                info!("  首页已就绪 (等待 {} 次)", poll);
                return Ok(true);
            }
            screen.idle(self.timings.baseline_poll_ms).await;

            if let Some(refresh) = screen.find(&self.refresh).await?.into_iter().next() {
                info!("  点击刷新页面");
                screen.click(&refresh).await?;
            }
        }
        Ok(screen.exists(&self.ad_close).await? || screen.exists(&self.baseline).await?)
    }

    /// 尽力导航到课程 → 单元 → 题号，每一步失败只记录
    pub async fn renavigate<S: Screen>(&self, screen: &S, target: &PagePosition) {
        info!("恢复到: {}", target);

        if let Err(e) = self.search_click(screen, &target.course).await {
            warn!("导航课程失败: {:#}", e);
        }
        self.settle(screen).await;

        if let Some(unit) = target.unit.as_deref().filter(|u| !u.is_empty()) {
            if let Err(e) = self.search_click(screen, unit).await {
                warn!("导航章节失败: {:#}", e);
            }
            self.settle(screen).await;
        }

        let Some(number) = target.numerator() else {
            warn!("导航题号失败: 无法解析题号 {}", target.question_number);
            return;
        };
        info!("恢复到题号: {}", number);
        screen.idle(self.timings.relaunch_idle_ms).await;

        let result = match screen.exists(&self.list_item).await {
            Ok(true) => self.locator.locate(screen, number).await.map(|found| {
                if !found {
                    warn!("导航题号失败: 列表中未找到 {}", number);
                }
            }),
            Ok(false) => self.search_click(screen, &number.to_string()).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("导航题号失败: {:#}", e);
        }
        screen.idle(self.timings.relaunch_idle_ms).await;
    }

    async fn settle<S: Screen>(&self, screen: &S) {
        screen.idle(self.timings.action_idle_ms).await;
        if let Err(e) = self.overlay.dismiss(screen).await {
            warn!("关闭弹层失败: {:#}", e);
        }
    }

    /// 屏幕范围内第一个包含该文本的元素
    async fn find_text<S: Screen>(&self, screen: &S, text: &str) -> Result<Option<Element>> {
        let found = screen.find(&Locator::text_contains(text)).await?;
        Ok(filter_in_scope(found, Scope::Global, screen.width())
            .into_iter()
            .next())
    }

    /// 按文本搜索并点击：找不到就小幅滚动，贴底就往上调整
    async fn search_click<S: Screen>(&self, screen: &S, text: &str) -> Result<()> {
        let mut element = None;
        for _ in 0..=self.max_search_scrolls {
            element = self.find_text(screen, text).await?;
            if element.is_some() {
                break;
            }
            self.gestures.search_scroll.perform(screen).await?;
            screen.idle(self.timings.overlay_idle_ms).await;
        }
        let Some(element) = element else {
            return Err(CrawlError::transient(format!("文本 {}", text)).into());
        };

        let mut bounds = self.row_bounds(screen, &element).await?;
        let limit = screen.height() - self.safe_inset;
        for _ in 0..MAX_ADJUST_SCROLLS {
            if bounds.center_y() <= limit {
                break;
            }
            self.gestures.search_adjust.perform(screen).await?;
            screen.idle(self.timings.overlay_idle_ms).await;
            match self.find_text(screen, text).await? {
                Some(moved) => bounds = self.row_bounds(screen, &moved).await?,
                None => break,
            }
        }

        screen.idle(self.timings.action_idle_ms).await;
        // 点击所在行的左半部分
        screen.tap(bounds.center_x() / 2, bounds.center_y()).await
    }

    /// 文本所在行（父节点）的范围
    async fn row_bounds<S: Screen>(&self, screen: &S, element: &Element) -> Result<Bounds> {
        Ok(screen
            .parent(element)
            .await?
            .map(|p| p.bounds)
            .unwrap_or(element.bounds))
    }
}
