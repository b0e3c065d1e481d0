//! 弹层关闭服务 - 业务能力层
//!
//! 只负责"关掉广告/弹窗"能力，不关心当前处于哪个流程阶段

use anyhow::Result;
use tracing::info;

use crate::infrastructure::screen::{Locator, Screen};
use crate::models::selectors::Selectors;

pub struct OverlayService {
    /// 按优先级排列的关闭按钮
    closers: Vec<Locator>,
    idle_ms: u64,
}

impl OverlayService {
    pub fn new(selectors: &Selectors, idle_ms: u64) -> Self {
        let mut closers = vec![Locator::id(selectors.ad_close_id.as_str())];
        closers.extend(Selectors::by_texts(&selectors.ad_close_texts));
        Self { closers, idle_ms }
    }

    /// 关闭一个弹层，返回是否关闭了什么
    pub async fn dismiss<S: Screen>(&self, screen: &S) -> Result<bool> {
        for locator in &self.closers {
            let Some(button) = screen.find(locator).await?.into_iter().next() else {
                continue;
            };
            info!("  关闭弹层 ({})", locator);
            screen.click(&button).await?;
            screen.idle(self.idle_ms).await;
            return Ok(true);
        }
        Ok(false)
    }

    /// 连续关闭，直到没有弹层或达到次数上限
    pub async fn dismiss_all<S: Screen>(&self, screen: &S, max_rounds: usize) -> Result<usize> {
        let mut closed = 0;
        while closed < max_rounds && self.dismiss(screen).await? {
            closed += 1;
        }
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::screen::Bounds;
    use crate::testing::{FakeScreen, Node};

    #[tokio::test]
    async fn test_dismiss_clicks_close_then_skip() {
        let screen = FakeScreen::new(1200, 2670, |state| {
            let mut nodes = Vec::new();
            if !state.has("ad-closed") {
                nodes.push(Node::new("ad", "com.yikaobang.yixue:id/close", Bounds::new(1000, 100, 1100, 200)));
            }
            if !state.has("splash-skipped") {
                nodes.push(Node::new("skip", "android:id/button", Bounds::new(900, 100, 1100, 200)).text("跳过"));
            }
            nodes
        })
        .on_click(|state, node| {
            match node.handle.as_str() {
                "ad" => state.set("ad-closed"),
                "skip" => state.set("splash-skipped"),
                _ => return false,
            }
            true
        });
        let overlay = OverlayService::new(&Selectors::default(), 500);

        let closed = overlay.dismiss_all(&screen, 5).await.unwrap();

        assert_eq!(closed, 2);
        let state = screen.state();
        assert_eq!(state.clicks, vec!["ad", "skip"]);
        assert_eq!(state.idle_ms, 1000);
        assert!(!overlay.dismiss(&screen).await.unwrap());
    }
}
