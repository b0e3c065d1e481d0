//! 条件等待原语
//!
//! 用"等到某元素出现/消失（有超时）"替代散落各处的固定时长等待。
//! 轮询之间调用 `Screen::idle`，因此不会出现无界自旋。

use std::future::Future;

use anyhow::Result;

use crate::infrastructure::screen::{Locator, Screen};

/// 等待条件
#[derive(Debug, Clone, Copy)]
pub enum Condition<'a> {
    Present(&'a Locator),
    Absent(&'a Locator),
    /// 任意一个出现即可
    AnyPresent(&'a [Locator]),
}

impl Condition<'_> {
    async fn holds<S: Screen>(&self, screen: &S) -> Result<bool> {
        match self {
            Condition::Present(locator) => screen.exists(locator).await,
            Condition::Absent(locator) => Ok(!screen.exists(locator).await?),
            Condition::AnyPresent(locators) => {
                for locator in locators.iter() {
                    if screen.exists(locator).await? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

/// 轮询直到条件成立或超时，返回条件最终是否成立
///
/// 最多检查 `timeout_ms / poll_ms + 1` 次，首次检查不等待。
pub async fn wait_until<S: Screen>(
    screen: &S,
    condition: Condition<'_>,
    timeout_ms: u64,
    poll_ms: u64,
) -> Result<bool> {
    poll_until(screen, timeout_ms, poll_ms, || condition.holds(screen)).await
}

/// 与 `wait_until` 相同的轮询节奏，但条件由调用方给出
///
/// 用于"按屏幕范围过滤后是否可见"这类不能直接用定位条件表达的判断。
pub async fn poll_until<S, F, Fut>(
    screen: &S,
    timeout_ms: u64,
    poll_ms: u64,
    mut check: F,
) -> Result<bool>
where
    S: Screen,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let poll_ms = poll_ms.max(1);
    let polls = timeout_ms / poll_ms;

    for attempt in 0..=polls {
        if check().await? {
            return Ok(true);
        }
        if attempt < polls {
            screen.idle(poll_ms).await;
        }
    }
    Ok(false)
}
