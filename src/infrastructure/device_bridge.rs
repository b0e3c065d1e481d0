//! 设备桥 - 基础设施层
//!
//! 持有唯一的设备连接，通过设备端无障碍代理的 HTTP JSON 接口
//! 暴露 `Screen` 和 `AppControl` 能力。
//!
//! 职责：
//! - 不认识题目、章节
//! - 不处理业务流程
//! - 只负责把调用翻译成桥接请求

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::infrastructure::screen::{AppControl, Element, Locator, Screen};

/// 设备信息
#[derive(Debug, Clone, Deserialize)]
struct DeviceInfo {
    width: i32,
    height: i32,
}

/// 点击类接口的返回
#[derive(Debug, Clone, Deserialize)]
struct AckResponse {
    #[serde(default)]
    ok: bool,
}

#[derive(Debug, Serialize)]
struct FindRequest<'a> {
    #[serde(flatten)]
    locator: &'a Locator,
}

/// 设备桥
pub struct DeviceBridge {
    client: Client,
    base_url: String,
    width: i32,
    height: i32,
}

impl DeviceBridge {
    /// 连接设备端代理并读取屏幕尺寸
    ///
    /// # 参数
    /// - `base_url`: 代理地址，如 `http://127.0.0.1:9008`
    /// - `request_timeout_ms`: 单次请求超时
    pub async fn connect(base_url: &str, request_timeout_ms: u64) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        info!("正在连接设备代理: {}", base_url);

        let client = Client::builder()
            .timeout(Duration::from_millis(request_timeout_ms))
            .build()
            .context("创建 HTTP 客户端失败")?;

        let info: DeviceInfo = client
            .get(format!("{}/info", base_url))
            .send()
            .await
            .map_err(|e| {
                error!("连接设备代理失败: {}", e);
                e
            })?
            .error_for_status()?
            .json()
            .await
            .context("无法解析设备信息")?;

        info!("✓ 设备已连接: {}x{}", info.width, info.height);

        Ok(Self {
            client,
            base_url,
            width: info.width,
            height: info.height,
        })
    }

    /// 调用代理接口并反序列化为指定类型
    async fn call<T: DeserializeOwned>(&self, path: &str, body: JsonValue) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("设备请求: {} {}", url, body);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("设备请求失败: {}", path))?
            .error_for_status()
            .with_context(|| format!("设备返回错误状态: {}", path))?;

        let value = response
            .json::<T>()
            .await
            .with_context(|| format!("无法解析设备响应: {}", path))?;
        Ok(value)
    }
}

impl Screen for DeviceBridge {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    async fn find(&self, locator: &Locator) -> Result<Vec<Element>> {
        let body = serde_json::to_value(FindRequest { locator })?;
        self.call("/find", body).await
    }

    async fn click(&self, element: &Element) -> Result<bool> {
        let ack: AckResponse = self
            .call("/click", json!({ "handle": element.handle }))
            .await?;
        Ok(ack.ok)
    }

    async fn tap(&self, x: i32, y: i32) -> Result<()> {
        let _: AckResponse = self.call("/tap", json!({ "x": x, "y": y })).await?;
        Ok(())
    }

    async fn parent(&self, element: &Element) -> Result<Option<Element>> {
        self.call("/parent", json!({ "handle": element.handle }))
            .await
    }

    async fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32, duration_ms: u64) -> Result<()> {
        let _: AckResponse = self
            .call(
                "/swipe",
                json!({ "x1": x1, "y1": y1, "x2": x2, "y2": y2, "duration": duration_ms }),
            )
            .await?;
        // 手势本身需要时间完成
        sleep(Duration::from_millis(duration_ms)).await;
        Ok(())
    }

    async fn idle(&self, ms: u64) {
        sleep(Duration::from_millis(ms)).await;
    }
}

impl AppControl for DeviceBridge {
    async fn launch(&self, app_name: &str) -> Result<()> {
        info!("启动: {}", app_name);
        let _: AckResponse = self
            .call("/app/launch", json!({ "name": app_name }))
            .await?;
        Ok(())
    }

    async fn open_settings(&self, package: &str) -> Result<()> {
        let _: AckResponse = self
            .call("/app/settings", json!({ "package": package }))
            .await?;
        Ok(())
    }
}
