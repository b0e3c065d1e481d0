use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::infrastructure::screen::Screen;
use crate::models::selectors::Selectors;

/// 一次滑动手势（坐标按 1200x2670 屏幕标定）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Swipe {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub duration_ms: u64,
}

impl Swipe {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32, duration_ms: u64) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            duration_ms,
        }
    }

    pub async fn perform<S: Screen>(&self, screen: &S) -> Result<()> {
        screen
            .swipe(self.x1, self.y1, self.x2, self.y2, self.duration_ms)
            .await
    }
}

/// 手势配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gestures {
    /// 翻到下一题
    pub advance: Swipe,
    /// 卡住时的强制翻页（更长更快）
    pub force_advance: Swipe,
    /// 切换子题 Tab 的兜底滑动
    pub tab_switch: Swipe,
    /// 详情页内容向下滚，触发懒加载
    pub pane_scroll_down: Swipe,
    pub pane_scroll_up: Swipe,
    /// 列表向小题号方向滚动
    pub list_scroll_up: Swipe,
    /// 列表向大题号方向滚动
    pub list_scroll_down: Swipe,
    /// 文本搜索时的短滚动
    pub search_scroll: Swipe,
    /// 目标贴近底部时的调整滚动
    pub search_adjust: Swipe,
}

impl Default for Gestures {
    fn default() -> Self {
        Self {
            advance: Swipe::new(1000, 600, 200, 600, 250),
            force_advance: Swipe::new(1050, 600, 100, 600, 150),
            tab_switch: Swipe::new(1000, 2200, 200, 2200, 150),
            pane_scroll_down: Swipe::new(600, 2000, 600, 1000, 400),
            pane_scroll_up: Swipe::new(600, 1000, 600, 2000, 400),
            list_scroll_up: Swipe::new(700, 1800, 700, 2200, 1000),
            list_scroll_down: Swipe::new(700, 2000, 700, 1500, 500),
            search_scroll: Swipe::new(700, 2000, 700, 1800, 500),
            search_adjust: Swipe::new(700, 2000, 700, 1600, 1000),
        }
    }
}

/// 等待与超时（毫秒）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub poll_ms: u64,
    /// 等待详情页题干出现
    pub page_wait_ms: u64,
    pub page_retry_wait_ms: u64,
    pub course_wait_ms: u64,
    /// 校验失败后重新提取前的等待
    pub retry_delay_ms: u64,
    /// 点击后让界面稳定
    pub action_idle_ms: u64,
    pub overlay_idle_ms: u64,
    pub advance_settle_ms: u64,
    pub tab_settle_ms: u64,
    pub scroll_settle_ms: u64,
    /// 点击题号后等待列表消失
    pub tap_verify_ms: u64,
    pub list_wait_ms: u64,
    pub popup_wait_ms: u64,
    /// 新章节没有加载标记时的固定等待
    pub transition_idle_ms: u64,
    /// 周期性返回列表页后释放内存的等待
    pub checkpoint_idle_ms: u64,
    pub force_stop_wait_ms: u64,
    pub relaunch_idle_ms: u64,
    pub startup_idle_ms: u64,
    pub baseline_poll_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_ms: 200,
            page_wait_ms: 5000,
            page_retry_wait_ms: 3000,
            course_wait_ms: 5000,
            retry_delay_ms: 2000,
            action_idle_ms: 1000,
            overlay_idle_ms: 500,
            advance_settle_ms: 300,
            tab_settle_ms: 200,
            scroll_settle_ms: 1500,
            tap_verify_ms: 3000,
            list_wait_ms: 10000,
            popup_wait_ms: 10000,
            transition_idle_ms: 10000,
            checkpoint_idle_ms: 8000,
            force_stop_wait_ms: 3000,
            relaunch_idle_ms: 3000,
            startup_idle_ms: 5000,
            baseline_poll_ms: 1000,
        }
    }
}

/// 版面常量
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    /// Tab 尚未渲染时共享题干的下边界
    pub tab_fallback_top: i32,
    /// Tab 尚未渲染时子题题干的上边界
    pub tab_fallback_bottom: i32,
    /// 列表可点击区域上下各收缩的像素
    pub safe_inset: i32,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            tab_fallback_top: 977,
            tab_fallback_bottom: 1107,
            safe_inset: 200,
        }
    }
}

/// 程序配置文件
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 被驱动 App 的名称（用于启动）
    pub app_name: String,
    /// 被驱动 App 的包名（用于设置页和文档）
    pub app_package: String,
    /// 设备代理地址
    pub device_url: String,
    pub request_timeout_ms: u64,
    /// 题目文档输出目录
    pub output_dir: String,
    /// 跳过记录文件
    pub skip_file: String,
    /// 启动时从输出目录中最新的文档恢复位置
    pub resume_from_output: bool,
    /// 主循环轮数上限
    pub max_iterations: usize,
    /// 每保存 N 题返回列表页一次
    pub checkpoint_interval: usize,
    /// 连续失败多少次触发重置
    pub max_failures: usize,
    /// 同一位置连续出现多少次视为卡住
    pub stall_threshold: usize,
    /// 两次成功保存之间最多允许的重置次数
    pub max_consecutive_resets: usize,
    /// 重启后等待首页的轮询次数
    pub baseline_polls: usize,
    /// 课程名读取重试次数
    pub course_retries: usize,
    /// 文本搜索时最多滚动次数
    pub max_search_scrolls: usize,
    pub timings: Timings,
    pub gestures: Gestures,
    pub layout: Layout,
    pub selectors: Selectors,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "医考帮".to_string(),
            app_package: "com.yikaobang.yixue".to_string(),
            device_url: "http://127.0.0.1:9008".to_string(),
            request_timeout_ms: 15000,
            output_dir: "output".to_string(),
            skip_file: "skipped.txt".to_string(),
            resume_from_output: false,
            max_iterations: 10000,
            checkpoint_interval: 250,
            max_failures: 5,
            stall_threshold: 3,
            max_consecutive_resets: 3,
            baseline_polls: 30,
            course_retries: 3,
            max_search_scrolls: 30,
            timings: Timings::default(),
            gestures: Gestures::default(),
            layout: Layout::default(),
            selectors: Selectors::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl Config {
    /// 默认配置叠加环境变量
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 读取 TOML 配置文件（`CRAWLER_CONFIG` 或当前目录下的 `crawler.toml`），
    /// 再叠加环境变量；文件不存在时使用默认配置
    pub fn load() -> Result<Self> {
        let path = std::env::var("CRAWLER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("crawler.toml"));

        let config = if path.exists() {
            Self::from_toml_file(&path)?
        } else {
            Self::default()
        };
        Ok(config.with_env_overrides())
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))
    }

    fn with_env_overrides(self) -> Self {
        Self {
            app_name: std::env::var("APP_NAME").unwrap_or(self.app_name),
            app_package: std::env::var("APP_PACKAGE").unwrap_or(self.app_package),
            device_url: std::env::var("DEVICE_URL").unwrap_or(self.device_url),
            request_timeout_ms: env_parse("REQUEST_TIMEOUT_MS").unwrap_or(self.request_timeout_ms),
            output_dir: std::env::var("OUTPUT_DIR").unwrap_or(self.output_dir),
            skip_file: std::env::var("SKIP_FILE").unwrap_or(self.skip_file),
            resume_from_output: env_parse("RESUME_FROM_OUTPUT").unwrap_or(self.resume_from_output),
            max_iterations: env_parse("MAX_ITERATIONS").unwrap_or(self.max_iterations),
            checkpoint_interval: env_parse("CHECKPOINT_INTERVAL").unwrap_or(self.checkpoint_interval),
            max_failures: env_parse("MAX_FAILURES").unwrap_or(self.max_failures),
            stall_threshold: env_parse("STALL_THRESHOLD").unwrap_or(self.stall_threshold),
            max_consecutive_resets: env_parse("MAX_CONSECUTIVE_RESETS").unwrap_or(self.max_consecutive_resets),
            ..self
        }
    }
}
