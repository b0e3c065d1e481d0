//! 爬取应用 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责资源和生命周期。
//!
//! 1. **应用初始化**：打印启动信息、创建输出目录、连接设备代理
//! 2. **断点恢复**：按配置从输出目录里最新的文档恢复位置
//! 3. **启动爬取**：启动 App，交给 `CrawlFlow` 运行状态机
//! 4. **全局统计**：输出结束原因和计数
//!
//! 只有这里持有 `DeviceBridge`，下层只通过 `Screen` 能力访问屏幕。

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::config::Config;
use crate::infrastructure::screen::{AppControl, Screen};
use crate::infrastructure::DeviceBridge;
use crate::models::loaders::latest_document;
use crate::services::record_writer::{JsonRecordWriter, RecordSink};
use crate::services::skip_writer::SkipWriter;
use crate::utils::logging::{log_startup, print_final_stats};
use crate::workflow::{CrawlFlow, CrawlState, CrawlSummary};

/// 应用主结构
pub struct App {
    config: Config,
    bridge: DeviceBridge,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        tokio::fs::create_dir_all(&config.output_dir)
            .await
            .with_context(|| format!("无法创建输出目录: {}", config.output_dir))?;

        let bridge = DeviceBridge::connect(&config.device_url, config.request_timeout_ms).await?;
        info!("✓ 已连接设备，屏幕 {}x{}", bridge.width(), bridge.height());

        Ok(Self { config, bridge })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<CrawlSummary> {
        let sink = JsonRecordWriter::new(&self.config.output_dir, &self.config.app_package);
        info!("📁 文档保存到: {}", sink.output_dir().display());
        let state = initial_state(&self.config).await?;
        crawl(&self.config, &self.bridge, &sink, state).await
    }
}

/// 起始状态：开启恢复时取输出目录中最新的文档
pub async fn initial_state(config: &Config) -> Result<CrawlState> {
    if !config.resume_from_output {
        return Ok(CrawlState::new());
    }

    info!("\n📁 正在扫描已保存的题目...");
    match latest_document(Path::new(&config.output_dir)).await? {
        Some((path, document)) => {
            info!("✓ 最新记录: {} ({})", path.display(), document.record.position());
            Ok(CrawlState::resume_from(&document, path.to_string_lossy()))
        }
        None => {
            info!("没有已保存的题目，从当前页面开始");
            Ok(CrawlState::new())
        }
    }
}

/// 启动 App 并运行到结束，结束时输出统计
pub async fn crawl<S, K>(config: &Config, screen: &S, sink: &K, mut state: CrawlState) -> Result<CrawlSummary>
where
    S: Screen + AppControl,
    K: RecordSink,
{
    let flow = CrawlFlow::new(config, sink)?.with_skip_writer(SkipWriter::with_path(config.skip_file.clone()));
    flow.startup(screen, &state).await?;

    match flow.run(screen, &mut state).await {
        Ok(summary) => {
            print_final_stats(
                &summary.finish.to_string(),
                summary.saved,
                summary.skipped,
                summary.resets,
                summary.rounds,
            );
            Ok(summary)
        }
        Err(e) => {
            error!("❌ 爬取中止: {:#}", e);
            print_final_stats("无法恢复", state.saved_count, state.skipped_count, state.resets, 0);
            Err(e)
        }
    }
}
