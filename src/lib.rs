//! # Question Crawler
//!
//! 通过无障碍接口驱动题库 App，逐题读取并保存为 JSON 文档
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 屏幕能力抽象，只暴露能力
//! - `Screen` / `AppControl` - 查找、点击、滑动、等待、启动
//! - `DeviceBridge` - 通过 HTTP 设备代理实现屏幕能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理当前这一屏
//! - `ViewportResolver` - 轮播中当前可见的内容容器
//! - `PageClassifier` - 判断当前界面类型
//! - `QuestionExtractor` - 读取位置和题目
//! - `validator` - 记录完整性校验
//! - `PositionLocator` - 在列表页定位题号
//! - `RecoveryController` - 重启 App 并导航回原位置
//! - `JsonRecordWriter` / `SkipWriter` - 写文件能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义整个爬取的状态迁移
//! - `CrawlState` - 位置、计数等上下文
//! - `CrawlFlow` - 状态机
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/crawler_app` - 管理设备连接和生命周期
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

#[cfg(test)]
mod testing;

// 重新导出常用类型
pub use config::Config;
pub use error::CrawlError;
pub use infrastructure::{DeviceBridge, Screen};
pub use models::{PagePosition, QuestionDocument, QuestionRecord};
pub use orchestrator::{crawl, App};
pub use workflow::{CrawlFlow, CrawlState, CrawlSummary, FinishReason};
