//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责资源和生命周期，是整个系统的"指挥中心"。
//!
//! ### `crawler_app` - 爬取应用
//! - 管理应用生命周期（初始化、运行、统计）
//! - 持有设备连接（DeviceBridge）
//! - 按配置从已保存的文档恢复位置
//!
//! ## 层次关系
//!
//! ```text
//! crawler_app (持有 DeviceBridge)
//!     ↓
//! workflow::CrawlFlow (状态机)
//!     ↓
//! services (能力层：分类 / 提取 / 校验 / 定位 / 重置 / 保存)
//!     ↓
//! infrastructure (基础设施：Screen / wait)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：只有编排层持有设备连接
//! 2. **向下依赖**：编排层 → workflow → services → infrastructure
//! 3. **无业务逻辑**：只做调度和统计，不做页面判断

pub mod crawler_app;

pub use crawler_app::{crawl, initial_state, App};
