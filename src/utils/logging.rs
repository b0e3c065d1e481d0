/// 日志工具模块
///
/// 提供日志初始化和格式化输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化日志
///
/// 读取 `RUST_LOG`，未设置时为 `info`；重复调用时忽略
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 题库爬取模式");
    info!("📱 目标 App: {} ({})", config.app_name, config.app_package);
    info!("🔌 设备代理: {}", config.device_url);
    info!("📁 输出目录: {}", config.output_dir);
    info!(
        "♻️ 每 {} 题返回列表页，连续失败 {} 次重置",
        config.checkpoint_interval, config.max_failures
    );
    info!("{}", "=".repeat(60));
}

/// 记录每一轮的开头
///
/// # 参数
/// - `round`: 轮次（从 1 开始）
/// - `chapter`: 当前章节
/// - `saved`: 已保存数量
pub fn log_round(round: usize, chapter: &str, saved: usize) {
    info!(
        "\n{} 第 {} 轮 | {} | 已保存: {} {}",
        "-".repeat(10),
        round,
        chapter,
        saved,
        "-".repeat(10)
    );
}

/// 打印最终统计信息
///
/// # 参数
/// - `finish`: 结束原因
/// - `saved`: 保存数量
/// - `skipped`: 跳过数量
/// - `resets`: 重置次数
/// - `rounds`: 运行轮数
pub fn print_final_stats(finish: &str, saved: usize, skipped: usize, resets: usize, rounds: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 爬取结束统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("🏁 结束原因: {}", finish);
    info!("✅ 保存: {}", saved);
    info!("⏭️ 跳过: {}", skipped);
    info!("♻️ 重置: {}", resets);
    info!("🔁 轮数: {}", rounds);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("慢性支气管炎", 3), "慢性支...");
        assert_eq!(truncate_text("短", 3), "短");
    }
}
