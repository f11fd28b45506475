//! 日志工具模块
//!
//! 提供日志初始化和运行横幅的辅助函数
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::AppError;
use crate::orchestrator::RunReport;

/// 初始化全局日志订阅器
///
/// # 参数
/// - `verbose`: 未设置 `RUST_LOG` 时是否输出 debug 日志
///
/// 重复调用是安全的（测试中常见），第二次起不生效
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `config`: 程序配置（不输出密码和通知 token）
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 自动考勤模式");
    info!("👤 账号: {}", config.username);
    info!("📊 worker 数: {}", config.worker_count());
    info!(
        "⏱️ 限流: 每秒 {} 个请求, 突发 {}",
        config.rate_per_sec, config.rate_burst
    );
    if !config.current_periode.is_empty() {
        info!("📅 当前学期: {}", config.current_periode);
    }
    info!("🗓️ 工作日计划: {}", config.cron_weekday);
    info!("🗓️ 周末计划: {}", config.cron_weekend);
    if config.dry_run {
        warn!("🧪 演练模式：不会发出任何提交请求");
    }
    if !config.notifications_enabled() {
        info!("🔕 未配置通知地址，完成事件只写日志");
    }
    info!("{}", "=".repeat(60));
}

/// 记录条目发现信息
///
/// # 参数
/// - `total`: 条目总数
/// - `workers`: 并发 worker 数
/// - `dry_run`: 是否演练模式
pub fn log_items_discovered(total: usize, workers: usize, dry_run: bool) {
    info!("✓ 找到 {} 个考勤条目", total);
    info!("📋 最多同时处理 {} 个", workers);
    if dry_run {
        info!("💡 演练模式：取得表单后停止\n");
    }
}

/// 打印单次运行的统计信息
pub fn print_final_stats(report: &RunReport) {
    let stats = &report.stats;
    info!("\n{}", "=".repeat(60));
    info!("📊 本次运行统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("📚 课程: {}", report.courses);
    info!("✅ 已签到: {}/{}", stats.done, stats.total);
    info!("⏸️ 未显示已签到: {}", stats.not_done);
    if stats.dry_run > 0 {
        info!("🧪 演练: {}", stats.dry_run);
    }
    info!("❌ 失败: {}", stats.failed);
    info!("{}", "=".repeat(60));
}

/// 记录整次运行失败
///
/// 进程不会因此退出，只等待下一次触发
pub fn log_run_error(trigger: &str, err: &AppError) {
    if err.is_fatal() {
        error!("❌ 运行 ({}) 中止: {}", trigger, err);
    } else {
        warn!("⚠️ 运行 ({}) 失败: {}", trigger, err);
    }
}
