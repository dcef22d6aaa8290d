use anyhow::{Context, Result};
/// 日志工具模块
///
/// 负责订阅器初始化以及日志格式化输出的辅助函数
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 初始化全局日志：控制台 + 操作日志文件
///
/// # 参数
/// - `log_file_path`: 操作日志文件路径（追加写入）
/// - `verbose`: 是否输出 debug 级别日志
pub fn init(log_file_path: &str, verbose: bool) -> Result<()> {
    init_log_file(log_file_path)?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .with_context(|| format!("无法打开日志文件: {}", log_file_path))?;

    let default_level = if verbose {
        "cross_post_importer=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("日志系统已初始化")?;
    Ok(())
}

/// 在日志文件中写入本次运行的分隔头
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    if let Some(parent) = Path::new(log_file_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let log_header = format!(
        "\n{}\n导入日志 - {}\n{}\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;
    file.write_all(log_header.as_bytes())?;
    Ok(())
}

/// 记录程序启动信息
///
/// # 参数
/// - `mode`: 运行模式
/// - `destinations`: 启用的目标平台
pub fn log_startup(mode: &str, destinations: &[String]) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - {}", mode);
    info!("🎯 目标平台: {}", destinations.join(", "));
    info!("{}", "=".repeat(60));
}

/// 记录订阅源加载信息
///
/// # 参数
/// - `total`: 订阅源条目总数
/// - `pending`: 需要处理的 (条目, 平台) 数量
pub fn log_feed_loaded(total: usize, pending: usize) {
    info!("✓ 订阅源共 {} 篇文章", total);
    info!("📋 待导入 {} 项，其余已在导入记录中", pending);
}

/// 记录目标平台开始处理
pub fn log_destination_start(destination: &str, pending: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理 {} ({} 项)", destination, pending);
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `imported`: 本次导入成功数量
/// - `skipped`: 因已导入而跳过的数量
/// - `failed`: 失败数量
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(imported: usize, skipped: usize, failed: usize, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 导入成功: {}", imported);
    info!("⏭️  已跳过: {}", skipped);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
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
