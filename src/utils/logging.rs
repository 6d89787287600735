/// 日志工具模块
///
/// 提供日志初始化、运行日志文件以及格式化输出的辅助函数
use std::fs;
use std::io;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, Dispatch};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, AppResult};

/// `init` 时确定的过滤规则，运行日志沿用同一规则
static FILTER_DIRECTIVE: OnceLock<String> = OnceLock::new();

fn default_directive(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    // lopdf 对每个缺少编码的字体都会报 warn
    format!("{}={},lopdf=error,warn", env!("CARGO_CRATE_NAME"), level)
}

fn build_filter() -> EnvFilter {
    let directive = FILTER_DIRECTIVE
        .get()
        .cloned()
        .unwrap_or_else(|| default_directive(false));
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(default_directive(false)))
}

/// 初始化全局日志（仅控制台）
///
/// # 参数
/// - `verbose`: 为 true 时输出 debug 级别，否则遵循 `RUST_LOG`（默认 info）
pub fn init(verbose: bool) {
    let directive = match std::env::var("RUST_LOG") {
        Ok(env) if !verbose && !env.trim().is_empty() => env,
        _ => default_directive(verbose),
    };
    let _ = FILTER_DIRECTIVE.set(directive);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .without_time()
        .compact()
        .with_writer(io::stderr);

    let _ = tracing_subscriber::registry()
        .with(build_filter())
        .with(console_layer)
        .try_init();
}

/// 创建单次运行的日志分发器：控制台 + 该运行目录下的日志文件
///
/// 分发器只对挂载它的 future 生效（`WithSubscriber::with_subscriber`），
/// 同时进行的多个运行各写各的文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
/// - `title`: 写在文件头部的标题（文件已存在时不再写入）
pub fn run_dispatch(log_file_path: &Path, title: &str) -> AppResult<Dispatch> {
    if !log_file_path.exists() {
        let log_header = format!(
            "{}\n{} - {}\n{}\n\n",
            "=".repeat(60),
            title,
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            "=".repeat(60)
        );
        fs::write(log_file_path, log_header).map_err(|e| AppError::io(log_file_path, e))?;
    }

    let dir = log_file_path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = log_file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .map_err(|e| AppError::io(log_file_path, io::Error::other(e)))?;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .without_time()
        .compact()
        .with_writer(io::stderr);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(file_appender);

    let subscriber = tracing_subscriber::registry()
        .with(build_filter())
        .with(console_layer)
        .with(file_layer);
    Ok(Dispatch::new(subscriber))
}

/// 记录程序启动信息
///
/// # 参数
/// - `command`: 子命令名称
/// - `backend`: 模型描述（live / mock）
pub fn log_startup(command: &str, backend: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - {}", command);
    info!("🤖 模型: {}", backend);
    info!("{}", "=".repeat(60));
}

/// 记录生成运行开始信息
///
/// # 参数
/// - `run_id`: 运行ID
/// - `total_pages`: PDF 页数
/// - `total_chunks`: 分块数量
/// - `questions_per_partition`: 每块题目数
pub fn log_run_start(
    run_id: &str,
    total_pages: usize,
    total_chunks: usize,
    questions_per_partition: usize,
) {
    info!("\n{}", "=".repeat(60));
    info!("📦 运行 {}", run_id);
    info!(
        "📄 共 {} 页，切分为 {} 块，预计生成 {} 道题目",
        total_pages,
        total_chunks,
        total_chunks * questions_per_partition
    );
    info!("{}", "=".repeat(60));
}

/// 打印生成完成统计
///
/// # 参数
/// - `run_id`: 运行ID
/// - `total_questions`: 题目总数
/// - `run_dir`: 运行目录
pub fn print_generation_stats(run_id: &str, total_questions: usize, run_dir: &Path) {
    info!("\n{}", "=".repeat(60));
    info!("📊 生成完成");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 运行: {}", run_id);
    info!("📝 题目: {}", total_questions);
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", run_dir.display());
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
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
    fn test_truncate_text() {
        assert_eq!(truncate_text("细胞呼吸", 2), "细胞...");
        assert_eq!(truncate_text("short", 10), "short");
    }

    #[test]
    fn test_run_dispatch_writes_header_once_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");

        let first = run_dispatch(&path, "测试日志").unwrap();
        tracing::dispatcher::with_default(&first, || info!("line one"));
        drop(first);
        let second = run_dispatch(&path, "测试日志").unwrap();
        tracing::dispatcher::with_default(&second, || info!("line two"));
        drop(second);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(&"=".repeat(60)));
        assert_eq!(content.matches("测试日志").count(), 1);
        let one = content.find("line one").unwrap();
        let two = content.find("line two").unwrap();
        assert!(one < two);
    }

    #[test]
    fn test_separate_runs_do_not_share_log_files() {
        let dir = tempfile::tempdir().unwrap();
        let a_path = dir.path().join("a.log");
        let b_path = dir.path().join("b.log");
        let a = run_dispatch(&a_path, "A").unwrap();
        let b = run_dispatch(&b_path, "B").unwrap();

        tracing::dispatcher::with_default(&a, || info!("from run a"));
        tracing::dispatcher::with_default(&b, || info!("from run b"));
        drop((a, b));

        let a_log = fs::read_to_string(&a_path).unwrap();
        let b_log = fs::read_to_string(&b_path).unwrap();
        assert!(a_log.contains("from run a") && !a_log.contains("from run b"));
        assert!(b_log.contains("from run b") && !b_log.contains("from run a"));
    }

    #[test]
    fn test_default_directive_quiets_lopdf() {
        assert_eq!(default_directive(false), "mcq_forge=info,lopdf=error,warn");
        assert_eq!(default_directive(true), "mcq_forge=debug,lopdf=error,warn");
    }
}
