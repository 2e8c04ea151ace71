// SoundBuddy - 日志管理模块
// 提供异步非阻塞的日志持久化功能

use std::path::Path;
use std::fs;
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};
use crate::config::LogLevel;

/// 日志文件名前缀
const LOG_FILE_PREFIX: &str = "soundbuddy.log";

/// 日志保留天数
const LOG_RETENTION_DAYS: u64 = 7;

/// 初始化日志系统
///
/// 返回 WorkerGuard，必须在 main 函数中保持存活，否则异步日志线程会提前退出
pub fn init_logging(app_data_dir: &Path, log_level: &LogLevel) -> WorkerGuard {
    let log_dir = app_data_dir.join("logs");

    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("创建日志目录失败: {}", e);
    }

    let retention = Duration::from_secs(LOG_RETENTION_DAYS * 24 * 60 * 60);
    let removed = cleanup_old_logs(&log_dir, retention, SystemTime::now());

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    // hyper / reqwest 只记录 warn，减少 HTTP 库噪音
    let filter_string = format!("{},hyper=warn,reqwest=warn", log_level.as_str());
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&filter_string));

    let file_layer = fmt::layer()
        .with_writer(non_blocking_writer)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(true);

    // 控制台日志层 - 仅在 debug 模式下启用，输出到 stderr 以免污染 CLI 的 JSON 输出
    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    }

    if removed > 0 {
        tracing::info!("[LOGGING] 已清理 {} 个过期日志文件", removed);
    }

    guard
}

/// 清理超过保留期限的旧日志文件，返回删除的文件数
fn cleanup_old_logs(log_dir: &Path, retention: Duration, now: SystemTime) -> usize {
    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|name| name.starts_with(LOG_FILE_PREFIX))
            .unwrap_or(false);
        if !is_log {
            continue;
        }

        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => continue,
        };

        if let Ok(age) = now.duration_since(modified) {
            if age > retention {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => eprintln!("删除旧日志文件失败 {:?}: {}", path, e),
                }
            }
        }
    }
    removed
}
