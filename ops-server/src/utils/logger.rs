//! Logging infrastructure
//!
//! Structured logging setup for development and production environments.

use std::path::Path;

/// Initialize the logger with defaults (info level, stdout)
pub fn init_logger() {
    init_logger_with_file("info", false, None);
}

/// Initialize the logger with optional daily-rolling file output
pub fn init_logger_with_file(log_level: &str, json: bool, log_dir: Option<&str>) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    if let Some(dir) = log_dir {
        let log_path = Path::new(dir);
        if !log_path.exists() {
            let _ = std::fs::create_dir_all(log_path);
        }
        let file_appender = tracing_appender::rolling::daily(dir, "ops-server");
        if json {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(file_appender)
                .json()
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(file_appender)
                .with_ansi(false)
                .init();
        }
        return;
    }

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}
