//! 服务配置 — 所有环境变量驱动的配置项
//!
//! # 环境变量
//!
//! | 环境变量 | 默认值 | 说明 |
//! |----------|--------|------|
//! | WORK_DIR | . | 工作目录（数据库、日志、裁剪文件） |
//! | HTTP_PORT | 8000 | HTTP API 端口 |
//! | DATABASE_PATH | {WORK_DIR}/ops.db | SQLite 数据库路径 |
//! | ENVIRONMENT | development | 运行环境 |
//! | CAPTURE_INTERVAL_SECONDS | 5 | 摄像头采样周期 |
//! | VIDEO_SOURCE_TIMEOUT_SECONDS | 5 | 抓帧超时 |
//! | MAX_IN_FLIGHT_PER_CAMERA | 4 | 单摄像头在途分类请求上限 |
//! | CLASSIFIER_ENDPOINT | http://localhost:8500/ml/predict | 分类器地址 |
//! | CLASSIFIER_TIMEOUT_SECONDS | 30 | 单次分类请求超时 |
//! | DISPATCH_MAX_ATTEMPTS | 3 | 派发重试上限 |
//! | DISPATCH_BACKOFF_SECONDS | 1.0 | 重试退避基数（指数） |
//! | CROPS_BASE_DIR | {WORK_DIR}/crops | 裁剪文件目录 |
//! | TIER_RECALC_INTERVAL_HOURS | 24 | tier 重算周期 |
//! | SHUTDOWN_TIMEOUT_MS | 10000 | 优雅关机等待 |

/// Immutable configuration snapshot, passed to every component at
/// construction. Hot reload happens only through a supervised restart.
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录
    pub work_dir: String,
    /// HTTP API 端口
    pub http_port: u16,
    /// SQLite 数据库路径
    pub database_path: String,
    /// development | staging | production
    pub environment: String,

    // === Camera pipeline ===
    /// 每 N 秒采样一帧；处理超时则跳过错过的 tick
    pub capture_interval_seconds: u64,
    /// 抓帧 I/O 截止时间
    pub video_source_timeout_seconds: u64,
    /// 单摄像头在途分类请求上限（背压）
    pub max_in_flight_per_camera: usize,
    /// 分类器 HTTP 端点
    pub classifier_endpoint: String,
    /// 单次分类请求超时
    pub classifier_timeout_seconds: u64,
    /// 派发重试次数上限
    pub dispatch_max_attempts: u32,
    /// 指数退避基数（秒）：1s, 2s, 4s
    pub dispatch_backoff_seconds: f64,
    /// 裁剪文件落盘目录
    pub crops_base_dir: String,

    // === Jobs ===
    /// tier 重算周期（小时）
    pub tier_recalc_interval_hours: u64,
    /// 关机时等待后台任务的时长（毫秒）
    pub shutdown_timeout_ms: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置；未设置的项使用默认值
    pub fn from_env() -> Self {
        let work_dir = std::env::var("WORK_DIR").unwrap_or_else(|_| ".".into());
        let database_path = std::env::var("DATABASE_PATH")
            .unwrap_or_else(|_| format!("{}/ops.db", work_dir.trim_end_matches('/')));
        let crops_base_dir = std::env::var("CROPS_BASE_DIR")
            .unwrap_or_else(|_| format!("{}/crops", work_dir.trim_end_matches('/')));

        Self {
            work_dir,
            http_port: env_or("HTTP_PORT", 8000),
            database_path,
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),

            capture_interval_seconds: env_or("CAPTURE_INTERVAL_SECONDS", 5),
            video_source_timeout_seconds: env_or("VIDEO_SOURCE_TIMEOUT_SECONDS", 5),
            max_in_flight_per_camera: env_or("MAX_IN_FLIGHT_PER_CAMERA", 4),
            classifier_endpoint: std::env::var("CLASSIFIER_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:8500/ml/predict".into()),
            classifier_timeout_seconds: env_or("CLASSIFIER_TIMEOUT_SECONDS", 30),
            dispatch_max_attempts: env_or("DISPATCH_MAX_ATTEMPTS", 3),
            dispatch_backoff_seconds: env_or("DISPATCH_BACKOFF_SECONDS", 1.0),
            crops_base_dir,

            tier_recalc_interval_hours: env_or("TIER_RECALC_INTERVAL_HOURS", 24),
            shutdown_timeout_ms: env_or("SHUTDOWN_TIMEOUT_MS", 10_000),
        }
    }

    /// 测试配置：内存数据库、短超时、本地端点
    pub fn for_tests() -> Self {
        Self {
            work_dir: ".".into(),
            http_port: 0,
            database_path: ":memory:".into(),
            environment: "test".into(),
            capture_interval_seconds: 1,
            video_source_timeout_seconds: 1,
            max_in_flight_per_camera: 4,
            classifier_endpoint: "http://localhost:8500/ml/predict".into(),
            classifier_timeout_seconds: 1,
            dispatch_max_attempts: 3,
            dispatch_backoff_seconds: 0.0,
            crops_base_dir: "./crops".into(),
            tier_recalc_interval_hours: 24,
            shutdown_timeout_ms: 1000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
