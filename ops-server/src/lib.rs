//! Restaurant operations backend
//!
//! # 架构概述
//!
//! 三个核心子系统共享同一数据模型和执行环境：
//!
//! - **视觉流水线** (`pipeline`): 每摄像头一个 worker，抓帧 → 裁剪 →
//!   分类器派发（重试、背压、幂等去重），预测驱动桌台状态机
//! - **派桌路由** (`routing`): 公平性优先的 (桌台, 服务员) 评分选择
//! - **排班引擎** (`scheduling`): 需求预测 + 公平评估 + 约束校验的
//!   score-and-rank 周排班
//!
//! # Module structure
//!
//! ```text
//! ops-server/src/
//! ├── core/        # 配置、状态、后台任务、HTTP 服务
//! ├── utils/       # 日志、时间、校验工具
//! ├── db/          # SQLite 存储层 (State Store)
//! ├── tables/      # 桌台状态机
//! ├── pipeline/    # 摄像头流水线 (C3-C6)
//! ├── routing/     # 派桌路由 (C7)
//! ├── scheduling/  # 排班引擎 (C8-C11)
//! ├── analytics/   # 指标汇总 (C12) 与 tier 计算
//! └── api/         # 薄 HTTP 门面
//! ```

pub mod analytics;
pub mod api;
pub mod core;
pub mod db;
pub mod pipeline;
pub mod routing;
pub mod scheduling;
pub mod tables;
pub mod utils;

// Re-export public types
pub use crate::core::{Config, Server, ServerState};
pub use crate::utils::logger::{init_logger, init_logger_with_file};

// Re-export the unified error types from shared
pub use shared::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
