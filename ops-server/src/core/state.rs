//! 服务器状态 — 持有所有共享服务的引用
//!
//! `ServerState` 是请求处理器和后台任务共享的核心结构；
//! 浅拷贝（内部 Arc），所有权成本极低。
//! State Store（连接池）是唯一的共享可变状态。

use std::sync::Arc;

use shared::AppError;
use sqlx::SqlitePool;
use tokio::sync::Notify;

use crate::core::Config;
use crate::db::DbService;
use crate::pipeline::dispatcher::{ClassifierDispatcher, DispatcherConfig, HttpClassifierTransport};
use crate::scheduling::RunLocks;

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    /// 配置快照（不可变）
    pub config: Config,
    /// State Store 连接池
    pub pool: SqlitePool,
    /// 分类器派发器（在途上限、重试、去重）
    pub dispatcher: Arc<ClassifierDispatcher>,
    /// 摄像头注册表变更通知（supervisor 重新加载 worker 列表）
    pub camera_notify: Arc<Notify>,
    /// 排班引擎的 (restaurant, week) 互斥锁
    pub run_locks: RunLocks,
}

impl ServerState {
    /// 初始化：打开数据库、装配派发器
    pub async fn initialize(config: &Config) -> Result<Self, AppError> {
        let db = DbService::new(&config.database_path).await?;
        Ok(Self::assemble(config.clone(), db.pool))
    }

    /// 测试初始化：内存数据库
    pub async fn initialize_in_memory(config: &Config) -> Result<Self, AppError> {
        let db = DbService::new_in_memory().await?;
        Ok(Self::assemble(config.clone(), db.pool))
    }

    fn assemble(config: Config, pool: SqlitePool) -> Self {
        let transport = Arc::new(HttpClassifierTransport::new(&config.classifier_endpoint));
        let dispatcher = Arc::new(ClassifierDispatcher::new(
            pool.clone(),
            DispatcherConfig::from_config(&config),
            transport,
        ));

        Self {
            config,
            pool,
            dispatcher,
            camera_notify: Arc::new(Notify::new()),
            run_locks: RunLocks::new(),
        }
    }

    /// 通知摄像头 supervisor 注册表已变更
    pub fn notify_camera_registry(&self) {
        self.camera_notify.notify_one();
    }

    /// Health check: the state store must answer a trivial query
    pub async fn store_healthy(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}
