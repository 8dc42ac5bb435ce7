//! 后台任务管理
//!
//! 统一管理后台任务的注册、启动和优雅关闭。
//!
//! # 任务类型
//!
//! - [`TaskKind::Warmup`] - 启动预热任务（运行一次）
//! - [`TaskKind::Worker`] - 长期后台工作者（摄像头 supervisor 等）
//! - [`TaskKind::Periodic`] - 定时任务（tier 重算等）

use std::fmt;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// 启动预热任务（运行一次）
    Warmup,
    /// 长期后台工作者
    Worker,
    /// 定时任务
    Periodic,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Warmup => write!(f, "Warmup"),
            TaskKind::Worker => write!(f, "Worker"),
            TaskKind::Periodic => write!(f, "Periodic"),
        }
    }
}

struct RegisteredTask {
    name: &'static str,
    kind: TaskKind,
    handle: JoinHandle<()>,
}

/// 后台任务管理器
///
/// 持有全局取消令牌；`shutdown()` 先发出取消信号，再在超时内等待每个
/// 任务退出，超时后强制 abort。
pub struct BackgroundTasks {
    tasks: Vec<RegisteredTask>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// 获取取消令牌（任务内部监听 shutdown 信号）
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 注册并启动一个后台任务
    pub fn spawn<F>(&mut self, name: &'static str, kind: TaskKind, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        tracing::debug!(task = %name, kind = %kind, "Registered background task");
        self.tasks.push(RegisteredTask { name, kind, handle });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// 打印任务摘要
    pub fn log_summary(&self) {
        let worker = self.tasks.iter().filter(|t| t.kind == TaskKind::Worker).count();
        let periodic = self.tasks.iter().filter(|t| t.kind == TaskKind::Periodic).count();
        let warmup = self.tasks.iter().filter(|t| t.kind == TaskKind::Warmup).count();
        tracing::info!(
            "Background tasks registered: {} total (Worker: {}, Periodic: {}, Warmup: {})",
            self.tasks.len(),
            worker,
            periodic,
            warmup
        );
    }

    /// 优雅关闭：发出取消信号，等待任务在超时内自行退出
    ///
    /// 任务应在下一个安全点（tick 之间或在途请求返回后）退出；
    /// 超过期限仍未退出的任务被 abort。
    pub async fn shutdown(self, timeout: Duration) {
        tracing::info!("Shutting down {} background task(s)", self.tasks.len());
        self.shutdown.cancel();

        for task in self.tasks {
            let abort = task.handle.abort_handle();
            match tokio::time::timeout(timeout, task.handle).await {
                Ok(Ok(())) => {
                    tracing::debug!(task = %task.name, "Background task exited cleanly");
                }
                Ok(Err(e)) if e.is_panic() => {
                    tracing::error!(task = %task.name, "Background task panicked during shutdown");
                }
                Ok(Err(_)) => {}
                Err(_) => {
                    tracing::warn!(
                        task = %task.name,
                        timeout_ms = timeout.as_millis() as u64,
                        "Background task did not stop in time, aborting"
                    );
                    abort.abort();
                }
            }
        }
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tasks_exit_on_cancellation() {
        let mut tasks = BackgroundTasks::new();
        let token = tasks.shutdown_token();
        tasks.spawn("test_worker", TaskKind::Worker, async move {
            token.cancelled().await;
        });
        assert_eq!(tasks.len(), 1);
        tasks.shutdown(Duration::from_secs(1)).await;
    }
}
