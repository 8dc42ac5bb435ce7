//! Camera worker supervisor
//!
//! Owns the lifecycle of per-camera workers: spawns one task per registered
//! camera, reconciles against the registry when notified of changes, and
//! propagates pause/resume and shutdown. A worker failure is isolated to
//! its camera; the supervisor respawns on the next registry sync.

use std::collections::{HashMap, HashSet};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::ServerState;
use crate::db::repository::camera;
use crate::pipeline::worker::CameraWorker;

struct RunningWorker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Supervisor task driving all camera workers
pub struct CameraSupervisor {
    state: ServerState,
    shutdown: CancellationToken,
    pause_tx: watch::Sender<bool>,
    workers: HashMap<String, RunningWorker>,
}

impl CameraSupervisor {
    pub fn new(state: ServerState, shutdown: CancellationToken) -> Self {
        let (pause_tx, _) = watch::channel(false);
        Self {
            state,
            shutdown,
            pause_tx,
            workers: HashMap::new(),
        }
    }

    /// Handle for pausing/resuming every worker at once
    pub fn pause_handle(&self) -> watch::Sender<bool> {
        self.pause_tx.clone()
    }

    /// Main loop: initial sync, then react to registry notifications until
    /// shutdown. Workers exit between ticks; in-flight dispatches drain in
    /// the dispatcher, not here.
    pub async fn run(mut self) {
        tracing::info!("Camera supervisor started");
        let notify = self.state.camera_notify.clone();
        let shutdown = self.shutdown.clone();
        self.sync_workers().await;

        loop {
            tokio::select! {
                _ = notify.notified() => {
                    tracing::debug!("Camera registry changed, resyncing workers");
                    self.sync_workers().await;
                }
                _ = shutdown.cancelled() => break,
            }
        }

        tracing::info!("Camera supervisor stopping {} worker(s)", self.workers.len());
        for (camera_id, worker) in self.workers.drain() {
            worker.cancel.cancel();
            if worker.handle.await.is_err() {
                tracing::warn!(camera_id = %camera_id, "Camera worker panicked");
            }
        }
    }

    /// Reconcile running workers against the registry: start the missing,
    /// stop the removed, respawn the crashed.
    async fn sync_workers(&mut self) {
        let cameras = match camera::find_all(&self.state.pool).await {
            Ok(cameras) => cameras,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load camera registry");
                return;
            }
        };
        let registered: HashSet<String> =
            cameras.iter().map(|c| c.camera_id.clone()).collect();

        // Stop workers whose camera is gone
        let stale: Vec<String> = self
            .workers
            .keys()
            .filter(|id| !registered.contains(*id))
            .cloned()
            .collect();
        for camera_id in stale {
            if let Some(worker) = self.workers.remove(&camera_id) {
                tracing::info!(camera_id = %camera_id, "Stopping worker for removed camera");
                worker.cancel.cancel();
                let _ = worker.handle.await;
            }
        }

        // Reap finished/crashed workers so they respawn below
        self.workers.retain(|camera_id, worker| {
            if worker.handle.is_finished() {
                tracing::warn!(camera_id = %camera_id, "Camera worker exited, will respawn");
                false
            } else {
                true
            }
        });

        // Spawn the missing
        for camera_id in registered {
            if self.workers.contains_key(&camera_id) {
                continue;
            }
            let cancel = self.shutdown.child_token();
            let worker = CameraWorker::new(
                self.state.clone(),
                camera_id.clone(),
                cancel.clone(),
                self.pause_tx.subscribe(),
            );
            let handle = tokio::spawn(worker.run());
            self.workers.insert(camera_id, RunningWorker { cancel, handle });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::core::Config;
    use crate::db::repository::restaurant;

    #[tokio::test]
    async fn supervisor_spawns_and_stops_workers_per_registry() {
        let config = Config::for_tests();
        let state = ServerState::initialize_in_memory(&config).await.unwrap();
        let r = restaurant::create(&state.pool, "Test", "UTC", None).await.unwrap();
        camera::register(&state.pool, "cam-a", &r.id, "/frames/a.jpg").await.unwrap();
        camera::register(&state.pool, "cam-b", &r.id, "/frames/b.jpg").await.unwrap();

        let shutdown = CancellationToken::new();
        let supervisor = CameraSupervisor::new(state.clone(), shutdown.clone());
        let handle = tokio::spawn(supervisor.run());

        // Let the initial sync happen, then shut down between ticks
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("supervisor must stop promptly")
            .unwrap();
    }
}
