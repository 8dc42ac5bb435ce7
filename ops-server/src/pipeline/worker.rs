//! 单摄像头采样循环
//!
//! 每 `CAPTURE_INTERVAL_SECONDS` 采一帧：抓帧 → 裁剪 → 派发。
//! 处理超时则跳过错过的 tick（不积压）；抓帧失败置 degraded 标记，
//! 不影响其他摄像头。关机信号在 tick 之间生效。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::core::ServerState;
use crate::db::repository::camera;
use crate::pipeline::crop::extract_crops;
use crate::pipeline::dispatcher::CropSubmission;
use crate::pipeline::frame_source::FrameSource;
use crate::pipeline::SubmitOutcome;

/// One long-running worker per registered camera
pub struct CameraWorker {
    state: ServerState,
    camera_id: String,
    shutdown: CancellationToken,
    paused: watch::Receiver<bool>,
    frames: FrameSource,
}

impl CameraWorker {
    pub fn new(
        state: ServerState,
        camera_id: String,
        shutdown: CancellationToken,
        paused: watch::Receiver<bool>,
    ) -> Self {
        Self {
            state,
            camera_id,
            shutdown,
            paused,
            frames: FrameSource::new(),
        }
    }

    /// Tick loop. Exits at the next safe point after cancellation.
    pub async fn run(self) {
        tracing::info!(camera_id = %self.camera_id, "Camera worker started");

        // Seed the frame counter so indices stay monotonic across restarts
        if let Ok(Some(cam)) = camera::find_by_id(&self.state.pool, &self.camera_id).await {
            self.frames
                .seed_counter(&self.camera_id, cam.last_frame_index.unwrap_or(0));
        }

        let interval = Duration::from_secs(self.state.config.capture_interval_seconds.max(1));
        let mut ticker = tokio::time::interval(interval);
        // Over-running a tick skips the missed ones instead of backlogging
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.shutdown.cancelled() => {
                    tracing::info!(camera_id = %self.camera_id, "Camera worker stopping");
                    return;
                }
            }

            if *self.paused.borrow() {
                continue;
            }

            self.process_tick().await;
        }
    }

    /// One capture cycle. Every failure is contained to this camera.
    async fn process_tick(&self) {
        let cam = match camera::find_by_id(&self.state.pool, &self.camera_id).await {
            Ok(Some(cam)) => cam,
            Ok(None) => {
                tracing::warn!(camera_id = %self.camera_id, "Camera vanished from registry");
                return;
            }
            Err(e) => {
                tracing::error!(camera_id = %self.camera_id, error = %e, "Failed to load camera");
                return;
            }
        };

        // Crop JSON (and its table map) is re-read every tick, so an install
        // invalidates whatever this worker held before
        let Some(crop_json) = cam.parsed_crop_json() else {
            tracing::debug!(camera_id = %self.camera_id, "No crop JSON installed, skipping tick");
            return;
        };
        let table_map = Arc::new(cam.parsed_table_map());

        let deadline = Duration::from_secs(self.state.config.video_source_timeout_seconds.max(1));
        let frame = match self
            .frames
            .fetch_frame(&self.camera_id, &cam.video_source, deadline)
            .await
        {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(
                    camera_id = %self.camera_id,
                    source = %cam.video_source,
                    error = %e,
                    "Frame fetch failed, camera degraded"
                );
                if let Err(db_err) = camera::set_degraded(&self.state.pool, &self.camera_id, true).await {
                    tracing::error!(camera_id = %self.camera_id, error = %db_err, "Failed to set degraded flag");
                }
                return;
            }
        };

        let (crops, warnings) = match extract_crops(&frame.bytes, frame.format, &crop_json) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(camera_id = %self.camera_id, error = %e, "Crop extraction failed");
                return;
            }
        };
        for warning in &warnings {
            tracing::warn!(
                camera_id = %self.camera_id,
                json_table_id = %warning.json_table_id,
                reason = warning.reason,
                "Skipping table crop"
            );
        }

        let mut accepted = 0usize;
        let mut dropped = 0usize;
        for crop in crops {
            let submission = CropSubmission {
                camera_id: self.camera_id.clone(),
                restaurant_id: cam.restaurant_id.clone(),
                frame_index: frame.frame_index,
                frame_timestamp: frame.captured_at,
                video_name: crop_json.video_name.clone(),
                crop,
                table_map: Arc::clone(&table_map),
            };
            // Non-blocking: the in-flight cap enforces backpressure
            match self.state.dispatcher.submit(submission).await {
                Ok(SubmitOutcome::Accepted) | Ok(SubmitOutcome::Duplicate) => accepted += 1,
                Ok(SubmitOutcome::Backpressure) => dropped += 1,
                Err(e) => {
                    tracing::error!(camera_id = %self.camera_id, error = %e, "Dispatch submit failed");
                }
            }
        }

        if let Err(e) = camera::update_capture_state(
            &self.state.pool,
            &self.camera_id,
            frame.captured_at,
            frame.frame_index,
        )
        .await
        {
            tracing::error!(camera_id = %self.camera_id, error = %e, "Failed to update capture state");
        }

        tracing::debug!(
            camera_id = %self.camera_id,
            frame_index = frame.frame_index,
            accepted,
            dropped,
            "Tick processed"
        );
    }
}
