//! Classifier dispatcher
//!
//! Ships table crops to the external classifier and feeds predictions into
//! the table state machine. Guarantees:
//!
//! - **In-flight cap** per camera (default 4): submissions over the cap are
//!   dropped with a backpressure warning, never queued
//! - **Idempotent dedupe** on `(camera, json_table_id, frame_index)`:
//!   duplicates short-circuit to success without touching the wire
//! - **Retry** up to 3 attempts with exponential backoff (1s, 2s, 4s) for
//!   timeouts, connect errors, 5xx and 429; 401/403 surface as auth errors
//!   without retry; other 4xx are permanent
//! - **Per-attempt timeout** (default 30s)
//!
//! Dispatch log rows walk `queued → dispatched → succeeded | failed`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use shared::models::Prediction;
use shared::{AppError, AppResult};
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::core::Config;
use crate::db::repository::dispatch_log::{self, AppendOutcome};
use crate::pipeline::crop::TableCrop;
use crate::tables::service::TableStateService;
use crate::tables::state_machine::Provenance;

/// Dispatcher knobs, extracted from the config snapshot
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub max_in_flight_per_camera: usize,
    pub max_attempts: u32,
    /// Base backoff; doubles per attempt
    pub backoff: Duration,
    pub attempt_timeout: Duration,
}

impl DispatcherConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_in_flight_per_camera: config.max_in_flight_per_camera.max(1),
            max_attempts: config.dispatch_max_attempts.max(1),
            backoff: Duration::from_secs_f64(config.dispatch_backoff_seconds.max(0.0)),
            attempt_timeout: Duration::from_secs(config.classifier_timeout_seconds),
        }
    }
}

/// Wire-level classifier failure
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("classifier returned HTTP {0}")]
    Status(u16),

    #[error("response decode failed: {0}")]
    Decode(String),
}

impl TransportError {
    /// Transient per the retry policy: timeouts, connect errors, 5xx, 429
    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect(_) => true,
            Self::Status(code) => *code >= 500 || *code == 429,
            Self::Decode(_) => false,
        }
    }

    fn is_auth(&self) -> bool {
        matches!(self, Self::Status(401) | Self::Status(403))
    }
}

/// One crop on its way to the classifier
#[derive(Debug, Clone)]
pub struct CropSubmission {
    pub camera_id: String,
    pub restaurant_id: String,
    pub frame_index: i64,
    pub frame_timestamp: i64,
    pub video_name: Option<String>,
    pub crop: TableCrop,
    /// json-table-id → physical table id, from the camera's installed map
    pub table_map: Arc<HashMap<String, String>>,
}

/// What happened to a submission at the door
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Claimed the dedupe key; a dispatch task is running
    Accepted,
    /// Key already present: short-circuit success, no network call
    Duplicate,
    /// Camera is at its in-flight cap: dropped, no retry
    Backpressure,
}

/// The wire seam — tests plug a stub here
#[async_trait]
pub trait ClassifierTransport: Send + Sync {
    async fn classify(
        &self,
        submission: &CropSubmission,
        timeout: Duration,
    ) -> Result<Prediction, TransportError>;
}

/// Production transport: multipart POST to the classifier endpoint
pub struct HttpClassifierTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpClassifierTransport {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl ClassifierTransport for HttpClassifierTransport {
    async fn classify(
        &self,
        submission: &CropSubmission,
        timeout: Duration,
    ) -> Result<Prediction, TransportError> {
        let mime = match submission.crop.format {
            image::ImageFormat::Jpeg => "image/jpeg",
            image::ImageFormat::Png => "image/png",
            image::ImageFormat::WebP => "image/webp",
            _ => "application/octet-stream",
        };
        let filename = format!(
            "{}_{}_{}.crop",
            submission.camera_id, submission.crop.json_table_id, submission.frame_index
        );

        let file_part = reqwest::multipart::Part::bytes(submission.crop.bytes.clone())
            .file_name(filename)
            .mime_str(mime)
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("camera_id", submission.camera_id.clone())
            .text("table_id", submission.crop.json_table_id.clone())
            .text("frame_index", submission.frame_index.to_string())
            .text("video_name", submission.video_name.clone().unwrap_or_default());

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Connect(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        response
            .json::<Prediction>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// The dispatcher proper
pub struct ClassifierDispatcher {
    runner: DispatchRunner,
    /// camera_id → in-flight permit pool
    semaphores: Mutex<HashMap<String, Arc<Semaphore>>>,
    tracker: TaskTracker,
}

/// The per-dispatch worker half: cheap to clone into spawned tasks
#[derive(Clone)]
struct DispatchRunner {
    pool: SqlitePool,
    config: DispatcherConfig,
    transport: Arc<dyn ClassifierTransport>,
    tables: TableStateService,
    shutdown: CancellationToken,
}

impl ClassifierDispatcher {
    pub fn new(
        pool: SqlitePool,
        config: DispatcherConfig,
        transport: Arc<dyn ClassifierTransport>,
    ) -> Self {
        Self {
            runner: DispatchRunner {
                tables: TableStateService::new(pool.clone()),
                pool,
                config,
                transport,
                shutdown: CancellationToken::new(),
            },
            semaphores: Mutex::new(HashMap::new()),
            tracker: TaskTracker::new(),
        }
    }

    fn camera_semaphore(&self, camera_id: &str) -> Arc<Semaphore> {
        let mut map = self.semaphores.lock().expect("semaphore lock poisoned");
        map.entry(camera_id.to_string())
            .or_insert_with(|| {
                Arc::new(Semaphore::new(self.runner.config.max_in_flight_per_camera))
            })
            .clone()
    }

    /// Submit one crop. Non-blocking: returns as soon as the submission is
    /// claimed, dropped, or short-circuited.
    pub async fn submit(&self, submission: CropSubmission) -> AppResult<SubmitOutcome> {
        let semaphore = self.camera_semaphore(&submission.camera_id);
        let permit = match semaphore.try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!(
                    camera_id = %submission.camera_id,
                    json_table_id = %submission.crop.json_table_id,
                    frame_index = submission.frame_index,
                    cap = self.runner.config.max_in_flight_per_camera,
                    "Backpressure: camera at in-flight cap, dropping crop"
                );
                return Ok(SubmitOutcome::Backpressure);
            }
        };

        let outcome = dispatch_log::try_append(
            &self.runner.pool,
            &submission.camera_id,
            &submission.crop.json_table_id,
            submission.frame_index,
        )
        .await
        .map_err(AppError::from)?;

        let log_id = match outcome {
            AppendOutcome::Duplicate => {
                tracing::debug!(
                    camera_id = %submission.camera_id,
                    json_table_id = %submission.crop.json_table_id,
                    frame_index = submission.frame_index,
                    "Duplicate crop dispatch, short-circuiting"
                );
                return Ok(SubmitOutcome::Duplicate);
            }
            AppendOutcome::Inserted(id) => id,
        };

        let runner = self.runner.clone();
        self.tracker.spawn(async move {
            let _permit = permit;
            runner.run_dispatch(log_id, submission).await;
        });

        Ok(SubmitOutcome::Accepted)
    }

    /// Stop accepting retries and wait for in-flight dispatches to finish
    /// or time out. No forced termination of running attempts.
    pub async fn drain(&self) {
        self.runner.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl DispatchRunner {
    /// Full dispatch lifecycle for one claimed crop
    async fn run_dispatch(&self, log_id: i64, submission: CropSubmission) {
        let mut attempt: u32 = 0;
        let mut last_error = String::new();

        while attempt < self.config.max_attempts {
            attempt += 1;
            if attempt == 1 {
                if let Err(e) = dispatch_log::mark_dispatched(&self.pool, log_id, 1).await {
                    tracing::warn!(log_id, error = %e, "Failed to mark dispatch row");
                }
            }

            match self
                .transport
                .classify(&submission, self.config.attempt_timeout)
                .await
            {
                Ok(prediction) => {
                    if let Err(e) =
                        dispatch_log::mark_succeeded(&self.pool, log_id, attempt as i64).await
                    {
                        tracing::warn!(log_id, error = %e, "Failed to mark dispatch success");
                    }
                    self.handle_prediction(&submission, prediction).await;
                    return;
                }
                Err(e) if e.is_auth() => {
                    // Dropped silently for state purposes, counted for observability
                    tracing::warn!(
                        camera_id = %submission.camera_id,
                        frame_index = submission.frame_index,
                        error = %e,
                        "Classifier auth error, dropping prediction"
                    );
                    let _ = dispatch_log::mark_failed(
                        &self.pool,
                        log_id,
                        attempt as i64,
                        &format!("auth: {e}"),
                    )
                    .await;
                    return;
                }
                Err(e) if !e.is_retryable() => {
                    tracing::warn!(
                        camera_id = %submission.camera_id,
                        frame_index = submission.frame_index,
                        error = %e,
                        "Permanent classifier error"
                    );
                    let _ = dispatch_log::mark_failed(&self.pool, log_id, attempt as i64, &e.to_string())
                        .await;
                    return;
                }
                Err(e) => {
                    last_error = e.to_string();
                    tracing::debug!(
                        camera_id = %submission.camera_id,
                        frame_index = submission.frame_index,
                        attempt,
                        error = %last_error,
                        "Transient classifier error"
                    );
                }
            }

            if attempt < self.config.max_attempts {
                // 1s, 2s, 4s with the default base
                let backoff = self.config.backoff.mul_f64(f64::powi(2.0, attempt as i32 - 1));
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = self.shutdown.cancelled() => {
                        // Shutdown: the in-flight attempt finished; don't start another
                        let _ = dispatch_log::mark_failed(
                            &self.pool,
                            log_id,
                            attempt as i64,
                            "shutdown before retry",
                        )
                        .await;
                        return;
                    }
                }
            }
        }

        tracing::warn!(
            camera_id = %submission.camera_id,
            json_table_id = %submission.crop.json_table_id,
            frame_index = submission.frame_index,
            attempts = attempt,
            error = %last_error,
            "Crop dispatch failed after retries"
        );
        let _ = dispatch_log::mark_failed(&self.pool, log_id, attempt as i64, &last_error).await;
    }

    /// Map the prediction onto a physical table and drive the state machine
    async fn handle_prediction(&self, submission: &CropSubmission, prediction: Prediction) {
        let Some(table_id) = submission.table_map.get(&submission.crop.json_table_id) else {
            tracing::warn!(
                camera_id = %submission.camera_id,
                json_table_id = %submission.crop.json_table_id,
                "Unmapped table, dropping prediction"
            );
            return;
        };

        let provenance = Provenance::Ml {
            confidence: prediction.confidence,
            model_id: prediction.model_id.clone(),
        };

        match self
            .tables
            .apply(table_id, prediction.label, provenance, None)
            .await
        {
            Ok(outcome) => {
                tracing::debug!(
                    table_id = %table_id,
                    label = %prediction.label,
                    confidence = prediction.confidence,
                    ?outcome,
                    "Prediction applied"
                );
            }
            Err(e) if e.code == shared::ErrorCode::InvalidTransition => {
                // Stale or out-of-order prediction; the state machine is the
                // arbiter and rejection is normal here
                tracing::debug!(
                    table_id = %table_id,
                    label = %prediction.label,
                    "Prediction rejected by state machine"
                );
            }
            Err(e) => {
                tracing::warn!(table_id = %table_id, error = %e, "Failed to apply prediction");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;
    use shared::models::{DiningTableCreate, TableLocation, TableState, TableType};
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::db::repository::{camera, restaurant, table};
    use crate::db::DbService;

    struct StubTransport {
        calls: AtomicU32,
        /// Errors to serve before succeeding; None entries mean success
        script: Mutex<Vec<Option<TransportError>>>,
        prediction: Prediction,
    }

    impl StubTransport {
        fn ok(label: TableState, confidence: f64) -> Self {
            Self {
                calls: AtomicU32::new(0),
                script: Mutex::new(Vec::new()),
                prediction: Prediction { label, confidence, model_id: Some("stub".into()) },
            }
        }

        fn failing(errors: Vec<TransportError>) -> Self {
            Self {
                calls: AtomicU32::new(0),
                script: Mutex::new(errors.into_iter().map(Some).collect()),
                prediction: Prediction {
                    label: TableState::Occupied,
                    confidence: 0.9,
                    model_id: None,
                },
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ClassifierTransport for StubTransport {
        async fn classify(
            &self,
            _submission: &CropSubmission,
            _timeout: Duration,
        ) -> Result<Prediction, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Ok(self.prediction.clone());
            }
            match script.remove(0) {
                Some(err) => Err(err),
                None => Ok(self.prediction.clone()),
            }
        }
    }

    fn test_dispatcher_config() -> DispatcherConfig {
        DispatcherConfig {
            max_in_flight_per_camera: 4,
            max_attempts: 3,
            backoff: Duration::from_millis(0),
            attempt_timeout: Duration::from_secs(1),
        }
    }

    async fn setup(transport: Arc<dyn ClassifierTransport>) -> (SqlitePool, Arc<ClassifierDispatcher>, String, String) {
        let db = DbService::new_in_memory().await.unwrap();
        let r = restaurant::create(&db.pool, "Test", "UTC", None).await.unwrap();
        let t = table::create(
            &db.pool,
            &r.id,
            DiningTableCreate {
                section_id: None,
                table_number: 1,
                capacity: 4,
                table_type: TableType::Table,
                location: TableLocation::Inside,
            },
        )
        .await
        .unwrap();
        camera::register(&db.pool, "cam-1", &r.id, "file:///frames/cam1.jpg").await.unwrap();

        let dispatcher = Arc::new(ClassifierDispatcher::new(
            db.pool.clone(),
            test_dispatcher_config(),
            transport,
        ));
        (db.pool, dispatcher, r.id, t.id)
    }

    fn submission(restaurant_id: &str, table_id: &str, frame_index: i64) -> CropSubmission {
        let mut map = HashMap::new();
        map.insert("T0".to_string(), table_id.to_string());
        CropSubmission {
            camera_id: "cam-1".into(),
            restaurant_id: restaurant_id.into(),
            frame_index,
            frame_timestamp: shared::util::now_millis(),
            video_name: None,
            crop: TableCrop {
                json_table_id: "T0".into(),
                bytes: vec![0xFF, 0xD8, 0xFF],
                width: 64,
                height: 64,
                format: ImageFormat::Jpeg,
            },
            table_map: Arc::new(map),
        }
    }

    #[tokio::test]
    async fn successful_dispatch_updates_table_state() {
        let transport = Arc::new(StubTransport::ok(TableState::Occupied, 0.93));
        let (pool, dispatcher, r, t) = setup(transport.clone()).await;

        let outcome = dispatcher.submit(submission(&r, &t, 42)).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Accepted);
        dispatcher.drain().await;

        assert_eq!(transport.call_count(), 1);
        let row = dispatch_log::find_by_key(&pool, "cam-1", "T0", 42).await.unwrap().unwrap();
        assert_eq!(row.status, shared::models::DispatchStatus::Succeeded);
        assert_eq!(row.attempts, 1);

        let updated = table::get(&pool, &t).await.unwrap();
        assert_eq!(updated.state, TableState::Occupied);
        assert_eq!(updated.state_confidence, Some(0.93));
    }

    #[tokio::test]
    async fn duplicate_frame_short_circuits_without_network() {
        let transport = Arc::new(StubTransport::ok(TableState::Occupied, 0.9));
        let (pool, dispatcher, r, t) = setup(transport.clone()).await;

        let first = dispatcher.submit(submission(&r, &t, 42)).await.unwrap();
        dispatcher.drain().await;
        assert_eq!(first, SubmitOutcome::Accepted);

        // Same (camera, json_table_id, frame_index) again
        let dispatcher2 = Arc::new(ClassifierDispatcher::new(
            pool.clone(),
            test_dispatcher_config(),
            transport.clone(),
        ));
        let second = dispatcher2.submit(submission(&r, &t, 42)).await.unwrap();
        assert_eq!(second, SubmitOutcome::Duplicate);
        dispatcher2.drain().await;

        // Exactly one network call ever happened
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn retries_then_gives_up_on_repeated_503() {
        let transport = Arc::new(StubTransport::failing(vec![
            TransportError::Status(503),
            TransportError::Status(503),
            TransportError::Status(503),
        ]));
        let (pool, dispatcher, r, t) = setup(transport.clone()).await;

        dispatcher.submit(submission(&r, &t, 7)).await.unwrap();
        dispatcher.drain().await;

        assert_eq!(transport.call_count(), 3);
        let row = dispatch_log::find_by_key(&pool, "cam-1", "T0", 7).await.unwrap().unwrap();
        assert_eq!(row.status, shared::models::DispatchStatus::Failed);
        assert_eq!(row.attempts, 3);

        // No table state change on failure
        let updated = table::get(&pool, &t).await.unwrap();
        assert_eq!(updated.state, TableState::Clean);
    }

    #[tokio::test]
    async fn auth_errors_do_not_retry() {
        let transport = Arc::new(StubTransport::failing(vec![TransportError::Status(401)]));
        let (pool, dispatcher, r, t) = setup(transport.clone()).await;

        dispatcher.submit(submission(&r, &t, 8)).await.unwrap();
        dispatcher.drain().await;

        assert_eq!(transport.call_count(), 1);
        let row = dispatch_log::find_by_key(&pool, "cam-1", "T0", 8).await.unwrap().unwrap();
        assert_eq!(row.status, shared::models::DispatchStatus::Failed);
        assert!(row.last_error.unwrap().starts_with("auth"));
    }

    #[tokio::test]
    async fn transient_error_then_success_recovers() {
        let transport = Arc::new(StubTransport {
            calls: AtomicU32::new(0),
            script: Mutex::new(vec![Some(TransportError::Timeout), None]),
            prediction: Prediction {
                label: TableState::Occupied,
                confidence: 0.8,
                model_id: None,
            },
        });
        let (pool, dispatcher, r, t) = setup(transport.clone()).await;

        dispatcher.submit(submission(&r, &t, 9)).await.unwrap();
        dispatcher.drain().await;

        assert_eq!(transport.call_count(), 2);
        let row = dispatch_log::find_by_key(&pool, "cam-1", "T0", 9).await.unwrap().unwrap();
        assert_eq!(row.status, shared::models::DispatchStatus::Succeeded);
        assert_eq!(row.attempts, 2);
    }

    #[tokio::test]
    async fn backpressure_drops_over_cap_submissions() {
        let transport = Arc::new(StubTransport::ok(TableState::Occupied, 0.9));
        let (_pool, dispatcher, r, t) = setup(transport).await;

        // Exhaust the per-camera permits without letting tasks run
        let semaphore = dispatcher.camera_semaphore("cam-1");
        let _held: Vec<_> = (0..4).map(|_| semaphore.clone().try_acquire_owned().unwrap()).collect();

        let outcome = dispatcher.submit(submission(&r, &t, 10)).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Backpressure);

        // Dropped before the dedupe insert: the key is still free
        let row = dispatch_log::find_by_key(&dispatcher.runner.pool, "cam-1", "T0", 10).await.unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn unmapped_table_succeeds_but_drops_prediction() {
        let transport = Arc::new(StubTransport::ok(TableState::Occupied, 0.9));
        let (pool, dispatcher, r, t) = setup(transport).await;

        let mut sub = submission(&r, &t, 11);
        sub.table_map = Arc::new(HashMap::new());
        dispatcher.submit(sub).await.unwrap();
        dispatcher.drain().await;

        let row = dispatch_log::find_by_key(&pool, "cam-1", "T0", 11).await.unwrap().unwrap();
        assert_eq!(row.status, shared::models::DispatchStatus::Succeeded);
        let updated = table::get(&pool, &t).await.unwrap();
        assert_eq!(updated.state, TableState::Clean);
    }
}
