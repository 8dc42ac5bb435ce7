//! HTTP server runner

use shared::AppError;
use tokio_util::sync::CancellationToken;

use crate::api;
use crate::core::{Config, ServerState};

/// HTTP server wrapping the thin API façade
pub struct Server {
    config: Config,
    state: ServerState,
}

impl Server {
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self { config, state }
    }

    /// Serve until the shutdown token fires
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), AppError> {
        let app = api::build_app(self.state.clone());
        let addr = format!("0.0.0.0:{}", self.config.http_port);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

        tracing::info!("HTTP server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| AppError::internal(format!("HTTP server error: {e}")))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
