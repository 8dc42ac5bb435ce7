//! Classifier webhook — inbound batch predictions
//!
//! Alternative path to the pull pipeline: the classifier POSTs a batch of
//! table states. Every prediction still passes through the table state
//! machine; rejected or unmapped predictions are dropped but counted.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use shared::models::TableState;
use shared::{AppResult, ErrorCode};

use crate::core::ServerState;
use crate::tables::service::{ApplyOutcome, TableStateService};
use crate::tables::state_machine::Provenance;
use crate::utils::validation::validate_confidence;

pub fn router() -> Router<ServerState> {
    Router::new().route("/ml/table-state", post(ingest_table_states))
}

#[derive(Debug, Deserialize)]
struct TablePrediction {
    table_id: String,
    predicted_state: TableState,
    state_confidence: f64,
    #[serde(default)]
    person_count: Option<i64>,
    #[serde(default)]
    #[allow(dead_code)]
    person_count_confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    restaurant_id: String,
    #[serde(default)]
    #[allow(dead_code)]
    timestamp: Option<i64>,
    tables: Vec<TablePrediction>,
}

#[derive(Debug, Default, Serialize)]
struct WebhookSummary {
    applied: usize,
    refreshed: usize,
    ignored: usize,
    rejected: usize,
    dropped: usize,
}

/// POST /ml/table-state
async fn ingest_table_states(
    State(state): State<ServerState>,
    Json(payload): Json<WebhookPayload>,
) -> AppResult<Json<WebhookSummary>> {
    let service = TableStateService::new(state.pool.clone());
    let mut summary = WebhookSummary::default();

    for prediction in payload.tables {
        if validate_confidence(prediction.state_confidence).is_err() {
            summary.dropped += 1;
            continue;
        }

        let provenance = Provenance::Ml {
            confidence: prediction.state_confidence,
            model_id: None,
        };
        match service
            .apply(
                &prediction.table_id,
                prediction.predicted_state,
                provenance,
                prediction.person_count,
            )
            .await
        {
            Ok(ApplyOutcome::Applied { .. }) => summary.applied += 1,
            Ok(ApplyOutcome::ConfidenceRefreshed) => summary.refreshed += 1,
            Ok(ApplyOutcome::Ignored) => summary.ignored += 1,
            Err(e) if e.code == ErrorCode::InvalidTransition => summary.rejected += 1,
            Err(e) if e.code == ErrorCode::NotFound => {
                tracing::warn!(
                    restaurant_id = %payload.restaurant_id,
                    table_id = %prediction.table_id,
                    "Webhook prediction for unknown table, dropping"
                );
                summary.dropped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(Json(summary))
}
