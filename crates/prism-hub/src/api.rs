//! # API Handlers
//!
//! Axum handlers for the host-facing surface: batched queries, health and
//! the schema resource.

use crate::health;
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use prism_core::{CheckHealthResult, DatasetFields, QueryDataRequest, QueryDataResponse};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Queries
// =============================================================================

/// The batch is cancelled when the client goes away (the handler future is
/// dropped) or when the configured deadline passes.
pub async fn query_data(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryDataRequest>,
) -> Json<QueryDataResponse> {
    let cancel = CancellationToken::new();
    let _disconnect = cancel.clone().drop_guard();
    spawn_deadline(cancel.clone(), state.config.dispatch.deadline());

    Json(state.dispatcher.query_data(request, cancel).await)
}

fn spawn_deadline(cancel: CancellationToken, deadline: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(deadline) => {
                tracing::warn!(?deadline, "query batch deadline reached, cancelling");
                cancel.cancel();
            }
            _ = cancel.cancelled() => {}
        }
    });
}

// =============================================================================
// Health
// =============================================================================

pub async fn check_health(State(state): State<Arc<AppState>>) -> Json<CheckHealthResult> {
    Json(health::check_health(state.engine.as_ref()).await)
}

// =============================================================================
// Resources
// =============================================================================

pub async fn schema_lookup(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DatasetFields>>, (StatusCode, String)> {
    match state.engine.dataset_fields().await {
        Ok(fields) => Ok(Json(fields)),
        Err(e) => {
            tracing::error!(error = %e, "error looking up schema");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
