//! HTTP route handlers for the status API.

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use serde::Deserialize;

use super::AppState;
use crate::runner::LoopSnapshot;
use crate::storage::Progress;

/// Upper bound on `/progress?limit=`
const MAX_LIMIT: usize = 500;

/// Build the status router.
pub fn status_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/progress", get(get_progress))
        .route("/state", get(get_state))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct ProgressQuery {
    limit: Option<usize>,
}

/// GET /progress - recent task records and counts by status.
async fn get_progress(
    State(state): State<AppState>,
    Query(query): Query<ProgressQuery>,
) -> Result<Json<Progress>, StatusCode> {
    let limit = query.limit.unwrap_or(state.recent_limit).min(MAX_LIMIT);
    state.reader.progress(limit).map(Json).map_err(|e| {
        tracing::error!(error = %e, "failed to read progress");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// GET /state - latest loop snapshot.
async fn get_state(State(state): State<AppState>) -> Result<Json<LoopSnapshot>, StatusCode> {
    let snapshot = state.snapshot.as_ref().ok_or(StatusCode::NOT_FOUND)?;
    let current = snapshot.borrow().clone();
    Ok(Json(current))
}
