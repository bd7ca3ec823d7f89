use axum::routing::{get, post};
use axum::Router;

use crate::handlers::pipeline_runs;
use crate::state::AppState;

/// Routes mounted under `/pipeline-runs`.
///
/// ```text
/// GET    /health          -> health
/// GET    /{id}/events     -> timeline
/// POST   /{id}/resume     -> resume
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(pipeline_runs::health))
        .route("/{id}/events", get(pipeline_runs::timeline))
        .route("/{id}/resume", post(pipeline_runs::resume))
}
