use axum::routing::delete;
use axum::Router;

use crate::handlers::checkpoints;
use crate::state::AppState;

/// Routes mounted under `/checkpoints`.
pub fn router() -> Router<AppState> {
    Router::new().route("/{run_key}", delete(checkpoints::clear))
}
