use axum::routing::{get, post};
use axum::Router;

use crate::handlers::run_jobs;
use crate::state::AppState;

/// Routes mounted under `/run-jobs`.
///
/// ```text
/// POST   /                -> enqueue
/// POST   /process-next    -> process_next
/// GET    /{id}            -> get_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(run_jobs::enqueue))
        .route("/process-next", post(run_jobs::process_next))
        .route("/{id}", get(run_jobs::get_job))
}
