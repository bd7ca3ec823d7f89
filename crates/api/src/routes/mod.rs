pub mod checkpoints;
pub mod health;
pub mod pipeline_runs;
pub mod run_jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /run-jobs                      enqueue (POST)
/// /run-jobs/process-next         claim and drive one job (POST)
/// /run-jobs/{id}                 job status (GET)
///
/// /pipeline-runs/health          health summary (GET, ?hours=)
/// /pipeline-runs/{id}/events     timeline (GET, ?limit=)
/// /pipeline-runs/{id}/resume     manual resume (POST)
///
/// /checkpoints/{run_key}         clear checkpoints (DELETE)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/run-jobs", run_jobs::router())
        .nest("/pipeline-runs", pipeline_runs::router())
        .nest("/checkpoints", checkpoints::router())
}
