//! Handlers for the run-job queue.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use wavelength_core::error::CoreError;
use wavelength_core::types::DbId;
use wavelength_db::models::run_job::RunJob;
use wavelength_db::models::status::JobStatus;
use wavelength_pipeline::queue::{ClaimOutcome, EnqueueRequest, IdleReason, ProcessOutcome};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Enqueue
// ---------------------------------------------------------------------------

/// Request body for `POST /run-jobs`.
#[derive(Debug, Deserialize)]
pub struct EnqueueInput {
    pub order_id: DbId,
    pub project_id: DbId,
    pub requested_by: Option<String>,
}

/// POST /api/v1/run-jobs
///
/// Queue a run for an order. Returns 201 with the new job, or 200 with the
/// existing job when one is already queued or running for the order.
pub async fn enqueue(
    State(state): State<AppState>,
    Json(input): Json<EnqueueInput>,
) -> AppResult<impl IntoResponse> {
    let outcome = state
        .services
        .queue
        .enqueue(EnqueueRequest {
            order_id: input.order_id,
            project_id: input.project_id,
            requested_by: input.requested_by,
        })
        .await?;

    let status = if outcome.already_active {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(DataResponse { data: outcome })))
}

// ---------------------------------------------------------------------------
// Process next
// ---------------------------------------------------------------------------

/// Result of one `process-next` call.
#[derive(Debug, Serialize)]
pub struct ProcessNextResult {
    pub processed: bool,
    /// Why nothing was processed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<IdleReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<DbId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ProcessOutcome> for ProcessNextResult {
    fn from(outcome: ProcessOutcome) -> Self {
        match outcome {
            ProcessOutcome::Idle(reason) => Self {
                processed: false,
                reason: Some(reason),
                job_id: None,
                status: None,
                error: None,
            },
            ProcessOutcome::Processed { job_id, status, error } => Self {
                processed: true,
                reason: None,
                job_id: Some(job_id),
                status: Some(status),
                error,
            },
        }
    }
}

/// POST /api/v1/run-jobs/process-next
///
/// Claim the oldest queued job and drive it to a terminal state. A failed
/// run is still a 200; the job status says how it ended.
///
/// The drive runs on [`AppState::runs`], so a request that times out or is
/// dropped by the client leaves the job to finish in the background.
pub async fn process_next(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let outcome = match state.services.queue.claim_next().await? {
        ClaimOutcome::Claimed(job) => {
            let queue = state.services.queue.clone();
            let job_id = job.id;
            let handle = state.runs.spawn(async move { queue.drive(&job).await });
            handle.await.map_err(|e| {
                AppError::InternalError(format!("Run job {job_id} task failed: {e}"))
            })??
        }
        ClaimOutcome::NoQueuedJobs => ProcessOutcome::Idle(IdleReason::NoQueuedJobs),
        ClaimOutcome::ClaimLost => ProcessOutcome::Idle(IdleReason::ClaimLost),
    };
    Ok(Json(DataResponse {
        data: ProcessNextResult::from(outcome),
    }))
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// A job row with its status name resolved.
#[derive(Debug, Serialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: RunJob,
    pub status: Option<JobStatus>,
}

/// GET /api/v1/run-jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .services
        .queue
        .find_job(id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Run job", id })?;

    let status = job.status();
    Ok(Json(DataResponse {
        data: JobView { job, status },
    }))
}
