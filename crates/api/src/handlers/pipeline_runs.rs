//! Handlers for run health, timelines and manual resume.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use wavelength_core::model_profile::ModelProfile;
use wavelength_core::types::DbId;
use wavelength_pipeline::tracker::{ResumeAccepted, ResumeRequest};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for `GET /pipeline-runs/health`.
#[derive(Debug, Deserialize)]
pub struct HealthParams {
    /// Lookback window, clamped to 1..=168 (default 24).
    pub hours: Option<i64>,
}

/// GET /api/v1/pipeline-runs/health
pub async fn health(
    State(state): State<AppState>,
    Query(params): Query<HealthParams>,
) -> AppResult<impl IntoResponse> {
    let report = state.services.tracker.health(params.hours).await?;
    Ok(Json(DataResponse { data: report }))
}

/// Query parameters for `GET /pipeline-runs/{id}/events`.
#[derive(Debug, Deserialize)]
pub struct TimelineParams {
    pub limit: Option<i64>,
}

/// GET /api/v1/pipeline-runs/{id}/events
///
/// The run's events, oldest first, including project events logged before
/// the run row existed.
pub async fn timeline(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
    Query(params): Query<TimelineParams>,
) -> AppResult<impl IntoResponse> {
    let events = state.services.tracker.timeline(run_id, params.limit).await?;
    Ok(Json(DataResponse { data: events }))
}

/// Optional request body for `POST /pipeline-runs/{id}/resume`.
#[derive(Debug, Default, Deserialize)]
pub struct ResumeInput {
    pub model: Option<String>,
    pub model_profile: Option<ModelProfile>,
}

/// POST /api/v1/pipeline-runs/{id}/resume
///
/// Re-drive a run's project from its checkpoints in the background.
/// Responds 202 once the resume has started, 404 for an unknown run or
/// project, and 409 while the project is already researching.
pub async fn resume(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let input: ResumeInput = if body.iter().all(u8::is_ascii_whitespace) {
        ResumeInput::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(format!("Invalid resume body: {e}")))?
    };

    let started = state
        .services
        .tracker
        .resume(
            run_id,
            ResumeRequest {
                override_model: input.model,
                override_profile: input.model_profile,
            },
            state.services.orchestrator.clone(),
        )
        .await?;

    tracing::info!(
        run_id = started.run_id,
        project_id = started.project_id,
        model = %started.model,
        "Manual resume started",
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: ResumeAccepted::from(&started),
        }),
    ))
}
