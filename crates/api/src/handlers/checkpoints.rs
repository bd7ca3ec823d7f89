use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ClearedCheckpoints {
    pub run_key: String,
    pub removed: u64,
}

/// DELETE /api/v1/checkpoints/{run_key}
///
/// Drop every checkpoint for `run_key` so the next run recomputes all
/// phases.
pub async fn clear(
    State(state): State<AppState>,
    Path(run_key): Path<String>,
) -> AppResult<impl IntoResponse> {
    if run_key.trim().is_empty() {
        return Err(AppError::BadRequest("run_key must not be blank".into()));
    }

    let removed = state.services.checkpoints.clear(&run_key).await?;
    Ok(Json(DataResponse {
        data: ClearedCheckpoints { run_key, removed },
    }))
}
