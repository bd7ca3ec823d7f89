use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use wavelength_core::error::CoreError;
use wavelength_db::store::StoreError;
use wavelength_pipeline::PipelineError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`PipelineError`] and [`CoreError`] and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON error
/// responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `wavelength_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An error surfaced by the pipeline services.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

type Classified = (StatusCode, &'static str, String);

fn internal(err: &dyn std::fmt::Display, what: &str) -> Classified {
    tracing::error!(error = %err, "{what}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core(core: &CoreError) -> Classified {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Internal(msg) => internal(msg, "Internal core error"),
    }
}

/// Store errors: missing rows map to 404, unique violations to 409, the
/// rest to a sanitized 500.
fn classify_store(err: &StoreError) -> Classified {
    match err {
        StoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        StoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        StoreError::Database(sqlx::Error::RowNotFound) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        other => internal(other, "Store error"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core(core),

            AppError::Pipeline(err) => match err {
                PipelineError::Core(core) => classify_core(core),
                PipelineError::Store(store) => classify_store(store),
                other => internal(other, "Pipeline error"),
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg, "Internal error"),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
