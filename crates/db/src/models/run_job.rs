//! Run job rows: one durable unit of orchestration work per order.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use wavelength_core::types::{DbId, Timestamp};

use super::status::{JobStatus, StatusId};

/// A row from the `run_jobs` table. Rows are never deleted.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RunJob {
    pub id: DbId,
    pub order_id: DbId,
    pub project_id: DbId,
    pub status_id: StatusId,
    pub attempts: i32,
    pub requested_by: String,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl RunJob {
    pub fn status(&self) -> Option<JobStatus> {
        JobStatus::from_id(self.status_id)
    }
}

/// DTO for inserting a queued job.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRunJob {
    pub order_id: DbId,
    pub project_id: DbId,
    pub requested_by: String,
}
