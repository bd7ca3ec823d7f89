//! Repository for the `run_jobs` table.
//!
//! Uses `JobStatus` from `models::status` for every status transition.

use sqlx::PgPool;
use wavelength_core::types::DbId;

use crate::models::run_job::{CreateRunJob, RunJob};
use crate::models::status::JobStatus;

/// Column list for `run_jobs` queries.
const COLUMNS: &str = "\
    id, order_id, project_id, status_id, attempts, requested_by, error_message, \
    created_at, started_at, completed_at, updated_at";

/// Provides queue operations on run jobs.
pub struct RunJobRepo;

impl RunJobRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<RunJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM run_jobs WHERE id = $1");
        sqlx::query_as::<_, RunJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Most recent queued or running job for an order, if any.
    pub async fn find_active_for_order(
        pool: &PgPool,
        order_id: DbId,
    ) -> Result<Option<RunJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM run_jobs \
             WHERE order_id = $1 AND status_id IN ($2, $3) \
             ORDER BY created_at DESC, id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, RunJob>(&query)
            .bind(order_id)
            .bind(JobStatus::Queued.id())
            .bind(JobStatus::Running.id())
            .fetch_optional(pool)
            .await
    }

    /// Insert a queued job.
    ///
    /// Fails with a unique violation on `uq_run_jobs_active_order` when the
    /// order already has an active job.
    pub async fn insert_queued(pool: &PgPool, input: &CreateRunJob) -> Result<RunJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO run_jobs (order_id, project_id, status_id, requested_by) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RunJob>(&query)
            .bind(input.order_id)
            .bind(input.project_id)
            .bind(JobStatus::Queued.id())
            .bind(&input.requested_by)
            .fetch_one(pool)
            .await
    }

    /// Oldest queued job by creation time, ties broken by id.
    pub async fn find_oldest_queued(pool: &PgPool) -> Result<Option<RunJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM run_jobs \
             WHERE status_id = $1 \
             ORDER BY created_at ASC, id ASC \
             LIMIT 1"
        );
        sqlx::query_as::<_, RunJob>(&query)
            .bind(JobStatus::Queued.id())
            .fetch_optional(pool)
            .await
    }

    /// Compare-and-swap claim: moves the job to running only if it is still
    /// queued. Returns `None` when another claimant got there first.
    pub async fn try_claim(pool: &PgPool, id: DbId) -> Result<Option<RunJob>, sqlx::Error> {
        let query = format!(
            "UPDATE run_jobs \
             SET status_id = $2, started_at = NOW(), attempts = attempts + 1 \
             WHERE id = $1 AND status_id = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RunJob>(&query)
            .bind(id)
            .bind(JobStatus::Running.id())
            .bind(JobStatus::Queued.id())
            .fetch_optional(pool)
            .await
    }

    /// Mark a job completed and clear any earlier error.
    pub async fn mark_completed(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE run_jobs \
             SET status_id = $2, completed_at = NOW(), error_message = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .bind(JobStatus::Completed.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a job failed with the captured error message.
    pub async fn mark_failed(pool: &PgPool, id: DbId, error: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE run_jobs \
             SET status_id = $2, completed_at = NOW(), error_message = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(JobStatus::Failed.id())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
