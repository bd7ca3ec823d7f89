//! Repository for the append-only `pipeline_run_events` table.

use sqlx::PgPool;
use wavelength_core::types::{DbId, Timestamp};

use crate::models::run_event::{CreateRunEvent, RunEvent};

/// Column list for `pipeline_run_events` queries.
const COLUMNS: &str = "\
    id, pipeline_run_id, project_id, event_type, stage_key, level, \
    message, metadata, created_at";

/// Provides append and read access to run events. There is no update or
/// delete; events are an audit trail.
pub struct RunEventRepo;

impl RunEventRepo {
    pub async fn insert(pool: &PgPool, input: &CreateRunEvent) -> Result<RunEvent, sqlx::Error> {
        let query = format!(
            "INSERT INTO pipeline_run_events \
                 (pipeline_run_id, project_id, event_type, stage_key, level, message, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RunEvent>(&query)
            .bind(input.pipeline_run_id)
            .bind(input.project_id)
            .bind(input.event_type.as_str())
            .bind(&input.stage_key)
            .bind(input.level.as_str())
            .bind(&input.message)
            .bind(&input.metadata)
            .fetch_one(pool)
            .await
    }

    /// The most recent `limit` events for a run, returned oldest first.
    pub async fn list_for_run(
        pool: &PgPool,
        run_id: DbId,
        limit: i64,
    ) -> Result<Vec<RunEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM ( \
                 SELECT {COLUMNS} FROM pipeline_run_events \
                 WHERE pipeline_run_id = $1 \
                 ORDER BY created_at DESC, id DESC \
                 LIMIT $2 \
             ) recent \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, RunEvent>(&query)
            .bind(run_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Events logged for a project before any run existed, at or after `since`.
    pub async fn list_bootstrap(
        pool: &PgPool,
        project_id: DbId,
        since: Timestamp,
        limit: i64,
    ) -> Result<Vec<RunEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM pipeline_run_events \
             WHERE project_id = $1 AND pipeline_run_id IS NULL AND created_at >= $2 \
             ORDER BY created_at ASC, id ASC \
             LIMIT $3"
        );
        sqlx::query_as::<_, RunEvent>(&query)
            .bind(project_id)
            .bind(since)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Events created at or after `since`, newest first.
    pub async fn list_since(
        pool: &PgPool,
        since: Timestamp,
        limit: i64,
    ) -> Result<Vec<RunEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM pipeline_run_events \
             WHERE created_at >= $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, RunEvent>(&query)
            .bind(since)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
