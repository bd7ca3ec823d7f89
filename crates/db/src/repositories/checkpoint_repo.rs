//! Repository for the `discovery_checkpoints` table.

use sqlx::PgPool;

use crate::models::checkpoint::{Checkpoint, SaveCheckpoint, CHECKPOINT_COMPLETED};

/// Column list for `discovery_checkpoints` queries.
const COLUMNS: &str = "\
    id, run_key, subject_name, phase_number, phase_name, phase_output, \
    runtime_seconds, input_config, status, created_at, updated_at";

/// Provides checkpoint persistence keyed by run key and phase number.
pub struct CheckpointRepo;

impl CheckpointRepo {
    /// Completed checkpoints for a run key, ascending by phase number.
    pub async fn list_completed(
        pool: &PgPool,
        run_key: &str,
    ) -> Result<Vec<Checkpoint>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM discovery_checkpoints \
             WHERE run_key = $1 AND status = $2 \
             ORDER BY phase_number ASC"
        );
        sqlx::query_as::<_, Checkpoint>(&query)
            .bind(run_key)
            .bind(CHECKPOINT_COMPLETED)
            .fetch_all(pool)
            .await
    }

    /// Upsert one phase's output. Last write wins.
    pub async fn upsert(pool: &PgPool, input: &SaveCheckpoint) -> Result<Checkpoint, sqlx::Error> {
        let query = format!(
            "INSERT INTO discovery_checkpoints \
                 (run_key, subject_name, phase_number, phase_name, phase_output, \
                  runtime_seconds, input_config, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (run_key, phase_number) DO UPDATE SET \
                 subject_name    = EXCLUDED.subject_name, \
                 phase_name      = EXCLUDED.phase_name, \
                 phase_output    = EXCLUDED.phase_output, \
                 runtime_seconds = EXCLUDED.runtime_seconds, \
                 input_config    = EXCLUDED.input_config, \
                 status          = EXCLUDED.status \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Checkpoint>(&query)
            .bind(&input.run_key)
            .bind(&input.subject_name)
            .bind(input.phase_number)
            .bind(&input.phase_name)
            .bind(&input.phase_output)
            .bind(input.runtime_seconds)
            .bind(&input.input_config)
            .bind(CHECKPOINT_COMPLETED)
            .fetch_one(pool)
            .await
    }

    /// Delete every checkpoint for a run key. Returns the number removed.
    pub async fn delete_by_run_key(pool: &PgPool, run_key: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM discovery_checkpoints WHERE run_key = $1")
            .bind(run_key)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
