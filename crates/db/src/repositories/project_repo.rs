//! Repository for the `validation_projects` table.

use sqlx::PgPool;
use wavelength_core::types::DbId;

use crate::models::project::{CreateValidationProject, ValidationProject};
use crate::models::status::ProjectStatus;

/// Column list for `validation_projects` queries.
const COLUMNS: &str = "\
    id, institution_name, program_name, target_occupation, geographic_area, \
    city, state, focus, status_id, context_snapshot, created_at, updated_at";

/// Provides the project reads and status writes the pipeline needs.
pub struct ProjectRepo;

impl ProjectRepo {
    pub async fn create(
        pool: &PgPool,
        input: &CreateValidationProject,
    ) -> Result<ValidationProject, sqlx::Error> {
        let query = format!(
            "INSERT INTO validation_projects \
                 (institution_name, program_name, target_occupation, geographic_area, \
                  city, state, focus, status_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ValidationProject>(&query)
            .bind(&input.institution_name)
            .bind(&input.program_name)
            .bind(&input.target_occupation)
            .bind(&input.geographic_area)
            .bind(&input.city)
            .bind(&input.state)
            .bind(&input.focus)
            .bind(ProjectStatus::Pending.id())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ValidationProject>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM validation_projects WHERE id = $1");
        sqlx::query_as::<_, ValidationProject>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn set_status(
        pool: &PgPool,
        id: DbId,
        status: ProjectStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE validation_projects SET status_id = $2 WHERE id = $1")
            .bind(id)
            .bind(status.id())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Persist the shared pipeline context built for a run.
    pub async fn save_context_snapshot(
        pool: &PgPool,
        id: DbId,
        snapshot: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE validation_projects SET context_snapshot = $2 WHERE id = $1")
                .bind(id)
                .bind(snapshot)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
