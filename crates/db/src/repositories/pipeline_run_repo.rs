//! Repository for the `pipeline_runs` table.

use sqlx::PgPool;
use wavelength_core::types::{DbId, Timestamp};

use crate::models::pipeline_run::{CreatePipelineRun, PipelineRun, RunResults};

/// Column list for `pipeline_runs` queries.
const COLUMNS: &str = "\
    id, project_id, report_id, pipeline_version, model, prompt_version, \
    report_template, config, agents_run, synthesis_enabled, \
    runtime_seconds, total_tokens, estimated_cost_usd, agent_scores, \
    composite_score, recommendation, citation_corrections, citation_warnings, \
    intel_tables_used, report_markdown_hash, report_page_count, report_size_kb, \
    report_version, created_at, completed_at";

/// Report version written when a run is finalized.
const INITIAL_REPORT_VERSION: i32 = 1;

/// Provides run record persistence.
pub struct PipelineRunRepo;

impl PipelineRunRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<PipelineRun>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM pipeline_runs WHERE id = $1");
        sqlx::query_as::<_, PipelineRun>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Number of report ids starting with `prefix`.
    pub async fn count_report_ids_with_prefix(
        pool: &PgPool,
        prefix: &str,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM pipeline_runs WHERE starts_with(report_id, $1)")
            .bind(prefix)
            .fetch_one(pool)
            .await
    }

    /// Insert a run at start. Result columns stay NULL.
    pub async fn create(pool: &PgPool, input: &CreatePipelineRun) -> Result<PipelineRun, sqlx::Error> {
        let query = format!(
            "INSERT INTO pipeline_runs \
                 (project_id, report_id, pipeline_version, model, prompt_version, \
                  report_template, config, agents_run, synthesis_enabled) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PipelineRun>(&query)
            .bind(input.project_id)
            .bind(&input.report_id)
            .bind(&input.pipeline_version)
            .bind(&input.model)
            .bind(&input.prompt_version)
            .bind(&input.report_template)
            .bind(&input.config)
            .bind(&input.agents_run)
            .bind(input.synthesis_enabled)
            .fetch_one(pool)
            .await
    }

    /// Write every result field and the merged config in one update.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        results: &RunResults,
        config: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE pipeline_runs SET \
                 runtime_seconds = $2, total_tokens = $3, estimated_cost_usd = $4, \
                 agent_scores = $5, composite_score = $6, recommendation = $7, \
                 citation_corrections = $8, citation_warnings = $9, \
                 intel_tables_used = $10, report_markdown_hash = $11, \
                 report_page_count = $12, report_size_kb = $13, \
                 config = $14, report_version = $15, completed_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(results.runtime_seconds)
        .bind(results.total_tokens)
        .bind(results.estimated_cost_usd)
        .bind(&results.agent_scores)
        .bind(results.composite_score)
        .bind(&results.recommendation)
        .bind(results.citation_corrections)
        .bind(results.citation_warnings)
        .bind(&results.intel_tables_used)
        .bind(&results.report_markdown_hash)
        .bind(results.report_page_count)
        .bind(results.report_size_kb)
        .bind(config)
        .bind(INITIAL_REPORT_VERSION)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Runs created at or after `since`, newest first.
    pub async fn list_since(
        pool: &PgPool,
        since: Timestamp,
        limit: i64,
    ) -> Result<Vec<PipelineRun>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM pipeline_runs \
             WHERE created_at >= $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, PipelineRun>(&query)
            .bind(since)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
