//! Pipeline run records: created at run start, finalized once at completion.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use wavelength_core::types::{DbId, Timestamp};

/// A row from the `pipeline_runs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PipelineRun {
    pub id: DbId,
    pub project_id: DbId,
    pub report_id: String,
    pub pipeline_version: String,
    pub model: String,
    pub prompt_version: Option<String>,
    pub report_template: String,
    pub config: serde_json::Value,
    pub agents_run: Vec<String>,
    pub synthesis_enabled: bool,
    pub runtime_seconds: Option<f64>,
    pub total_tokens: Option<i64>,
    pub estimated_cost_usd: Option<f64>,
    pub agent_scores: Option<serde_json::Value>,
    pub composite_score: Option<f64>,
    pub recommendation: Option<String>,
    pub citation_corrections: Option<i32>,
    pub citation_warnings: Option<i32>,
    pub intel_tables_used: Option<Vec<String>>,
    pub report_markdown_hash: Option<String>,
    pub report_page_count: Option<i32>,
    pub report_size_kb: Option<f64>,
    pub report_version: Option<i32>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// DTO for inserting a run at start. Result fields stay NULL.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePipelineRun {
    pub project_id: DbId,
    pub report_id: String,
    pub pipeline_version: String,
    pub model: String,
    pub prompt_version: Option<String>,
    pub report_template: String,
    pub config: serde_json::Value,
    pub agents_run: Vec<String>,
    pub synthesis_enabled: bool,
}

/// Result fields written in the single completion update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResults {
    pub runtime_seconds: f64,
    pub total_tokens: i64,
    pub estimated_cost_usd: f64,
    pub agent_scores: serde_json::Value,
    pub composite_score: f64,
    pub recommendation: String,
    pub citation_corrections: i32,
    pub citation_warnings: i32,
    pub intel_tables_used: Vec<String>,
    pub report_markdown_hash: Option<String>,
    pub report_page_count: Option<i32>,
    pub report_size_kb: Option<f64>,
}
