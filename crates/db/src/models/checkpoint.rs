//! Phase checkpoints keyed by (`run_key`, `phase_number`).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use wavelength_core::types::{DbId, Timestamp};

/// The only status a stored checkpoint currently takes.
pub const CHECKPOINT_COMPLETED: &str = "completed";

/// A row from the `discovery_checkpoints` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Checkpoint {
    pub id: DbId,
    pub run_key: String,
    pub subject_name: String,
    pub phase_number: i32,
    pub phase_name: String,
    pub phase_output: serde_json::Value,
    pub runtime_seconds: f64,
    pub input_config: Option<serde_json::Value>,
    pub status: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for upserting one phase's output.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveCheckpoint {
    pub run_key: String,
    pub subject_name: String,
    pub phase_number: i32,
    pub phase_name: String,
    pub phase_output: serde_json::Value,
    pub runtime_seconds: f64,
    pub input_config: Option<serde_json::Value>,
}
