//! Append-only run telemetry rows.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use wavelength_core::run_events::{EventLevel, RunEventType};
use wavelength_core::types::{DbId, Timestamp};

/// A row from the `pipeline_run_events` table.
///
/// `event_type` and `level` are stored as text; [`RunEvent::kind`] and
/// [`RunEvent::severity`] parse them back into the closed enums.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RunEvent {
    pub id: DbId,
    pub pipeline_run_id: Option<DbId>,
    pub project_id: Option<DbId>,
    pub event_type: String,
    pub stage_key: Option<String>,
    pub level: String,
    pub message: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
}

impl RunEvent {
    pub fn kind(&self) -> Option<RunEventType> {
        self.event_type.parse().ok()
    }

    pub fn severity(&self) -> Option<EventLevel> {
        self.level.parse().ok()
    }
}

/// DTO for appending one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRunEvent {
    pub pipeline_run_id: Option<DbId>,
    pub project_id: Option<DbId>,
    pub event_type: RunEventType,
    pub stage_key: Option<String>,
    pub level: EventLevel,
    pub message: Option<String>,
    pub metadata: serde_json::Value,
}
