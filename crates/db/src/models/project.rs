//! Validation projects: the subject a pipeline run analyzes.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use wavelength_core::types::{DbId, Timestamp};

use super::status::{ProjectStatus, StatusId};

/// A row from the `validation_projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ValidationProject {
    pub id: DbId,
    pub institution_name: String,
    pub program_name: Option<String>,
    pub target_occupation: Option<String>,
    pub geographic_area: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub focus: Option<String>,
    pub status_id: StatusId,
    pub context_snapshot: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ValidationProject {
    pub fn status(&self) -> Option<ProjectStatus> {
        ProjectStatus::from_id(self.status_id)
    }
}

/// DTO for inserting a project. Used by seeding and tests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateValidationProject {
    pub institution_name: String,
    pub program_name: Option<String>,
    pub target_occupation: Option<String>,
    pub geographic_area: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub focus: Option<String>,
}
