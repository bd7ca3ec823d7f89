//! Orders: the customer-facing record a run job serves.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use wavelength_core::types::{DbId, Timestamp};

use super::status::{OrderStatus, StatusId};

/// A row from the `orders` table (pipeline-related columns only).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: DbId,
    pub project_id: DbId,
    pub status_id: StatusId,
    pub pipeline_started_at: Option<Timestamp>,
    pub pipeline_completed_at: Option<Timestamp>,
    pub pipeline_metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Order {
    pub fn status(&self) -> Option<OrderStatus> {
        OrderStatus::from_id(self.status_id)
    }
}

/// Queue bookkeeping stored in `orders.pipeline_metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMetadata {
    pub queued_job_id: DbId,
    pub queue_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueueMetadata {
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// DTO for inserting an order. Used by seeding and tests.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrder {
    pub project_id: DbId,
}
