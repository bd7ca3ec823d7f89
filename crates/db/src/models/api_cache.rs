//! Cached external API responses, keyed by (`api_name`, `cache_key`).

use serde::Serialize;
use sqlx::FromRow;
use wavelength_core::types::{DbId, Timestamp};

/// A row from the `api_cache` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ApiCacheEntry {
    pub id: DbId,
    pub api_name: String,
    pub cache_key: String,
    pub query_params: serde_json::Value,
    pub response_data: serde_json::Value,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
}
