//! Repository for the `api_cache` table.

use sqlx::PgPool;

use crate::models::api_cache::ApiCacheEntry;

/// Column list for `api_cache` queries.
const COLUMNS: &str = "\
    id, api_name, cache_key, query_params, response_data, expires_at, created_at";

/// Provides TTL-bounded response caching for external data providers.
pub struct ApiCacheRepo;

impl ApiCacheRepo {
    /// Unexpired entry for (`api_name`, `cache_key`), if any.
    pub async fn find_fresh(
        pool: &PgPool,
        api_name: &str,
        cache_key: &str,
    ) -> Result<Option<ApiCacheEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM api_cache \
             WHERE api_name = $1 AND cache_key = $2 AND expires_at > NOW()"
        );
        sqlx::query_as::<_, ApiCacheEntry>(&query)
            .bind(api_name)
            .bind(cache_key)
            .fetch_optional(pool)
            .await
    }

    /// Insert or refresh an entry expiring `ttl_hours` from now.
    pub async fn upsert(
        pool: &PgPool,
        api_name: &str,
        cache_key: &str,
        query_params: &serde_json::Value,
        response_data: &serde_json::Value,
        ttl_hours: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO api_cache (api_name, cache_key, query_params, response_data, expires_at) \
             VALUES ($1, $2, $3, $4, NOW() + make_interval(hours => $5::int)) \
             ON CONFLICT (api_name, cache_key) DO UPDATE SET \
                 query_params  = EXCLUDED.query_params, \
                 response_data = EXCLUDED.response_data, \
                 expires_at    = EXCLUDED.expires_at",
        )
        .bind(api_name)
        .bind(cache_key)
        .bind(query_params)
        .bind(response_data)
        .bind(ttl_hours)
        .execute(pool)
        .await?;
        Ok(())
    }
}
