//! Read-through cache over the `api_cache` table.
//!
//! Entries are keyed by API name plus the SHA-256 of the JSON-encoded query.
//! A cache that cannot be read or written is bypassed: the fetch still runs
//! and its result is returned.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use wavelength_core::hashing::sha256_hex;
use wavelength_db::store::CacheStore;

use crate::error::PipelineResult;

#[derive(Clone)]
pub struct ApiCache {
    store: Arc<dyn CacheStore>,
}

/// Cache key for a query: SHA-256 hex of its JSON encoding.
pub fn cache_key<Q: Serialize>(query: &Q) -> PipelineResult<String> {
    let encoded = serde_json::to_string(query)?;
    Ok(sha256_hex(encoded.as_bytes()))
}

impl ApiCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Return a fresh cached response for `query`, or run `fetch` and cache
    /// its result for `ttl_hours`. Fetch errors are returned uncached.
    pub async fn get_or_fetch<Q, T, F, Fut>(
        &self,
        api_name: &str,
        query: &Q,
        ttl_hours: i64,
        fetch: F,
    ) -> PipelineResult<T>
    where
        Q: Serialize + Sync,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        let key = cache_key(query)?;
        let short_key = &key[..8];

        match self.store.get_cached(api_name, &key).await {
            Ok(Some(entry)) => match serde_json::from_value::<T>(entry.response_data) {
                Ok(hit) => {
                    tracing::debug!(api_name, cache_key = short_key, "Cache hit");
                    return Ok(hit);
                }
                Err(e) => {
                    tracing::warn!(api_name, cache_key = short_key, error = %e, "Discarding unreadable cache entry");
                }
            },
            Ok(None) => {
                tracing::debug!(api_name, cache_key = short_key, "Cache miss");
            }
            Err(e) => {
                tracing::warn!(api_name, error = %e, "Cache read failed, fetching directly");
                return fetch().await;
            }
        }

        let fresh = fetch().await?;

        let params = serde_json::to_value(query)?;
        let response = serde_json::to_value(&fresh)?;
        if let Err(e) = self
            .store
            .put_cached(api_name, &key, &params, &response, ttl_hours)
            .await
        {
            tracing::warn!(api_name, error = %e, "Cache write failed");
        }

        Ok(fresh)
    }
}
