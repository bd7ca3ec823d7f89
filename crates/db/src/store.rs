//! Storage seam for the run pipeline.
//!
//! Each trait covers one concern (queue, checkpoints, runs, events, order and
//! project records, API cache). [`PgStore`] implements all of them by
//! delegating to the repositories; [`crate::memory::MemoryStore`] implements
//! them in process for tests and local runs. Callers hold a [`Stores`]
//! bundle of trait objects and never see which backend is behind it.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use wavelength_core::types::{DbId, Timestamp};

use crate::memory::MemoryStore;
use crate::models::api_cache::ApiCacheEntry;
use crate::models::checkpoint::{Checkpoint, SaveCheckpoint};
use crate::models::order::{Order, QueueMetadata};
use crate::models::pipeline_run::{CreatePipelineRun, PipelineRun, RunResults};
use crate::models::project::ValidationProject;
use crate::models::run_event::{CreateRunEvent, RunEvent};
use crate::models::run_job::{CreateRunJob, RunJob};
use crate::models::status::ProjectStatus;
use crate::repositories::{
    ApiCacheRepo, CheckpointRepo, OrderRepo, PipelineRunRepo, ProjectRepo, RunEventRepo,
    RunJobRepo,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A unique constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        // PostgreSQL unique constraint violation: error code 23505
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                return StoreError::Conflict(format!(
                    "Duplicate value violates unique constraint: {constraint}"
                ));
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn find_job(&self, id: DbId) -> StoreResult<Option<RunJob>>;
    /// Most recent queued or running job for the order.
    async fn find_active_job(&self, order_id: DbId) -> StoreResult<Option<RunJob>>;
    /// Insert a queued job. `StoreError::Conflict` when the order already
    /// has an active job.
    async fn insert_job(&self, input: &CreateRunJob) -> StoreResult<RunJob>;
    async fn oldest_queued_job(&self) -> StoreResult<Option<RunJob>>;
    /// Conditional queued -> running transition. `None` if the job was no
    /// longer queued.
    async fn try_claim_job(&self, id: DbId) -> StoreResult<Option<RunJob>>;
    async fn complete_job(&self, id: DbId) -> StoreResult<()>;
    async fn fail_job(&self, id: DbId, error: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load_completed(&self, run_key: &str) -> StoreResult<Vec<Checkpoint>>;
    async fn upsert_checkpoint(&self, input: &SaveCheckpoint) -> StoreResult<()>;
    async fn delete_checkpoints(&self, run_key: &str) -> StoreResult<u64>;
}

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn find_run(&self, id: DbId) -> StoreResult<Option<PipelineRun>>;
    async fn count_report_ids(&self, prefix: &str) -> StoreResult<i64>;
    async fn insert_run(&self, input: &CreatePipelineRun) -> StoreResult<PipelineRun>;
    /// Single completion update. `NotFound` if the run does not exist.
    async fn complete_run(
        &self,
        id: DbId,
        results: &RunResults,
        config: &serde_json::Value,
    ) -> StoreResult<()>;
    /// Runs created at or after `since`, newest first.
    async fn runs_since(&self, since: Timestamp, limit: i64) -> StoreResult<Vec<PipelineRun>>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append_event(&self, input: &CreateRunEvent) -> StoreResult<RunEvent>;
    /// Latest `limit` events of a run, oldest first.
    async fn events_for_run(&self, run_id: DbId, limit: i64) -> StoreResult<Vec<RunEvent>>;
    /// Run-less events of a project created at or after `since`.
    async fn bootstrap_events(
        &self,
        project_id: DbId,
        since: Timestamp,
        limit: i64,
    ) -> StoreResult<Vec<RunEvent>>;
    /// Events created at or after `since`, newest first.
    async fn events_since(&self, since: Timestamp, limit: i64) -> StoreResult<Vec<RunEvent>>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_order(&self, id: DbId) -> StoreResult<Option<Order>>;
    async fn mark_order_running(&self, id: DbId, metadata: &QueueMetadata) -> StoreResult<()>;
    async fn mark_order_review(
        &self,
        id: DbId,
        metadata: &QueueMetadata,
        completed: bool,
    ) -> StoreResult<()>;
    async fn find_project(&self, id: DbId) -> StoreResult<Option<ValidationProject>>;
    async fn set_project_status(&self, id: DbId, status: ProjectStatus) -> StoreResult<()>;
    async fn save_context_snapshot(&self, id: DbId, snapshot: &serde_json::Value)
        -> StoreResult<()>;
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_cached(&self, api_name: &str, cache_key: &str)
        -> StoreResult<Option<ApiCacheEntry>>;
    async fn put_cached(
        &self,
        api_name: &str,
        cache_key: &str,
        query_params: &serde_json::Value,
        response_data: &serde_json::Value,
        ttl_hours: i64,
    ) -> StoreResult<()>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// Every store the pipeline uses, as shared trait objects.
#[derive(Clone)]
pub struct Stores {
    pub jobs: Arc<dyn JobStore>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub runs: Arc<dyn RunStore>,
    pub events: Arc<dyn EventStore>,
    pub records: Arc<dyn RecordStore>,
    pub cache: Arc<dyn CacheStore>,
    pub health: Arc<dyn StoreHealth>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        let pg = Arc::new(PgStore::new(pool));
        Self {
            jobs: pg.clone(),
            checkpoints: pg.clone(),
            runs: pg.clone(),
            events: pg.clone(),
            records: pg.clone(),
            cache: pg.clone(),
            health: pg,
        }
    }

    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            jobs: store.clone(),
            checkpoints: store.clone(),
            runs: store.clone(),
            events: store.clone(),
            records: store.clone(),
            cache: store.clone(),
            health: store,
        }
    }
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// Postgres-backed store delegating to the repositories.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn find_job(&self, id: DbId) -> StoreResult<Option<RunJob>> {
        Ok(RunJobRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_active_job(&self, order_id: DbId) -> StoreResult<Option<RunJob>> {
        Ok(RunJobRepo::find_active_for_order(&self.pool, order_id).await?)
    }

    async fn insert_job(&self, input: &CreateRunJob) -> StoreResult<RunJob> {
        Ok(RunJobRepo::insert_queued(&self.pool, input).await?)
    }

    async fn oldest_queued_job(&self) -> StoreResult<Option<RunJob>> {
        Ok(RunJobRepo::find_oldest_queued(&self.pool).await?)
    }

    async fn try_claim_job(&self, id: DbId) -> StoreResult<Option<RunJob>> {
        Ok(RunJobRepo::try_claim(&self.pool, id).await?)
    }

    async fn complete_job(&self, id: DbId) -> StoreResult<()> {
        if !RunJobRepo::mark_completed(&self.pool, id).await? {
            return Err(StoreError::NotFound { entity: "RunJob", id });
        }
        Ok(())
    }

    async fn fail_job(&self, id: DbId, error: &str) -> StoreResult<()> {
        if !RunJobRepo::mark_failed(&self.pool, id, error).await? {
            return Err(StoreError::NotFound { entity: "RunJob", id });
        }
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for PgStore {
    async fn load_completed(&self, run_key: &str) -> StoreResult<Vec<Checkpoint>> {
        Ok(CheckpointRepo::list_completed(&self.pool, run_key).await?)
    }

    async fn upsert_checkpoint(&self, input: &SaveCheckpoint) -> StoreResult<()> {
        CheckpointRepo::upsert(&self.pool, input).await?;
        Ok(())
    }

    async fn delete_checkpoints(&self, run_key: &str) -> StoreResult<u64> {
        Ok(CheckpointRepo::delete_by_run_key(&self.pool, run_key).await?)
    }
}

#[async_trait]
impl RunStore for PgStore {
    async fn find_run(&self, id: DbId) -> StoreResult<Option<PipelineRun>> {
        Ok(PipelineRunRepo::find_by_id(&self.pool, id).await?)
    }

    async fn count_report_ids(&self, prefix: &str) -> StoreResult<i64> {
        Ok(PipelineRunRepo::count_report_ids_with_prefix(&self.pool, prefix).await?)
    }

    async fn insert_run(&self, input: &CreatePipelineRun) -> StoreResult<PipelineRun> {
        Ok(PipelineRunRepo::create(&self.pool, input).await?)
    }

    async fn complete_run(
        &self,
        id: DbId,
        results: &RunResults,
        config: &serde_json::Value,
    ) -> StoreResult<()> {
        if !PipelineRunRepo::complete(&self.pool, id, results, config).await? {
            return Err(StoreError::NotFound { entity: "PipelineRun", id });
        }
        Ok(())
    }

    async fn runs_since(&self, since: Timestamp, limit: i64) -> StoreResult<Vec<PipelineRun>> {
        Ok(PipelineRunRepo::list_since(&self.pool, since, limit).await?)
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn append_event(&self, input: &CreateRunEvent) -> StoreResult<RunEvent> {
        Ok(RunEventRepo::insert(&self.pool, input).await?)
    }

    async fn events_for_run(&self, run_id: DbId, limit: i64) -> StoreResult<Vec<RunEvent>> {
        Ok(RunEventRepo::list_for_run(&self.pool, run_id, limit).await?)
    }

    async fn bootstrap_events(
        &self,
        project_id: DbId,
        since: Timestamp,
        limit: i64,
    ) -> StoreResult<Vec<RunEvent>> {
        Ok(RunEventRepo::list_bootstrap(&self.pool, project_id, since, limit).await?)
    }

    async fn events_since(&self, since: Timestamp, limit: i64) -> StoreResult<Vec<RunEvent>> {
        Ok(RunEventRepo::list_since(&self.pool, since, limit).await?)
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn find_order(&self, id: DbId) -> StoreResult<Option<Order>> {
        Ok(OrderRepo::find_by_id(&self.pool, id).await?)
    }

    async fn mark_order_running(&self, id: DbId, metadata: &QueueMetadata) -> StoreResult<()> {
        if !OrderRepo::mark_running(&self.pool, id, metadata).await? {
            return Err(StoreError::NotFound { entity: "Order", id });
        }
        Ok(())
    }

    async fn mark_order_review(
        &self,
        id: DbId,
        metadata: &QueueMetadata,
        completed: bool,
    ) -> StoreResult<()> {
        if !OrderRepo::mark_review(&self.pool, id, metadata, completed).await? {
            return Err(StoreError::NotFound { entity: "Order", id });
        }
        Ok(())
    }

    async fn find_project(&self, id: DbId) -> StoreResult<Option<ValidationProject>> {
        Ok(ProjectRepo::find_by_id(&self.pool, id).await?)
    }

    async fn set_project_status(&self, id: DbId, status: ProjectStatus) -> StoreResult<()> {
        if !ProjectRepo::set_status(&self.pool, id, status).await? {
            return Err(StoreError::NotFound { entity: "ValidationProject", id });
        }
        Ok(())
    }

    async fn save_context_snapshot(
        &self,
        id: DbId,
        snapshot: &serde_json::Value,
    ) -> StoreResult<()> {
        if !ProjectRepo::save_context_snapshot(&self.pool, id, snapshot).await? {
            return Err(StoreError::NotFound { entity: "ValidationProject", id });
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for PgStore {
    async fn get_cached(
        &self,
        api_name: &str,
        cache_key: &str,
    ) -> StoreResult<Option<ApiCacheEntry>> {
        Ok(ApiCacheRepo::find_fresh(&self.pool, api_name, cache_key).await?)
    }

    async fn put_cached(
        &self,
        api_name: &str,
        cache_key: &str,
        query_params: &serde_json::Value,
        response_data: &serde_json::Value,
        ttl_hours: i64,
    ) -> StoreResult<()> {
        ApiCacheRepo::upsert(&self.pool, api_name, cache_key, query_params, response_data, ttl_hours)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }
}
