//! In-process implementation of every store trait.
//!
//! Mirrors the Postgres semantics the pipeline relies on: the partial unique
//! index on active jobs, the conditional claim, checkpoint upserts keyed by
//! (`run_key`, `phase_number`), and cache expiry. Foreign keys are not
//! enforced. Individual stores can be switched into a failing mode to
//! exercise fail-open paths.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use wavelength_core::types::{DbId, Timestamp};

use crate::models::api_cache::ApiCacheEntry;
use crate::models::checkpoint::{Checkpoint, SaveCheckpoint, CHECKPOINT_COMPLETED};
use crate::models::order::{CreateOrder, Order, QueueMetadata};
use crate::models::pipeline_run::{CreatePipelineRun, PipelineRun, RunResults};
use crate::models::project::{CreateValidationProject, ValidationProject};
use crate::models::run_event::{CreateRunEvent, RunEvent};
use crate::models::run_job::{CreateRunJob, RunJob};
use crate::models::status::{JobStatus, OrderStatus, ProjectStatus};
use crate::store::{
    CacheStore, CheckpointStore, EventStore, JobStore, RecordStore, RunStore, StoreError,
    StoreHealth, StoreResult,
};

#[derive(Default)]
struct MemoryState {
    next_id: DbId,
    jobs: Vec<RunJob>,
    checkpoints: Vec<Checkpoint>,
    runs: Vec<PipelineRun>,
    events: Vec<RunEvent>,
    orders: Vec<Order>,
    projects: Vec<ValidationProject>,
    cache: Vec<ApiCacheEntry>,
}

impl MemoryState {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

/// Switches that make one store return `StoreError::Unavailable`.
#[derive(Default)]
struct Faults {
    checkpoints: AtomicBool,
    events: AtomicBool,
    cache: AtomicBool,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    faults: Faults,
}

fn unavailable(store: &str) -> StoreError {
    StoreError::Unavailable(format!("{store} store is failing"))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -- fault injection ----------------------------------------------------

    pub fn fail_checkpoints(&self, failing: bool) {
        self.faults.checkpoints.store(failing, Ordering::SeqCst);
    }

    pub fn fail_events(&self, failing: bool) {
        self.faults.events.store(failing, Ordering::SeqCst);
    }

    pub fn fail_cache(&self, failing: bool) {
        self.faults.cache.store(failing, Ordering::SeqCst);
    }

    // -- seeding and inspection ----------------------------------------------

    pub async fn insert_project(&self, input: CreateValidationProject) -> ValidationProject {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let project = ValidationProject {
            id: state.next_id(),
            institution_name: input.institution_name,
            program_name: input.program_name,
            target_occupation: input.target_occupation,
            geographic_area: input.geographic_area,
            city: input.city,
            state: input.state,
            focus: input.focus,
            status_id: ProjectStatus::Pending.id(),
            context_snapshot: None,
            created_at: now,
            updated_at: now,
        };
        state.projects.push(project.clone());
        project
    }

    pub async fn insert_order(&self, input: CreateOrder) -> Order {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let order = Order {
            id: state.next_id(),
            project_id: input.project_id,
            status_id: OrderStatus::Queued.id(),
            pipeline_started_at: None,
            pipeline_completed_at: None,
            pipeline_metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        };
        state.orders.push(order.clone());
        order
    }

    /// Append an event with an explicit timestamp.
    pub async fn append_event_at(&self, input: &CreateRunEvent, created_at: Timestamp) -> RunEvent {
        let mut state = self.state.lock().await;
        let event = RunEvent {
            id: state.next_id(),
            pipeline_run_id: input.pipeline_run_id,
            project_id: input.project_id,
            event_type: input.event_type.as_str().to_string(),
            stage_key: input.stage_key.clone(),
            level: input.level.as_str().to_string(),
            message: input.message.clone(),
            metadata: input.metadata.clone(),
            created_at,
        };
        state.events.push(event.clone());
        event
    }

    /// Move a run's `created_at`, for lookback-window tests.
    pub async fn backdate_run(&self, id: DbId, created_at: Timestamp) {
        let mut state = self.state.lock().await;
        if let Some(run) = state.runs.iter_mut().find(|r| r.id == id) {
            run.created_at = created_at;
        }
    }

    pub async fn jobs(&self) -> Vec<RunJob> {
        self.state.lock().await.jobs.clone()
    }

    pub async fn all_events(&self) -> Vec<RunEvent> {
        self.state.lock().await.events.clone()
    }

    pub async fn all_runs(&self) -> Vec<PipelineRun> {
        self.state.lock().await.runs.clone()
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (Timestamp, DbId)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

fn oldest_first<T>(items: &mut [T], key: impl Fn(&T) -> (Timestamp, DbId)) {
    items.sort_by(|a, b| key(a).cmp(&key(b)));
}

fn limit_len(limit: i64) -> usize {
    usize::try_from(limit.max(0)).unwrap_or(usize::MAX)
}

// ---------------------------------------------------------------------------
// JobStore
// ---------------------------------------------------------------------------

#[async_trait]
impl JobStore for MemoryStore {
    async fn find_job(&self, id: DbId) -> StoreResult<Option<RunJob>> {
        let state = self.state.lock().await;
        Ok(state.jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn find_active_job(&self, order_id: DbId) -> StoreResult<Option<RunJob>> {
        let state = self.state.lock().await;
        Ok(state
            .jobs
            .iter()
            .filter(|j| j.order_id == order_id)
            .filter(|j| j.status().is_some_and(JobStatus::is_active))
            .max_by_key(|j| (j.created_at, j.id))
            .cloned())
    }

    async fn insert_job(&self, input: &CreateRunJob) -> StoreResult<RunJob> {
        let mut state = self.state.lock().await;
        let active = state.jobs.iter().any(|j| {
            j.order_id == input.order_id && j.status().is_some_and(JobStatus::is_active)
        });
        if active {
            return Err(StoreError::Conflict(
                "Duplicate value violates unique constraint: uq_run_jobs_active_order".into(),
            ));
        }

        let now = Utc::now();
        let job = RunJob {
            id: state.next_id(),
            order_id: input.order_id,
            project_id: input.project_id,
            status_id: JobStatus::Queued.id(),
            attempts: 0,
            requested_by: input.requested_by.clone(),
            error_message: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        };
        state.jobs.push(job.clone());
        Ok(job)
    }

    async fn oldest_queued_job(&self) -> StoreResult<Option<RunJob>> {
        let state = self.state.lock().await;
        Ok(state
            .jobs
            .iter()
            .filter(|j| j.status_id == JobStatus::Queued.id())
            .min_by_key(|j| (j.created_at, j.id))
            .cloned())
    }

    async fn try_claim_job(&self, id: DbId) -> StoreResult<Option<RunJob>> {
        let mut state = self.state.lock().await;
        let Some(job) = state
            .jobs
            .iter_mut()
            .find(|j| j.id == id && j.status_id == JobStatus::Queued.id())
        else {
            return Ok(None);
        };
        let now = Utc::now();
        job.status_id = JobStatus::Running.id();
        job.started_at = Some(now);
        job.attempts += 1;
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn complete_job(&self, id: DbId) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or(StoreError::NotFound { entity: "RunJob", id })?;
        let now = Utc::now();
        job.status_id = JobStatus::Completed.id();
        job.completed_at = Some(now);
        job.error_message = None;
        job.updated_at = now;
        Ok(())
    }

    async fn fail_job(&self, id: DbId, error: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or(StoreError::NotFound { entity: "RunJob", id })?;
        let now = Utc::now();
        job.status_id = JobStatus::Failed.id();
        job.completed_at = Some(now);
        job.error_message = Some(error.to_string());
        job.updated_at = now;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CheckpointStore
// ---------------------------------------------------------------------------

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn load_completed(&self, run_key: &str) -> StoreResult<Vec<Checkpoint>> {
        if self.faults.checkpoints.load(Ordering::SeqCst) {
            return Err(unavailable("checkpoint"));
        }
        let state = self.state.lock().await;
        let mut rows: Vec<Checkpoint> = state
            .checkpoints
            .iter()
            .filter(|c| c.run_key == run_key && c.status == CHECKPOINT_COMPLETED)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.phase_number);
        Ok(rows)
    }

    async fn upsert_checkpoint(&self, input: &SaveCheckpoint) -> StoreResult<()> {
        if self.faults.checkpoints.load(Ordering::SeqCst) {
            return Err(unavailable("checkpoint"));
        }
        let mut state = self.state.lock().await;
        let now = Utc::now();
        if let Some(existing) = state
            .checkpoints
            .iter_mut()
            .find(|c| c.run_key == input.run_key && c.phase_number == input.phase_number)
        {
            existing.subject_name = input.subject_name.clone();
            existing.phase_name = input.phase_name.clone();
            existing.phase_output = input.phase_output.clone();
            existing.runtime_seconds = input.runtime_seconds;
            existing.input_config = input.input_config.clone();
            existing.status = CHECKPOINT_COMPLETED.to_string();
            existing.updated_at = now;
            return Ok(());
        }
        let checkpoint = Checkpoint {
            id: state.next_id(),
            run_key: input.run_key.clone(),
            subject_name: input.subject_name.clone(),
            phase_number: input.phase_number,
            phase_name: input.phase_name.clone(),
            phase_output: input.phase_output.clone(),
            runtime_seconds: input.runtime_seconds,
            input_config: input.input_config.clone(),
            status: CHECKPOINT_COMPLETED.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.checkpoints.push(checkpoint);
        Ok(())
    }

    async fn delete_checkpoints(&self, run_key: &str) -> StoreResult<u64> {
        if self.faults.checkpoints.load(Ordering::SeqCst) {
            return Err(unavailable("checkpoint"));
        }
        let mut state = self.state.lock().await;
        let before = state.checkpoints.len();
        state.checkpoints.retain(|c| c.run_key != run_key);
        Ok((before - state.checkpoints.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// RunStore
// ---------------------------------------------------------------------------

#[async_trait]
impl RunStore for MemoryStore {
    async fn find_run(&self, id: DbId) -> StoreResult<Option<PipelineRun>> {
        let state = self.state.lock().await;
        Ok(state.runs.iter().find(|r| r.id == id).cloned())
    }

    async fn count_report_ids(&self, prefix: &str) -> StoreResult<i64> {
        let state = self.state.lock().await;
        Ok(state.runs.iter().filter(|r| r.report_id.starts_with(prefix)).count() as i64)
    }

    async fn insert_run(&self, input: &CreatePipelineRun) -> StoreResult<PipelineRun> {
        let mut state = self.state.lock().await;
        if state.runs.iter().any(|r| r.report_id == input.report_id) {
            return Err(StoreError::Conflict(format!(
                "Duplicate report id {}",
                input.report_id
            )));
        }
        let run = PipelineRun {
            id: state.next_id(),
            project_id: input.project_id,
            report_id: input.report_id.clone(),
            pipeline_version: input.pipeline_version.clone(),
            model: input.model.clone(),
            prompt_version: input.prompt_version.clone(),
            report_template: input.report_template.clone(),
            config: input.config.clone(),
            agents_run: input.agents_run.clone(),
            synthesis_enabled: input.synthesis_enabled,
            runtime_seconds: None,
            total_tokens: None,
            estimated_cost_usd: None,
            agent_scores: None,
            composite_score: None,
            recommendation: None,
            citation_corrections: None,
            citation_warnings: None,
            intel_tables_used: None,
            report_markdown_hash: None,
            report_page_count: None,
            report_size_kb: None,
            report_version: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        state.runs.push(run.clone());
        Ok(run)
    }

    async fn complete_run(
        &self,
        id: DbId,
        results: &RunResults,
        config: &serde_json::Value,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let run = state
            .runs
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound { entity: "PipelineRun", id })?;
        run.runtime_seconds = Some(results.runtime_seconds);
        run.total_tokens = Some(results.total_tokens);
        run.estimated_cost_usd = Some(results.estimated_cost_usd);
        run.agent_scores = Some(results.agent_scores.clone());
        run.composite_score = Some(results.composite_score);
        run.recommendation = Some(results.recommendation.clone());
        run.citation_corrections = Some(results.citation_corrections);
        run.citation_warnings = Some(results.citation_warnings);
        run.intel_tables_used = Some(results.intel_tables_used.clone());
        run.report_markdown_hash = results.report_markdown_hash.clone();
        run.report_page_count = results.report_page_count;
        run.report_size_kb = results.report_size_kb;
        run.config = config.clone();
        run.report_version = Some(1);
        run.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn runs_since(&self, since: Timestamp, limit: i64) -> StoreResult<Vec<PipelineRun>> {
        let state = self.state.lock().await;
        let mut rows: Vec<PipelineRun> =
            state.runs.iter().filter(|r| r.created_at >= since).cloned().collect();
        newest_first(&mut rows, |r| (r.created_at, r.id));
        rows.truncate(limit_len(limit));
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// EventStore
// ---------------------------------------------------------------------------

#[async_trait]
impl EventStore for MemoryStore {
    async fn append_event(&self, input: &CreateRunEvent) -> StoreResult<RunEvent> {
        if self.faults.events.load(Ordering::SeqCst) {
            return Err(unavailable("event"));
        }
        Ok(self.append_event_at(input, Utc::now()).await)
    }

    async fn events_for_run(&self, run_id: DbId, limit: i64) -> StoreResult<Vec<RunEvent>> {
        if self.faults.events.load(Ordering::SeqCst) {
            return Err(unavailable("event"));
        }
        let state = self.state.lock().await;
        let mut rows: Vec<RunEvent> = state
            .events
            .iter()
            .filter(|e| e.pipeline_run_id == Some(run_id))
            .cloned()
            .collect();
        newest_first(&mut rows, |e| (e.created_at, e.id));
        rows.truncate(limit_len(limit));
        oldest_first(&mut rows, |e| (e.created_at, e.id));
        Ok(rows)
    }

    async fn bootstrap_events(
        &self,
        project_id: DbId,
        since: Timestamp,
        limit: i64,
    ) -> StoreResult<Vec<RunEvent>> {
        if self.faults.events.load(Ordering::SeqCst) {
            return Err(unavailable("event"));
        }
        let state = self.state.lock().await;
        let mut rows: Vec<RunEvent> = state
            .events
            .iter()
            .filter(|e| {
                e.project_id == Some(project_id)
                    && e.pipeline_run_id.is_none()
                    && e.created_at >= since
            })
            .cloned()
            .collect();
        oldest_first(&mut rows, |e| (e.created_at, e.id));
        rows.truncate(limit_len(limit));
        Ok(rows)
    }

    async fn events_since(&self, since: Timestamp, limit: i64) -> StoreResult<Vec<RunEvent>> {
        if self.faults.events.load(Ordering::SeqCst) {
            return Err(unavailable("event"));
        }
        let state = self.state.lock().await;
        let mut rows: Vec<RunEvent> =
            state.events.iter().filter(|e| e.created_at >= since).cloned().collect();
        newest_first(&mut rows, |e| (e.created_at, e.id));
        rows.truncate(limit_len(limit));
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_order(&self, id: DbId) -> StoreResult<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn mark_order_running(&self, id: DbId, metadata: &QueueMetadata) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(StoreError::NotFound { entity: "Order", id })?;
        let now = Utc::now();
        order.status_id = OrderStatus::Running.id();
        order.pipeline_started_at = Some(now);
        order.pipeline_metadata = metadata.to_value();
        order.updated_at = now;
        Ok(())
    }

    async fn mark_order_review(
        &self,
        id: DbId,
        metadata: &QueueMetadata,
        completed: bool,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(StoreError::NotFound { entity: "Order", id })?;
        let now = Utc::now();
        order.status_id = OrderStatus::Review.id();
        order.pipeline_metadata = metadata.to_value();
        if completed {
            order.pipeline_completed_at = Some(now);
        }
        order.updated_at = now;
        Ok(())
    }

    async fn find_project(&self, id: DbId) -> StoreResult<Option<ValidationProject>> {
        let state = self.state.lock().await;
        Ok(state.projects.iter().find(|p| p.id == id).cloned())
    }

    async fn set_project_status(&self, id: DbId, status: ProjectStatus) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let project = state
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound { entity: "ValidationProject", id })?;
        project.status_id = status.id();
        project.updated_at = Utc::now();
        Ok(())
    }

    async fn save_context_snapshot(
        &self,
        id: DbId,
        snapshot: &serde_json::Value,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let project = state
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound { entity: "ValidationProject", id })?;
        project.context_snapshot = Some(snapshot.clone());
        project.updated_at = Utc::now();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CacheStore
// ---------------------------------------------------------------------------

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get_cached(
        &self,
        api_name: &str,
        cache_key: &str,
    ) -> StoreResult<Option<ApiCacheEntry>> {
        if self.faults.cache.load(Ordering::SeqCst) {
            return Err(unavailable("cache"));
        }
        let state = self.state.lock().await;
        let now = Utc::now();
        Ok(state
            .cache
            .iter()
            .find(|c| c.api_name == api_name && c.cache_key == cache_key && c.expires_at > now)
            .cloned())
    }

    async fn put_cached(
        &self,
        api_name: &str,
        cache_key: &str,
        query_params: &serde_json::Value,
        response_data: &serde_json::Value,
        ttl_hours: i64,
    ) -> StoreResult<()> {
        if self.faults.cache.load(Ordering::SeqCst) {
            return Err(unavailable("cache"));
        }
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let expires_at = now + Duration::hours(ttl_hours);
        if let Some(entry) = state
            .cache
            .iter_mut()
            .find(|c| c.api_name == api_name && c.cache_key == cache_key)
        {
            entry.query_params = query_params.clone();
            entry.response_data = response_data.clone();
            entry.expires_at = expires_at;
            return Ok(());
        }
        let entry = ApiCacheEntry {
            id: state.next_id(),
            api_name: api_name.to_string(),
            cache_key: cache_key.to_string(),
            query_params: query_params.clone(),
            response_data: response_data.clone(),
            expires_at,
            created_at: now,
        };
        state.cache.push(entry);
        Ok(())
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn job_input(order_id: DbId) -> CreateRunJob {
        CreateRunJob { order_id, project_id: 1, requested_by: "admin".into() }
    }

    #[tokio::test]
    async fn second_active_job_for_order_conflicts() {
        let store = MemoryStore::new();
        store.insert_job(&job_input(7)).await.unwrap();
        let err = store.insert_job(&job_input(7)).await.unwrap_err();
        assert_matches!(err, StoreError::Conflict(_));
        store.insert_job(&job_input(8)).await.unwrap();
    }

    #[tokio::test]
    async fn claim_only_moves_queued_jobs() {
        let store = MemoryStore::new();
        let job = store.insert_job(&job_input(1)).await.unwrap();

        let claimed = store.try_claim_job(job.id).await.unwrap().unwrap();
        assert_eq!(claimed.status(), Some(JobStatus::Running));
        assert_eq!(claimed.attempts, 1);
        assert!(claimed.started_at.is_some());

        assert!(store.try_claim_job(job.id).await.unwrap().is_none());
        store.complete_job(job.id).await.unwrap();
        assert!(store.try_claim_job(job.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn checkpoint_upsert_overwrites_same_phase() {
        let store = MemoryStore::new();
        let mut input = SaveCheckpoint {
            run_key: "k".into(),
            subject_name: "S".into(),
            phase_number: 2,
            phase_name: "two".into(),
            phase_output: serde_json::json!({ "v": 1 }),
            runtime_seconds: 1.0,
            input_config: None,
        };
        store.upsert_checkpoint(&input).await.unwrap();
        input.phase_output = serde_json::json!({ "v": 2 });
        store.upsert_checkpoint(&input).await.unwrap();

        let rows = store.load_completed("k").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].phase_output["v"], 2);
    }

    #[tokio::test]
    async fn expired_cache_entries_are_not_returned() {
        let store = MemoryStore::new();
        let params = serde_json::json!({});
        store.put_cached("api", "k", &params, &serde_json::json!(1), 0).await.unwrap();
        assert!(store.get_cached("api", "k").await.unwrap().is_none());
        store.put_cached("api", "k", &params, &serde_json::json!(2), 1).await.unwrap();
        let hit = store.get_cached("api", "k").await.unwrap().unwrap();
        assert_eq!(hit.response_data, 2);
    }

    #[tokio::test]
    async fn faults_make_stores_unavailable() {
        let store = MemoryStore::new();
        store.fail_checkpoints(true);
        assert_matches!(store.load_completed("k").await, Err(StoreError::Unavailable(_)));
        store.fail_checkpoints(false);
        assert!(store.load_completed("k").await.unwrap().is_empty());
    }
}
