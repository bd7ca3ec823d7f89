//! Shared fixtures for pipeline integration tests: in-memory stores and
//! scripted collaborators.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use wavelength_core::phases::{Persona, Phase};
use wavelength_core::run_events::RunEventType;
use wavelength_core::scoring::Dimension;
use wavelength_core::types::DbId;
use wavelength_db::memory::MemoryStore;
use wavelength_db::models::order::{CreateOrder, Order};
use wavelength_db::models::project::{CreateValidationProject, ValidationProject};
use wavelength_db::models::run_job::{CreateRunJob, RunJob};
use wavelength_db::store::{JobStore, StoreError, StoreResult, Stores};
use wavelength_events::{EventBus, RunTelemetry};
use wavelength_pipeline::cache::ApiCache;
use wavelength_pipeline::context::ContextBuilder;
use wavelength_pipeline::error::{PipelineError, PipelineResult};
use wavelength_pipeline::orchestrator::{Orchestrator, RunOptions, RunSummary};
use wavelength_pipeline::providers::{
    AgentInvoker, AgentOutput, AgentRequest, EmployerOpenings, IntelData, IntelProvider,
    IntelQuery, JobsData, JobsProvider, JobsQuery, ReportedScore,
};
use wavelength_pipeline::queue::JobQueue;
use wavelength_pipeline::settings::PipelineSettings;
use wavelength_pipeline::PipelineServices;

// ---------------------------------------------------------------------------
// Stores and settings
// ---------------------------------------------------------------------------

pub fn telemetry(store: &Arc<MemoryStore>) -> RunTelemetry {
    RunTelemetry::new(store.clone(), Arc::new(EventBus::default()))
}

/// Settings with no retry backoff and a short stage timeout.
pub fn fast_settings() -> Arc<PipelineSettings> {
    Arc::new(PipelineSettings {
        stage_retry_backoff: Duration::ZERO,
        stage_timeout: Duration::from_secs(5),
        ..PipelineSettings::default()
    })
}

pub async fn seed_project(store: &MemoryStore) -> ValidationProject {
    store
        .insert_project(CreateValidationProject {
            institution_name: "Kirkwood Community College".into(),
            program_name: Some("Welding Technology Certificate".into()),
            geographic_area: Some("Cedar Rapids, IA".into()),
            city: Some("Cedar Rapids".into()),
            state: Some("Iowa".into()),
            focus: Some("Manufacturing".into()),
            ..Default::default()
        })
        .await
}

pub async fn seed_order(store: &MemoryStore, project_id: DbId) -> Order {
    store.insert_order(CreateOrder { project_id }).await
}

pub async fn event_types(store: &MemoryStore) -> Vec<RunEventType> {
    store
        .all_events()
        .await
        .iter()
        .filter_map(|e| e.kind())
        .collect()
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

/// Agent double returning a fixed score per dimension. Personas can be set
/// to fail a number of times before succeeding.
pub struct ScriptedAgents {
    scores: HashMap<Dimension, f64>,
    failures: Mutex<HashMap<Persona, usize>>,
    calls: Mutex<Vec<Persona>>,
}

impl ScriptedAgents {
    pub fn uniform(score: f64) -> Self {
        Self::with_scores(Dimension::ALL.iter().map(|d| (*d, score)).collect())
    }

    pub fn with_scores(scores: HashMap<Dimension, f64>) -> Self {
        Self {
            scores,
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next `times` invocations of `persona`.
    pub fn fail(self, persona: Persona, times: usize) -> Self {
        self.failures.lock().unwrap().insert(persona, times);
        self
    }

    pub fn set_failures(&self, persona: Persona, times: usize) {
        self.failures.lock().unwrap().insert(persona, times);
    }

    pub fn calls(&self) -> Vec<Persona> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, persona: Persona) -> usize {
        self.calls().iter().filter(|p| **p == persona).count()
    }
}

#[async_trait]
impl AgentInvoker for ScriptedAgents {
    async fn invoke(&self, request: &AgentRequest) -> PipelineResult<AgentOutput> {
        self.calls.lock().unwrap().push(request.persona);

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(left) = failures.get_mut(&request.persona) {
                if *left > 0 {
                    *left -= 1;
                    return Err(PipelineError::agent(request.persona.id(), "upstream 503"));
                }
            }
        }

        let score = request.dimension.map(|d| ReportedScore {
            dimension: d.label().to_string(),
            score: self.scores.get(&d).copied().unwrap_or(5.0),
            rationale: format!("{} rationale", d.label()),
        });
        Ok(AgentOutput {
            markdown: format!("## {}\n\nFindings from {}.", request.persona, request.persona),
            score,
            tokens_used: 1_000,
        })
    }
}

// ---------------------------------------------------------------------------
// Data providers
// ---------------------------------------------------------------------------

pub struct StaticIntel {
    pub calls: AtomicUsize,
    pub delay: Duration,
}

impl StaticIntel {
    pub fn new() -> Self {
        Self { calls: AtomicUsize::new(0), delay: Duration::ZERO }
    }

    pub fn delayed(delay: Duration) -> Self {
        Self { calls: AtomicUsize::new(0), delay }
    }
}

#[async_trait]
impl IntelProvider for StaticIntel {
    async fn fetch(&self, query: &IntelQuery) -> PipelineResult<IntelData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(IntelData {
            text: format!("Median wage for {} in {}: $48,000", query.occupation, query.location),
            tables_used: vec!["oes_wages".into(), "ep_projections".into()],
            facts: serde_json::json!({ "median_wage": 48000 }),
        })
    }
}

/// Jobs provider returning fixed data, an empty result, or an error.
pub struct StaticJobs {
    pub result: Option<JobsData>,
    pub calls: AtomicUsize,
    pub delay: Duration,
}

impl StaticJobs {
    pub fn employers(count: usize) -> Self {
        let top_employers = (0..count)
            .map(|i| EmployerOpenings { name: format!("Employer {i}"), openings: (count - i) as i64 })
            .collect();
        Self {
            result: Some(JobsData { count: 120, top_employers }),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn failing() -> Self {
        Self { result: None, calls: AtomicUsize::new(0), delay: Duration::ZERO }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobsProvider for StaticJobs {
    async fn fetch(&self, _query: &JobsQuery) -> PipelineResult<JobsData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result
            .clone()
            .ok_or_else(|| PipelineError::provider("jobs", "connection refused"))
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

pub fn context_builder(store: &Arc<MemoryStore>) -> ContextBuilder {
    ContextBuilder::new(ApiCache::new(store.clone()))
        .with_intel(Arc::new(StaticIntel::new()))
        .with_primary_jobs(Arc::new(StaticJobs::employers(3)), 168)
}

pub fn services(store: &Arc<MemoryStore>, agents: Arc<ScriptedAgents>) -> PipelineServices {
    PipelineServices::with_collaborators(
        Stores::memory(store.clone()),
        telemetry(store),
        fast_settings(),
        agents,
        context_builder(store),
    )
}

/// Orchestrator double that succeeds or fails without touching stores.
pub struct StubOrchestrator {
    pub fail_with: Option<String>,
    pub calls: AtomicUsize,
}

impl StubOrchestrator {
    pub fn succeeding() -> Self {
        Self { fail_with: None, calls: AtomicUsize::new(0) }
    }

    pub fn failing(message: &str) -> Self {
        Self { fail_with: Some(message.into()), calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl Orchestrator for StubOrchestrator {
    async fn run_validation(&self, _project_id: DbId, _options: RunOptions) -> PipelineResult<RunSummary> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail_with {
            return Err(PipelineError::agent(Persona::MarketAnalyst.id(), message));
        }
        Ok(RunSummary {
            run_id: 1,
            report_id: "WV-S46-20260224-001".into(),
            run_key: "stub".into(),
            composite_score: 7.0,
            recommendation: wavelength_core::scoring::Recommendation::ConditionalGo,
            override_applied: false,
            phases_run: Phase::SEQUENCE.len(),
            phases_skipped: 0,
            total_tokens: 0,
        })
    }
}

pub fn stub_services(store: &Arc<MemoryStore>, orchestrator: Arc<StubOrchestrator>) -> PipelineServices {
    PipelineServices::new(
        Stores::memory(store.clone()),
        telemetry(store),
        fast_settings(),
        orchestrator,
    )
}

// ---------------------------------------------------------------------------
// Job store faults
// ---------------------------------------------------------------------------

/// `JobStore` over a [`MemoryStore`] that can fail terminal updates or lose
/// every claim to a phantom competitor.
pub struct FaultyJobs {
    inner: Arc<MemoryStore>,
    pub fail_terminal: AtomicBool,
    pub lose_claims: AtomicBool,
}

impl FaultyJobs {
    pub fn new(inner: Arc<MemoryStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_terminal: AtomicBool::new(false),
            lose_claims: AtomicBool::new(false),
        })
    }

    fn terminal_fault(&self) -> StoreResult<()> {
        if self.fail_terminal.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for FaultyJobs {
    async fn find_job(&self, id: DbId) -> StoreResult<Option<RunJob>> {
        self.inner.find_job(id).await
    }

    async fn find_active_job(&self, order_id: DbId) -> StoreResult<Option<RunJob>> {
        self.inner.find_active_job(order_id).await
    }

    async fn insert_job(&self, input: &CreateRunJob) -> StoreResult<RunJob> {
        self.inner.insert_job(input).await
    }

    async fn oldest_queued_job(&self) -> StoreResult<Option<RunJob>> {
        self.inner.oldest_queued_job().await
    }

    async fn try_claim_job(&self, id: DbId) -> StoreResult<Option<RunJob>> {
        if self.lose_claims.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.try_claim_job(id).await
    }

    async fn complete_job(&self, id: DbId) -> StoreResult<()> {
        self.terminal_fault()?;
        self.inner.complete_job(id).await
    }

    async fn fail_job(&self, id: DbId, error: &str) -> StoreResult<()> {
        self.terminal_fault()?;
        self.inner.fail_job(id, error).await
    }
}

/// Queue over `store` whose job table goes through `jobs`.
pub fn queue_with_jobs(
    store: &Arc<MemoryStore>,
    jobs: Arc<FaultyJobs>,
    orchestrator: Arc<StubOrchestrator>,
) -> JobQueue {
    let stores = Stores {
        jobs,
        ..Stores::memory(store.clone())
    };
    JobQueue::new(&stores, telemetry(store), orchestrator)
}
