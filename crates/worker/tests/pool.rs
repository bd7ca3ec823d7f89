//! Worker pool behaviour against the in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use wavelength_core::phases::Phase;
use wavelength_core::scoring::Recommendation;
use wavelength_core::types::DbId;
use wavelength_db::memory::MemoryStore;
use wavelength_db::models::order::CreateOrder;
use wavelength_db::models::project::CreateValidationProject;
use wavelength_db::models::run_job::CreateRunJob;
use wavelength_db::models::status::JobStatus;
use wavelength_db::store::{JobStore, Stores};
use wavelength_events::{EventBus, RunTelemetry};
use wavelength_pipeline::error::PipelineResult;
use wavelength_pipeline::orchestrator::{Orchestrator, RunOptions, RunSummary};
use wavelength_pipeline::queue::EnqueueRequest;
use wavelength_pipeline::settings::PipelineSettings;
use wavelength_pipeline::PipelineServices;
use wavelength_worker::{WorkerConfig, WorkerPool};

/// Orchestrator that counts calls and optionally takes a while.
struct SlowOrchestrator {
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl SlowOrchestrator {
    fn new(delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0), delay })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Orchestrator for SlowOrchestrator {
    async fn run_validation(&self, project_id: DbId, _options: RunOptions) -> PipelineResult<RunSummary> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(RunSummary {
            run_id: project_id,
            report_id: "WV-S46-20260224-001".into(),
            run_key: format!("project-{project_id}"),
            composite_score: 7.0,
            recommendation: Recommendation::ConditionalGo,
            override_applied: false,
            phases_run: Phase::SEQUENCE.len(),
            phases_skipped: 0,
            total_tokens: 0,
        })
    }
}

fn services(store: &Arc<MemoryStore>, orchestrator: Arc<SlowOrchestrator>) -> PipelineServices {
    PipelineServices::new(
        Stores::memory(store.clone()),
        RunTelemetry::new(store.clone(), Arc::new(EventBus::default())),
        Arc::new(PipelineSettings::default()),
        orchestrator,
    )
}

fn config(workers: usize, poll_interval: Duration, shutdown_timeout: Duration) -> WorkerConfig {
    WorkerConfig {
        worker_count: workers,
        poll_interval,
        shutdown_timeout,
    }
}

/// Seed a project and order and return `(project_id, order_id)`.
async fn seed(store: &MemoryStore) -> (DbId, DbId) {
    let project = store
        .insert_project(CreateValidationProject {
            institution_name: "Kirkwood Community College".into(),
            program_name: Some("Welding Technology Certificate".into()),
            ..Default::default()
        })
        .await;
    let order = store.insert_order(CreateOrder { project_id: project.id }).await;
    (project.id, order.id)
}

async fn enqueue(services: &PipelineServices, store: &MemoryStore) -> DbId {
    let (project_id, order_id) = seed(store).await;
    services
        .queue
        .enqueue(EnqueueRequest { order_id, project_id, requested_by: None })
        .await
        .unwrap()
        .job
        .id
}

/// Poll until every job is terminal or the deadline passes.
async fn wait_for_terminal_jobs(store: &MemoryStore, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let jobs = store.jobs().await;
            let done = jobs.iter().filter(|j| !j.status().is_some_and(JobStatus::is_active)).count();
            if done == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("jobs did not finish in time");
}

// ---- Test: enqueue wake-up ----

/// Enqueued jobs are picked up immediately even with a very long poll
/// interval.
#[tokio::test]
async fn enqueue_wakes_idle_workers() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = SlowOrchestrator::new(None);
    let services = services(&store, orchestrator.clone());
    let pool = WorkerPool::new(
        services.queue.clone(),
        config(2, Duration::from_secs(3_600), Duration::from_secs(5)),
    );
    assert_eq!(pool.start(), 2);

    // Let the workers find the queue empty and park.
    tokio::time::sleep(Duration::from_millis(50)).await;
    for _ in 0..3 {
        enqueue(&services, &store).await;
    }

    wait_for_terminal_jobs(&store, 3).await;
    assert!(store.jobs().await.iter().all(|j| j.status() == Some(JobStatus::Completed)));
    assert_eq!(orchestrator.calls(), 3);
    assert!(pool.shutdown().await);
}

// ---- Test: polling ----

/// Jobs inserted behind the queue's back are found on the next poll.
#[tokio::test]
async fn poll_interval_finds_jobs_without_notification() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = SlowOrchestrator::new(None);
    let services = services(&store, orchestrator.clone());
    let pool = WorkerPool::new(
        services.queue.clone(),
        config(1, Duration::from_millis(20), Duration::from_secs(5)),
    );
    pool.start();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (project_id, order_id) = seed(&store).await;
    store
        .insert_job(&CreateRunJob { order_id, project_id, requested_by: "cron".into() })
        .await
        .unwrap();

    wait_for_terminal_jobs(&store, 1).await;
    assert_eq!(orchestrator.calls(), 1);
    assert!(pool.shutdown().await);
}

// ---- Test: exactly-once under concurrency ----

/// Many workers racing over many jobs run each job once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_workers_run_each_job_once() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = SlowOrchestrator::new(Some(Duration::from_millis(5)));
    let services = services(&store, orchestrator.clone());
    for _ in 0..10 {
        enqueue(&services, &store).await;
    }

    let pool = WorkerPool::new(
        services.queue.clone(),
        config(4, Duration::from_millis(20), Duration::from_secs(5)),
    );
    pool.start();

    wait_for_terminal_jobs(&store, 10).await;
    assert_eq!(orchestrator.calls(), 10);
    assert!(store.jobs().await.iter().all(|j| j.status() == Some(JobStatus::Completed)));
    assert!(pool.shutdown().await);
}

// ---- Test: shutdown ----

/// Shutdown lets an in-flight job finish before returning.
#[tokio::test]
async fn shutdown_drains_in_flight_job() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = SlowOrchestrator::new(Some(Duration::from_millis(200)));
    let services = services(&store, orchestrator.clone());
    let pool = WorkerPool::new(
        services.queue.clone(),
        config(1, Duration::from_millis(20), Duration::from_secs(5)),
    );
    let job_id = enqueue(&services, &store).await;
    pool.start();

    tokio::time::timeout(Duration::from_secs(2), async {
        while orchestrator.calls() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert!(pool.shutdown().await);
    let job = store.find_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status(), Some(JobStatus::Completed));
}

/// A job that outlives the shutdown timeout is abandoned in `running`.
#[tokio::test]
async fn shutdown_gives_up_after_timeout() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = SlowOrchestrator::new(Some(Duration::from_secs(3_600)));
    let services = services(&store, orchestrator.clone());
    let pool = WorkerPool::new(
        services.queue.clone(),
        config(1, Duration::from_millis(20), Duration::from_millis(100)),
    );
    let job_id = enqueue(&services, &store).await;
    pool.start();

    tokio::time::timeout(Duration::from_secs(2), async {
        while orchestrator.calls() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert!(!pool.shutdown().await);
    let job = store.find_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status(), Some(JobStatus::Running));
}

/// A pool with zero workers starts nothing and shuts down at once.
#[tokio::test]
async fn empty_pool_is_a_no_op() {
    let store = Arc::new(MemoryStore::new());
    let services = services(&store, SlowOrchestrator::new(None));
    let pool = WorkerPool::new(services.queue.clone(), config(0, Duration::from_secs(1), Duration::from_secs(1)));

    assert_eq!(pool.start(), 0);
    enqueue(&services, &store).await;
    assert!(pool.shutdown().await);
    assert_eq!(store.jobs().await[0].status(), Some(JobStatus::Queued));
}
