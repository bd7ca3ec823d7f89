//! Shared helpers for API integration tests: an app over the in-memory
//! store and small request helpers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tokio_util::task::TaskTracker;
use tower::ServiceExt;
use wavelength_api::config::ServerConfig;
use wavelength_api::router::build_app_router;
use wavelength_api::state::AppState;
use wavelength_core::phases::Phase;
use wavelength_core::scoring::Recommendation;
use wavelength_core::types::DbId;
use wavelength_db::memory::MemoryStore;
use wavelength_db::models::order::CreateOrder;
use wavelength_db::models::project::CreateValidationProject;
use wavelength_db::store::Stores;
use wavelength_events::{EventBus, RunTelemetry};
use wavelength_pipeline::error::{PipelineError, PipelineResult};
use wavelength_pipeline::orchestrator::{Orchestrator, RunOptions, RunSummary};
use wavelength_pipeline::settings::PipelineSettings;
use wavelength_pipeline::PipelineServices;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        embedded_workers: 0,
    }
}

/// Orchestrator double that records calls and succeeds or fails, optionally
/// after a delay.
pub struct StubOrchestrator {
    pub fail_with: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubOrchestrator {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self { fail_with: None, delay: None, calls: AtomicUsize::new(0) })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self { fail_with: Some(message.into()), delay: None, calls: AtomicUsize::new(0) })
    }

    /// Succeeds after sleeping for `delay`.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self { fail_with: None, delay: Some(delay), calls: AtomicUsize::new(0) })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Orchestrator for StubOrchestrator {
    async fn run_validation(&self, project_id: DbId, _options: RunOptions) -> PipelineResult<RunSummary> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.fail_with {
            return Err(PipelineError::agent("market-analyst", message));
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

/// A test app plus handles to the state behind it.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub services: PipelineServices,
    pub runs: TaskTracker,
}

/// Build the full application router (same middleware stack as `main.rs`)
/// over an in-memory store and the given orchestrator.
pub fn build_test_app(orchestrator: Arc<StubOrchestrator>) -> TestApp {
    build_test_app_with_config(orchestrator, test_config())
}

pub fn build_test_app_with_config(orchestrator: Arc<StubOrchestrator>, config: ServerConfig) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let services = PipelineServices::new(
        Stores::memory(store.clone()),
        RunTelemetry::new(store.clone(), Arc::new(EventBus::default())),
        Arc::new(PipelineSettings::default()),
        orchestrator,
    );
    let runs = TaskTracker::new();
    let state = AppState {
        services: services.clone(),
        config: Arc::new(config),
        runs: runs.clone(),
    };
    TestApp {
        router: build_app_router(state),
        store,
        services,
        runs,
    }
}

/// Seed a project and an order and return `(project_id, order_id)`.
pub async fn seed_order(store: &MemoryStore) -> (DbId, DbId) {
    let project = store
        .insert_project(CreateValidationProject {
            institution_name: "Kirkwood Community College".into(),
            program_name: Some("Welding Technology Certificate".into()),
            city: Some("Cedar Rapids".into()),
            state: Some("Iowa".into()),
            ..Default::default()
        })
        .await;
    let order = store.insert_order(CreateOrder { project_id: project.id }).await;
    (project.id, order.id)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn post_empty(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri, None).await
}

pub async fn delete(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
