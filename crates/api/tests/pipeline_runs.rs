//! Run health, timeline and manual resume endpoints.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, post_empty, post_json, seed_order, StubOrchestrator};
use serde_json::json;
use wavelength_core::run_config::RunConfig;
use wavelength_core::run_events::RunEventType;
use wavelength_db::models::status::ProjectStatus;
use wavelength_db::store::RecordStore;
use wavelength_events::NewRunEvent;

const MODEL: &str = "claude-sonnet-4-6";

/// Wait until the background resume has called the orchestrator.
async fn wait_for_calls(orchestrator: &StubOrchestrator, expected: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while orchestrator.calls() < expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("resume did not reach the orchestrator");
}

// ---------------------------------------------------------------------------
// Test: health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_summarises_recent_runs() {
    let app = build_test_app(StubOrchestrator::succeeding());
    let (project_id, _) = seed_order(&app.store).await;
    let run = app
        .services
        .tracker
        .start_run(project_id, &RunConfig::standard(MODEL, None))
        .await
        .unwrap();
    for kind in [RunEventType::StageFailed, RunEventType::StageRetryScheduled, RunEventType::RunFailed] {
        app.services
            .tracker
            .log_event(NewRunEvent::new(kind).with_run(Some(run.id)).with_project(project_id))
            .await;
    }

    let response = get(&app.router, "/api/v1/pipeline-runs/health?hours=12").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["lookback_hours"], 12);
    assert_eq!(json["data"]["run_count"], 1);
    assert_eq!(json["data"]["run_failed"], 1);
    assert_eq!(json["data"]["stage_failed"], 1);
    assert_eq!(json["data"]["stage_retried"], 1);
}

/// Out-of-range lookbacks are clamped rather than rejected.
#[tokio::test]
async fn health_clamps_lookback() {
    let app = build_test_app(StubOrchestrator::succeeding());

    let json = body_json(get(&app.router, "/api/v1/pipeline-runs/health?hours=0").await).await;
    assert_eq!(json["data"]["lookback_hours"], 1);

    let json = body_json(get(&app.router, "/api/v1/pipeline-runs/health").await).await;
    assert_eq!(json["data"]["lookback_hours"], 24);
    assert_eq!(json["data"]["run_count"], 0);
}

// ---------------------------------------------------------------------------
// Test: timeline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn timeline_lists_run_events_oldest_first() {
    let app = build_test_app(StubOrchestrator::succeeding());
    let (project_id, _) = seed_order(&app.store).await;
    let run = app
        .services
        .tracker
        .start_run(project_id, &RunConfig::standard(MODEL, None))
        .await
        .unwrap();
    for kind in [RunEventType::RunStarted, RunEventType::StageStarted, RunEventType::StageCompleted] {
        app.services
            .tracker
            .log_event(NewRunEvent::new(kind).with_run(Some(run.id)).with_project(project_id))
            .await;
    }

    let response = get(&app.router, &format!("/api/v1/pipeline-runs/{}/events", run.id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let kinds: Vec<_> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event_type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(kinds, ["run_started", "stage_started", "stage_completed"]);

    let response = get(&app.router, &format!("/api/v1/pipeline-runs/{}/events?limit=1", run.id)).await;
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"][0]["event_type"], "stage_completed");
}

#[tokio::test]
async fn timeline_for_unknown_run_is_404() {
    let app = build_test_app(StubOrchestrator::succeeding());

    let response = get(&app.router, "/api/v1/pipeline-runs/77/events").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Test: resume
// ---------------------------------------------------------------------------

/// An idle project resumes in the background and the call returns 202.
#[tokio::test]
async fn resume_starts_background_run() {
    let orchestrator = StubOrchestrator::succeeding();
    let app = build_test_app(orchestrator.clone());
    let (project_id, _) = seed_order(&app.store).await;
    let run = app
        .services
        .tracker
        .start_run(project_id, &RunConfig::standard(MODEL, None))
        .await
        .unwrap();

    let response = post_empty(&app.router, &format!("/api/v1/pipeline-runs/{}/resume", run.id)).await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["ok"], true);
    assert_eq!(json["data"]["project_id"], project_id);
    assert_eq!(json["data"]["message"], "Resume started");

    wait_for_calls(&orchestrator, 1).await;
    let events = app.store.all_events().await;
    assert!(events.iter().any(|e| e.kind() == Some(RunEventType::ManualResumeRequested)));
}

/// A model profile in the body is resolved and recorded on the resume event.
#[tokio::test]
async fn resume_accepts_model_profile() {
    let orchestrator = StubOrchestrator::succeeding();
    let app = build_test_app(orchestrator.clone());
    let (project_id, _) = seed_order(&app.store).await;
    let run = app
        .services
        .tracker
        .start_run(project_id, &RunConfig::standard(MODEL, None))
        .await
        .unwrap();

    let response = post_json(
        &app.router,
        &format!("/api/v1/pipeline-runs/{}/resume", run.id),
        json!({ "model_profile": "premium" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    wait_for_calls(&orchestrator, 1).await;
    let requested = app
        .store
        .all_events()
        .await
        .into_iter()
        .find(|e| e.kind() == Some(RunEventType::ManualResumeRequested))
        .unwrap();
    assert_eq!(requested.metadata["model"], "claude-opus-4-6");
}

#[tokio::test]
async fn resume_rejects_unknown_profile() {
    let orchestrator = StubOrchestrator::succeeding();
    let app = build_test_app(orchestrator.clone());
    let (project_id, _) = seed_order(&app.store).await;
    let run = app
        .services
        .tracker
        .start_run(project_id, &RunConfig::standard(MODEL, None))
        .await
        .unwrap();

    let response = post_json(
        &app.router,
        &format!("/api/v1/pipeline-runs/{}/resume", run.id),
        json!({ "model_profile": "turbo" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
    assert_eq!(orchestrator.calls(), 0);
}

#[tokio::test]
async fn resume_unknown_run_is_404() {
    let app = build_test_app(StubOrchestrator::succeeding());

    let response = post_empty(&app.router, "/api/v1/pipeline-runs/31337/resume").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// A project that is already researching cannot be resumed twice.
#[tokio::test]
async fn resume_while_researching_is_409() {
    let orchestrator = StubOrchestrator::succeeding();
    let app = build_test_app(orchestrator.clone());
    let (project_id, _) = seed_order(&app.store).await;
    let run = app
        .services
        .tracker
        .start_run(project_id, &RunConfig::standard(MODEL, None))
        .await
        .unwrap();
    app.store
        .set_project_status(project_id, ProjectStatus::Researching)
        .await
        .unwrap();

    let response = post_empty(&app.router, &format!("/api/v1/pipeline-runs/{}/resume", run.id)).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "CONFLICT");
    assert!(json["error"].as_str().unwrap().contains(&project_id.to_string()));
    assert_eq!(orchestrator.calls(), 0);
}
