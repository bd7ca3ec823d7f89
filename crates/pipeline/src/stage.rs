//! Stage execution with checkpoint skip, retry, timeout and telemetry.
//!
//! Every phase of a run goes through [`StageRunner::run`], which emits the
//! `stage_*` events the health report and timeline are built from.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::json;
use wavelength_core::run_events::{EventLevel, RunEventType};
use wavelength_core::types::DbId;
use wavelength_events::{NewRunEvent, RunTelemetry};

use crate::error::{PipelineError, PipelineResult};
use crate::settings::PipelineSettings;

#[derive(Debug, Clone, Copy)]
pub struct StagePolicy {
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub timeout: Duration,
}

impl From<&PipelineSettings> for StagePolicy {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            max_attempts: settings.stage_max_attempts.max(1),
            retry_backoff: settings.stage_retry_backoff,
            timeout: settings.stage_timeout,
        }
    }
}

/// Identity of one stage within a run.
#[derive(Debug, Clone)]
pub struct StageSpec {
    pub pipeline_run_id: Option<DbId>,
    pub project_id: DbId,
    pub stage_key: String,
    pub label: String,
    /// Failure after the last attempt yields `None` instead of an error.
    pub optional: bool,
}

#[derive(Debug)]
pub struct StageOutcome<T> {
    /// `None` only for an optional stage that exhausted its attempts.
    pub result: Option<T>,
    pub skipped: bool,
    pub duration: Duration,
}

/// Runs the stages of one pipeline run. Attempt counts are kept per stage
/// key for the runner's lifetime.
pub struct StageRunner {
    telemetry: RunTelemetry,
    policy: StagePolicy,
    attempts: Mutex<HashMap<String, u32>>,
}

impl StageRunner {
    pub fn new(telemetry: RunTelemetry, policy: StagePolicy) -> Self {
        Self {
            telemetry,
            policy,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    fn next_attempt(&self, stage_key: &str) -> u32 {
        let mut attempts = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        let counter = attempts.entry(stage_key.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    fn event(&self, spec: &StageSpec, event_type: RunEventType) -> NewRunEvent {
        let mut event = NewRunEvent::new(event_type)
            .with_run(spec.pipeline_run_id)
            .with_project(spec.project_id)
            .with_stage(spec.stage_key.clone());
        event.message = Some(match event_type {
            RunEventType::StageSkipped => format!("{} skipped (checkpoint complete)", spec.label),
            RunEventType::StageStarted => format!("{} started", spec.label),
            RunEventType::StageCompleted => format!("{} completed", spec.label),
            RunEventType::StageFailed => format!("{} failed", spec.label),
            RunEventType::StageRetryScheduled => format!("{} retry scheduled", spec.label),
            other => format!("{} {other}", spec.label),
        });
        event
    }

    /// Record a stage whose result was restored from a checkpoint.
    pub async fn skip<T>(&self, spec: &StageSpec, restored: T) -> StageOutcome<T> {
        self.telemetry
            .log(self.event(spec, RunEventType::StageSkipped))
            .await;
        tracing::info!(stage = %spec.stage_key, "Stage skipped (checkpoint complete)");
        StageOutcome {
            result: Some(restored),
            skipped: true,
            duration: Duration::ZERO,
        }
    }

    /// Execute `work` until it succeeds or attempts run out. `work` receives
    /// the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, spec: &StageSpec, mut work: F) -> PipelineResult<StageOutcome<T>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        let max_attempts = self.policy.max_attempts;

        loop {
            let attempt = self.next_attempt(&spec.stage_key);
            self.telemetry
                .log(
                    self.event(spec, RunEventType::StageStarted)
                        .with_metadata(json!({ "attempt": attempt })),
                )
                .await;
            tracing::info!(stage = %spec.stage_key, attempt, max_attempts, "Stage started");

            let started = Instant::now();
            let result = match tokio::time::timeout(self.policy.timeout, work(attempt)).await {
                Ok(result) => result,
                Err(_) => Err(PipelineError::Timeout {
                    label: spec.label.clone(),
                    timeout_ms: self.policy.timeout.as_millis() as u64,
                }),
            };
            let duration = started.elapsed();
            let duration_ms = duration.as_millis() as u64;

            let error = match result {
                Ok(value) => {
                    self.telemetry
                        .log(
                            self.event(spec, RunEventType::StageCompleted)
                                .with_metadata(json!({ "durationMs": duration_ms, "attempt": attempt })),
                        )
                        .await;
                    tracing::info!(stage = %spec.stage_key, duration_ms, "Stage completed");
                    return Ok(StageOutcome {
                        result: Some(value),
                        skipped: false,
                        duration,
                    });
                }
                Err(e) => e,
            };

            let message = error.to_string();
            let level = if spec.optional { EventLevel::Warn } else { EventLevel::Error };
            self.telemetry
                .log(
                    self.event(spec, RunEventType::StageFailed)
                        .with_level(level)
                        .with_metadata(json!({
                            "durationMs": duration_ms,
                            "attempt": attempt,
                            "error": message,
                        })),
                )
                .await;

            if attempt < max_attempts {
                let backoff = self.policy.retry_backoff * attempt;
                let backoff_ms = backoff.as_millis() as u64;
                self.telemetry
                    .log(
                        self.event(spec, RunEventType::StageRetryScheduled)
                            .with_level(EventLevel::Warn)
                            .with_metadata(json!({
                                "attempt": attempt,
                                "nextAttempt": attempt + 1,
                                "backoffMs": backoff_ms,
                                "error": message,
                            })),
                    )
                    .await;
                tracing::warn!(
                    stage = %spec.stage_key,
                    attempt,
                    max_attempts,
                    backoff_ms,
                    error = %message,
                    "Stage failed, retrying"
                );
                if !backoff.is_zero() {
                    tokio::time::sleep(backoff).await;
                }
                continue;
            }

            if spec.optional {
                tracing::warn!(stage = %spec.stage_key, attempt, error = %message, "Optional stage failed, continuing");
                return Ok(StageOutcome {
                    result: None,
                    skipped: false,
                    duration,
                });
            }

            tracing::error!(stage = %spec.stage_key, attempt, error = %message, "Stage failed");
            return Err(error);
        }
    }
}
