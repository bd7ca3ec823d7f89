//! Pipeline run records: creation, completion, manual resume, health and
//! the per-run event timeline.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;
use wavelength_core::error::CoreError;
use wavelength_core::health::{
    clamp_lookback_hours, compute_health, HealthReport, RunSample, HEALTH_EVENT_LIMIT,
    HEALTH_RUN_LIMIT,
};
use wavelength_core::model_profile::{resolve_model, ModelProfile};
use wavelength_core::report_id::{build_report_id, report_id_prefix};
use wavelength_core::run_config::{CitationDetails, RunConfig};
use wavelength_core::run_events::{EventLevel, RunEventType};
use wavelength_core::types::DbId;
use wavelength_db::models::pipeline_run::{CreatePipelineRun, PipelineRun, RunResults};
use wavelength_db::models::run_event::RunEvent;
use wavelength_db::models::status::ProjectStatus;
use wavelength_db::store::{StoreError, Stores};
use wavelength_events::{NewRunEvent, RunTelemetry};

use crate::error::PipelineResult;
use crate::orchestrator::{Orchestrator, RunOptions};
use crate::settings::PipelineSettings;

pub const TIMELINE_DEFAULT_LIMIT: i64 = 200;
pub const TIMELINE_MAX_LIMIT: i64 = 500;

/// Run-less events this long before a run was created belong to it.
const BOOTSTRAP_WINDOW_MINUTES: i64 = 5;

/// Inserts retried when a concurrent run takes the same report id.
const REPORT_ID_ATTEMPTS: usize = 3;

/// Clamp a requested timeline size to `1..=500`, default 200.
pub fn clamp_timeline_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(TIMELINE_DEFAULT_LIMIT)
        .clamp(1, TIMELINE_MAX_LIMIT)
}

/// Merge run events with bootstrap events: ordered by (`created_at`, `id`),
/// de-duplicated by id, the last `limit` kept.
pub fn merge_timeline(run_events: Vec<RunEvent>, bootstrap: Vec<RunEvent>, limit: i64) -> Vec<RunEvent> {
    let mut merged: Vec<RunEvent> = run_events.into_iter().chain(bootstrap).collect();
    merged.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

    let mut seen = HashSet::new();
    merged.retain(|e| seen.insert(e.id));

    let keep = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
    let skip = merged.len().saturating_sub(keep);
    merged.split_off(skip)
}

/// The run's config migrated to the current schema, or `None` when the
/// stored blob cannot be read.
fn stored_config(run: &PipelineRun) -> Option<RunConfig> {
    match RunConfig::from_stored(&run.config) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(run_id = run.id, error = %e, "Unreadable run config");
            None
        }
    }
}

/// Insert citation details into an unparsed config blob, keeping its keys.
fn merge_citation_details(
    mut config: serde_json::Value,
    citation_details: Option<&CitationDetails>,
) -> PipelineResult<serde_json::Value> {
    if let Some(details) = citation_details {
        if !config.is_object() {
            config = json!({});
        }
        if let Some(obj) = config.as_object_mut() {
            obj.insert("citation_details".into(), serde_json::to_value(details)?);
        }
    }
    Ok(config)
}

/// Manual resume parameters.
#[derive(Debug, Clone, Default)]
pub struct ResumeRequest {
    pub override_model: Option<String>,
    pub override_profile: Option<ModelProfile>,
}

/// A resume that has been accepted and is running in the background.
#[derive(Debug)]
pub struct ResumeStarted {
    pub run_id: DbId,
    pub project_id: DbId,
    pub model: String,
    pub task: JoinHandle<()>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResumeAccepted {
    pub ok: bool,
    pub project_id: DbId,
    pub message: &'static str,
}

impl From<&ResumeStarted> for ResumeAccepted {
    fn from(started: &ResumeStarted) -> Self {
        Self {
            ok: true,
            project_id: started.project_id,
            message: "Resume started",
        }
    }
}

#[derive(Clone)]
pub struct RunTracker {
    stores: Stores,
    telemetry: RunTelemetry,
    settings: Arc<PipelineSettings>,
}

impl RunTracker {
    pub fn new(stores: Stores, telemetry: RunTelemetry, settings: Arc<PipelineSettings>) -> Self {
        Self {
            stores,
            telemetry,
            settings,
        }
    }

    pub fn telemetry(&self) -> &RunTelemetry {
        &self.telemetry
    }

    /// Create the run record, assigning the next report id for the model
    /// and day.
    pub async fn start_run(&self, project_id: DbId, config: &RunConfig) -> PipelineResult<PipelineRun> {
        let day = Utc::now().date_naive();
        let prefix = report_id_prefix(&config.model, day);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let existing = self.stores.runs.count_report_ids(&prefix).await?;
            let input = CreatePipelineRun {
                project_id,
                report_id: build_report_id(&config.model, day, existing),
                pipeline_version: self.settings.pipeline_version.clone(),
                model: config.model.clone(),
                prompt_version: self.settings.prompt_version.clone(),
                report_template: self.settings.report_template.clone(),
                config: config.to_value(),
                agents_run: config.agent_ids(),
                synthesis_enabled: config.synthesis_enabled,
            };

            match self.stores.runs.insert_run(&input).await {
                Ok(run) => {
                    tracing::info!(run_id = run.id, project_id, report_id = %run.report_id, "Pipeline run started");
                    return Ok(run);
                }
                Err(StoreError::Conflict(msg)) if attempt < REPORT_ID_ATTEMPTS => {
                    tracing::debug!(report_id = %input.report_id, conflict = %msg, "Report id taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Write the run's results in one update. The stored config is migrated
    /// to the current schema and citation details, when given, are added to
    /// it. An unreadable config keeps its keys and only gains the details.
    pub async fn complete_run(
        &self,
        run_id: DbId,
        results: &RunResults,
        citation_details: Option<&CitationDetails>,
    ) -> PipelineResult<()> {
        let run = self
            .stores
            .runs
            .find_run(run_id)
            .await?
            .ok_or(CoreError::NotFound { entity: "PipelineRun", id: run_id })?;

        let config = match stored_config(&run) {
            Some(mut config) => {
                if let Some(details) = citation_details {
                    config.citation_details = Some(details.clone());
                }
                config.to_value()
            }
            None => merge_citation_details(run.config, citation_details)?,
        };

        self.stores.runs.complete_run(run_id, results, &config).await?;
        tracing::info!(
            run_id,
            composite_score = results.composite_score,
            recommendation = %results.recommendation,
            "Pipeline run completed"
        );
        Ok(())
    }

    /// Best-effort telemetry append.
    pub async fn log_event(&self, event: NewRunEvent) -> Option<DbId> {
        self.telemetry.log(event).await
    }

    /// Re-drive a stored run's project in the background.
    ///
    /// Fails with `NotFound` for an unknown run or project and `Conflict`
    /// when the project is already researching.
    pub async fn resume(
        &self,
        run_id: DbId,
        request: ResumeRequest,
        orchestrator: Arc<dyn Orchestrator>,
    ) -> PipelineResult<ResumeStarted> {
        let run = self
            .stores
            .runs
            .find_run(run_id)
            .await?
            .ok_or(CoreError::NotFound { entity: "Pipeline run", id: run_id })?;

        let project = self
            .stores
            .records
            .find_project(run.project_id)
            .await?
            .ok_or(CoreError::NotFound { entity: "Validation project", id: run.project_id })?;

        if project.status() == Some(ProjectStatus::Researching) {
            return Err(CoreError::Conflict(format!(
                "Project {} is already running",
                project.id
            ))
            .into());
        }

        let model = resolve_model(
            request.override_model.as_deref(),
            request.override_profile,
            &run.model,
        );
        let model_profile = request
            .override_profile
            .or_else(|| stored_config(&run).and_then(|c| c.model_profile));

        self.telemetry
            .log(
                NewRunEvent::new(RunEventType::ManualResumeRequested)
                    .with_run(Some(run.id))
                    .with_project(run.project_id)
                    .with_level(EventLevel::Warn)
                    .with_message("Manual resume requested from admin dashboard")
                    .with_metadata(json!({
                        "source": "admin_dashboard",
                        "model": model,
                        "model_profile": model_profile,
                    })),
            )
            .await;

        let options = RunOptions {
            model: Some(model.clone()),
            model_profile,
            force_fresh: false,
        };
        let telemetry = self.telemetry.clone();
        let project_id = run.project_id;
        let task = tokio::spawn(async move {
            if let Err(e) = orchestrator.run_validation(project_id, options).await {
                tracing::error!(run_id, project_id, error = %e, "Manual resume failed");
                telemetry
                    .log(
                        NewRunEvent::new(RunEventType::ManualResumeFailed)
                            .with_run(Some(run_id))
                            .with_project(project_id)
                            .with_level(EventLevel::Error)
                            .with_message("Manual resume failed")
                            .with_metadata(json!({ "error": e.to_string() })),
                    )
                    .await;
            }
        });

        Ok(ResumeStarted {
            run_id,
            project_id,
            model,
            task,
        })
    }

    /// Reliability summary over the last `lookback_hours` (clamped 1..=168).
    pub async fn health(&self, lookback_hours: Option<i64>) -> PipelineResult<HealthReport> {
        let hours = clamp_lookback_hours(lookback_hours);
        let since = Utc::now() - Duration::hours(hours);

        let (runs, events) = tokio::try_join!(
            self.stores.runs.runs_since(since, HEALTH_RUN_LIMIT),
            self.stores.events.events_since(since, HEALTH_EVENT_LIMIT),
        )?;

        let samples: Vec<RunSample> = runs
            .iter()
            .map(|r| RunSample {
                runtime_seconds: r.runtime_seconds,
                created_at: r.created_at,
            })
            .collect();
        let kinds: Vec<RunEventType> = events.iter().filter_map(RunEvent::kind).collect();

        Ok(compute_health(hours, &samples, &kinds))
    }

    /// Events of a run plus the project's run-less events from just before
    /// it started.
    pub async fn timeline(&self, run_id: DbId, limit: Option<i64>) -> PipelineResult<Vec<RunEvent>> {
        let limit = clamp_timeline_limit(limit);
        let run = self
            .stores
            .runs
            .find_run(run_id)
            .await?
            .ok_or(CoreError::NotFound { entity: "Pipeline run", id: run_id })?;

        let run_events = self.stores.events.events_for_run(run.id, limit).await?;

        let since = run.created_at - Duration::minutes(BOOTSTRAP_WINDOW_MINUTES);
        let bootstrap = match self
            .stores
            .events
            .bootstrap_events(run.project_id, since, limit)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(run_id, error = %e, "Bootstrap events unavailable, returning run events only");
                Vec::new()
            }
        };

        Ok(merge_timeline(run_events, bootstrap, limit))
    }
}

