//! The validation run: eight checkpointed phases, scoring and completion.
//!
//! A run marks the project `researching`, opens a run record, builds the
//! shared context once, then walks [`Phase::SEQUENCE`]. Phases found in the
//! checkpoint store for today's run key are restored instead of re-invoked,
//! so a run killed mid-way resumes at the first unfinished phase.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use wavelength_core::error::CoreError;
use wavelength_core::hashing::hash_markdown;
use wavelength_core::model_profile::{estimate_cost_usd, resolve_model, ModelProfile};
use wavelength_core::phases::Phase;
use wavelength_core::run_config::RunConfig;
use wavelength_core::run_events::{EventLevel, RunEventType};
use wavelength_core::run_key::build_run_key_today;
use wavelength_core::scoring::{calculate_program_score, score_dimension, DimensionScore, Recommendation};
use wavelength_core::types::DbId;
use wavelength_db::models::checkpoint::Checkpoint;
use wavelength_db::models::pipeline_run::RunResults;
use wavelength_db::models::project::ValidationProject;
use wavelength_db::models::status::ProjectStatus;
use wavelength_db::store::Stores;
use wavelength_events::NewRunEvent;

use crate::checkpoints::PhaseCheckpoints;
use crate::context::{ContextBuilder, PipelineContext, ProjectHandle};
use crate::error::{PipelineError, PipelineResult};
use crate::providers::{AgentInvoker, AgentRequest};
use crate::report::{compile_report, estimate_page_count, size_kb, ReportSection};
use crate::settings::PipelineSettings;
use crate::stage::{StagePolicy, StageRunner, StageSpec};
use crate::tracker::RunTracker;

/// How a run is started.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Explicit model; wins over `model_profile`.
    pub model: Option<String>,
    pub model_profile: Option<ModelProfile>,
    /// Clear today's checkpoints before running.
    pub force_fresh: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: DbId,
    pub report_id: String,
    pub run_key: String,
    pub composite_score: f64,
    pub recommendation: Recommendation,
    pub override_applied: bool,
    pub phases_run: usize,
    pub phases_skipped: usize,
    pub total_tokens: i64,
}

/// Drives one project's validation run.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn run_validation(&self, project_id: DbId, options: RunOptions) -> PipelineResult<RunSummary>;
}

/// Checkpointed output of one phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    pub markdown: String,
    pub score: Option<DimensionScore>,
    #[serde(default)]
    pub tokens_used: i64,
}

/// Checkpoint run key for a project: institution as subject, program and
/// place as location parts.
pub fn project_run_key(project: &ValidationProject) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if let Some(program) = project.program_name.as_deref() {
        parts.push(program);
    }
    match (project.city.as_deref(), project.state.as_deref()) {
        (None, None) => parts.extend(project.geographic_area.as_deref()),
        (city, state) => parts.extend(city.into_iter().chain(state)),
    }
    build_run_key_today(&project.institution_name, &parts, project.focus.as_deref())
}

fn restore(checkpoint: &Checkpoint) -> Option<PhaseResult> {
    match serde_json::from_value(checkpoint.phase_output.clone()) {
        Ok(result) => Some(result),
        Err(e) => {
            tracing::warn!(
                run_key = %checkpoint.run_key,
                phase = checkpoint.phase_number,
                error = %e,
                "Unreadable checkpoint output, re-running phase"
            );
            None
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationOrchestrator
// ---------------------------------------------------------------------------

pub struct ValidationOrchestrator {
    stores: Stores,
    tracker: RunTracker,
    checkpoints: PhaseCheckpoints,
    context: ContextBuilder,
    agents: Arc<dyn AgentInvoker>,
    settings: Arc<PipelineSettings>,
}

impl ValidationOrchestrator {
    pub fn new(
        stores: Stores,
        tracker: RunTracker,
        context: ContextBuilder,
        agents: Arc<dyn AgentInvoker>,
        settings: Arc<PipelineSettings>,
    ) -> Self {
        Self {
            checkpoints: PhaseCheckpoints::new(stores.checkpoints.clone()),
            stores,
            tracker,
            context,
            agents,
            settings,
        }
    }

    async fn set_project_status(&self, project_id: DbId, status: ProjectStatus) {
        if let Err(e) = self.stores.records.set_project_status(project_id, status).await {
            tracing::warn!(project_id, status = %status, error = %e, "Failed to update project status");
        }
    }

    async fn execute(
        &self,
        project: ValidationProject,
        options: &RunOptions,
        run_id: &mut Option<DbId>,
    ) -> PipelineResult<RunSummary> {
        let started = Instant::now();
        let model = resolve_model(
            options.model.as_deref(),
            options.model_profile,
            &self.settings.default_model,
        );
        let config = RunConfig::standard(model, options.model_profile);

        let run = self.tracker.start_run(project.id, &config).await?;
        *run_id = Some(run.id);
        self.tracker
            .log_event(
                NewRunEvent::new(RunEventType::RunStarted)
                    .with_run(Some(run.id))
                    .with_project(project.id)
                    .with_message("Validation run started")
                    .with_metadata(json!({ "report_id": run.report_id, "model": config.model })),
            )
            .await;

        let run_key = project_run_key(&project);
        if options.force_fresh {
            self.checkpoints.clear(&run_key).await?;
        }
        let completed = self.checkpoints.load(&run_key).await;
        tracing::info!(run_id = run.id, run_key = %run_key, restored = completed.len(), "Checkpoints loaded");

        let handle = ProjectHandle::new(project);
        let context = handle.context(&self.context, config.intel_context_enabled).await;
        self.save_context_snapshot(handle.project.id, context).await;

        let project_json = serde_json::to_value(&handle.project)?;
        let context_json = serde_json::to_value(context)?;
        let runner = StageRunner::new(
            self.tracker.telemetry().clone(),
            StagePolicy::from(self.settings.as_ref()),
        );

        let mut results: BTreeMap<Phase, PhaseResult> = BTreeMap::new();
        let mut phases_run = 0;
        let mut phases_skipped = 0;

        for phase in Phase::SEQUENCE {
            if !config.phase_enabled(phase) {
                continue;
            }
            let spec = StageSpec {
                pipeline_run_id: Some(run.id),
                project_id: handle.project.id,
                stage_key: phase.key().to_string(),
                label: phase.label().to_string(),
                optional: phase == Phase::Synthesis,
            };

            if let Some(restored) = completed.get(&phase.number()).and_then(restore) {
                let outcome = runner.skip(&spec, restored).await;
                results.extend(outcome.result.map(|r| (phase, r)));
                phases_skipped += 1;
                continue;
            }

            let request = AgentRequest {
                persona: phase.persona(),
                model: config.model.clone(),
                dimension: phase.dimension(),
                project: project_json.clone(),
                context: context_json.clone(),
                prior_outputs: results
                    .iter()
                    .map(|(p, r)| (p.key().to_string(), json!(r.markdown)))
                    .collect(),
            };

            let outcome = runner
                .run(&spec, |_attempt| self.invoke_phase(phase, &request))
                .await?;
            phases_run += 1;

            let Some(result) = outcome.result else { continue };
            self.checkpoints
                .save_phase(
                    &run_key,
                    &handle.project.institution_name,
                    phase,
                    serde_json::to_value(&result)?,
                    outcome.duration.as_secs_f64(),
                    Some(config.to_value()),
                )
                .await;
            results.insert(phase, result);
        }

        let dimensions: Vec<DimensionScore> = results.values().filter_map(|r| r.score.clone()).collect();
        let score = calculate_program_score(dimensions);

        let sections: Vec<ReportSection<'_>> = results
            .iter()
            .map(|(phase, r)| ReportSection { phase: *phase, markdown: &r.markdown })
            .collect();
        let markdown = compile_report(&handle.project, &sections, &score);

        let total_tokens: i64 = results.values().map(|r| r.tokens_used).sum();
        let agent_scores: serde_json::Map<String, serde_json::Value> = score
            .dimensions
            .iter()
            .map(|d| (d.dimension.label().to_string(), json!(d.score)))
            .collect();

        let run_results = RunResults {
            runtime_seconds: started.elapsed().as_secs_f64(),
            total_tokens,
            estimated_cost_usd: estimate_cost_usd(&config.model, total_tokens),
            agent_scores: serde_json::Value::Object(agent_scores),
            composite_score: score.composite_score,
            recommendation: score.recommendation.label().to_string(),
            citation_corrections: 0,
            citation_warnings: 0,
            intel_tables_used: context.intel.tables_used.clone(),
            report_markdown_hash: Some(hash_markdown(&markdown)),
            report_page_count: Some(estimate_page_count(&markdown)),
            report_size_kb: Some(size_kb(&markdown)),
        };
        self.tracker.complete_run(run.id, &run_results, None).await?;

        self.tracker
            .log_event(
                NewRunEvent::new(RunEventType::RunCompleted)
                    .with_run(Some(run.id))
                    .with_project(handle.project.id)
                    .with_message("Validation run completed")
                    .with_metadata(json!({
                        "composite_score": score.composite_score,
                        "recommendation": score.recommendation,
                        "override_applied": score.override_applied,
                        "runtime_seconds": run_results.runtime_seconds,
                    })),
            )
            .await;
        self.set_project_status(handle.project.id, ProjectStatus::Review).await;

        Ok(RunSummary {
            run_id: run.id,
            report_id: run.report_id,
            run_key,
            composite_score: score.composite_score,
            recommendation: score.recommendation,
            override_applied: score.override_applied,
            phases_run,
            phases_skipped,
            total_tokens,
        })
    }

    /// Invoke the phase's persona and validate its score.
    async fn invoke_phase(&self, phase: Phase, request: &AgentRequest) -> PipelineResult<PhaseResult> {
        let output = self.agents.invoke(request).await?;

        let score = match phase.dimension() {
            None => None,
            Some(expected) => {
                let reported = output
                    .score
                    .ok_or_else(|| PipelineError::agent(phase.persona().id(), "no dimension score returned"))?;
                let scored = score_dimension(&reported.dimension, reported.score, reported.rationale)?;
                if scored.dimension != expected {
                    return Err(PipelineError::agent(
                        phase.persona().id(),
                        format!("scored {} instead of {expected}", scored.dimension),
                    ));
                }
                Some(scored)
            }
        };

        Ok(PhaseResult {
            markdown: output.markdown,
            score,
            tokens_used: output.tokens_used.max(0),
        })
    }

    async fn save_context_snapshot(&self, project_id: DbId, context: &PipelineContext) {
        let snapshot = match serde_json::to_value(context) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(project_id, error = %e, "Failed to encode context snapshot");
                return;
            }
        };
        if let Err(e) = self.stores.records.save_context_snapshot(project_id, &snapshot).await {
            tracing::warn!(project_id, error = %e, "Failed to save context snapshot");
        }
    }
}

#[async_trait]
impl Orchestrator for ValidationOrchestrator {
    async fn run_validation(&self, project_id: DbId, options: RunOptions) -> PipelineResult<RunSummary> {
        let mut run_id = None;
        let result = match self.stores.records.find_project(project_id).await {
            Ok(Some(project)) => {
                self.set_project_status(project_id, ProjectStatus::Researching).await;
                tracing::info!(project_id, "Starting validation run");
                self.execute(project, &options, &mut run_id).await
            }
            Ok(None) => Err(CoreError::NotFound { entity: "ValidationProject", id: project_id }.into()),
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(summary) => {
                tracing::info!(
                    project_id,
                    run_id = summary.run_id,
                    composite_score = summary.composite_score,
                    recommendation = %summary.recommendation,
                    "Validation run complete"
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(project_id, run_id = ?run_id, error = %e, "Validation run failed");
                self.tracker
                    .log_event(
                        NewRunEvent::new(RunEventType::RunFailed)
                            .with_run(run_id)
                            .with_project(project_id)
                            .with_level(EventLevel::Error)
                            .with_message("Validation run failed")
                            .with_metadata(json!({ "error": e.to_string() })),
                    )
                    .await;
                if !matches!(e, PipelineError::Core(CoreError::NotFound { .. })) {
                    self.set_project_status(project_id, ProjectStatus::Error).await;
                }
                Err(e)
            }
        }
    }
}
