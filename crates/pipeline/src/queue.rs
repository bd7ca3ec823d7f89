//! Durable run-job queue.
//!
//! At most one queued or running job exists per order. Workers claim the
//! oldest queued job with a conditional update; exactly one of several
//! concurrent claimants wins and the others see [`ClaimOutcome::ClaimLost`].
//! A driven job always leaves its order parked in `review`, and ends
//! `completed` or `failed` unless the job store rejects that write.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tokio::sync::Notify;
use wavelength_core::error::CoreError;
use wavelength_core::run_events::RunEventType;
use wavelength_core::types::DbId;
use wavelength_db::models::order::QueueMetadata;
use wavelength_db::models::run_job::{CreateRunJob, RunJob};
use wavelength_db::models::status::JobStatus;
use wavelength_db::store::{JobStore, RecordStore, StoreError, Stores};
use wavelength_events::{NewRunEvent, RunTelemetry};

use crate::error::PipelineResult;
use crate::orchestrator::{Orchestrator, RunOptions};

/// `requested_by` recorded when the caller gives none.
pub const DEFAULT_REQUESTED_BY: &str = "admin";

#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub order_id: DbId,
    pub project_id: DbId,
    pub requested_by: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnqueueOutcome {
    pub job: RunJob,
    pub already_active: bool,
}

#[derive(Debug)]
pub enum ClaimOutcome {
    Claimed(RunJob),
    NoQueuedJobs,
    /// Another worker claimed the job between read and update.
    ClaimLost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleReason {
    NoQueuedJobs,
    ClaimLost,
}

impl IdleReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoQueuedJobs => "no_queued_jobs",
            Self::ClaimLost => "claim_lost",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Idle(IdleReason),
    Processed {
        job_id: DbId,
        status: JobStatus,
        error: Option<String>,
    },
}

pub struct JobQueue {
    jobs: Arc<dyn JobStore>,
    records: Arc<dyn RecordStore>,
    telemetry: RunTelemetry,
    orchestrator: Arc<dyn Orchestrator>,
    notify: Arc<Notify>,
}

impl JobQueue {
    pub fn new(stores: &Stores, telemetry: RunTelemetry, orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self {
            jobs: stores.jobs.clone(),
            records: stores.records.clone(),
            telemetry,
            orchestrator,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Signalled after every successful enqueue.
    pub fn notifier(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    pub async fn find_job(&self, id: DbId) -> PipelineResult<Option<RunJob>> {
        Ok(self.jobs.find_job(id).await?)
    }

    /// Queue a run for `order_id`, or return the order's active job.
    pub async fn enqueue(&self, request: EnqueueRequest) -> PipelineResult<EnqueueOutcome> {
        if request.order_id <= 0 || request.project_id <= 0 {
            return Err(CoreError::Validation(
                "order_id and project_id are required".into(),
            )
            .into());
        }

        if let Some(job) = self.jobs.find_active_job(request.order_id).await? {
            return Ok(EnqueueOutcome { job, already_active: true });
        }

        let requested_by = request
            .requested_by
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_REQUESTED_BY)
            .to_string();
        let input = CreateRunJob {
            order_id: request.order_id,
            project_id: request.project_id,
            requested_by,
        };

        match self.jobs.insert_job(&input).await {
            Ok(job) => {
                tracing::info!(job_id = job.id, order_id = job.order_id, "Run job queued");
                self.notify.notify_one();
                Ok(EnqueueOutcome { job, already_active: false })
            }
            // Lost an insert race against another enqueue for the same order.
            Err(StoreError::Conflict(msg)) => {
                match self.jobs.find_active_job(request.order_id).await? {
                    Some(job) => Ok(EnqueueOutcome { job, already_active: true }),
                    None => Err(StoreError::Conflict(msg).into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Claim the oldest queued job.
    pub async fn claim_next(&self) -> PipelineResult<ClaimOutcome> {
        let Some(next) = self.jobs.oldest_queued_job().await? else {
            return Ok(ClaimOutcome::NoQueuedJobs);
        };

        match self.jobs.try_claim_job(next.id).await? {
            Some(job) => {
                tracing::info!(job_id = job.id, order_id = job.order_id, attempts = job.attempts, "Run job claimed");
                self.telemetry
                    .log(
                        NewRunEvent::new(RunEventType::JobClaimed)
                            .with_project(job.project_id)
                            .with_message("Run job claimed")
                            .with_metadata(json!({
                                "job_id": job.id,
                                "order_id": job.order_id,
                                "attempts": job.attempts,
                            })),
                    )
                    .await;
                Ok(ClaimOutcome::Claimed(job))
            }
            None => {
                tracing::debug!(job_id = next.id, "Claim lost to another worker");
                Ok(ClaimOutcome::ClaimLost)
            }
        }
    }

    /// Run a claimed job to a terminal state. Orchestrator failures are
    /// recorded on the job and order, never returned. The order is parked in
    /// review even when recording the job's terminal state fails; that store
    /// error is returned afterwards.
    pub async fn drive(&self, job: &RunJob) -> PipelineResult<ProcessOutcome> {
        self.update_order(
            job.order_id,
            QueueMetadata {
                queued_job_id: job.id,
                queue_status: "running".into(),
                last_error: None,
            },
            OrderStep::Running,
        )
        .await;

        let (status, error) = match self
            .orchestrator
            .run_validation(job.project_id, RunOptions::default())
            .await
        {
            Ok(summary) => {
                tracing::info!(job_id = job.id, run_id = summary.run_id, "Run job completed");
                (JobStatus::Completed, None)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(job_id = job.id, error = %message, "Run job failed");
                (JobStatus::Failed, Some(message))
            }
        };

        let recorded = match &error {
            None => self.jobs.complete_job(job.id).await,
            Some(message) => self.jobs.fail_job(job.id, message).await,
        };
        self.update_order(
            job.order_id,
            QueueMetadata {
                queued_job_id: job.id,
                queue_status: status.name().into(),
                last_error: error.clone(),
            },
            OrderStep::Review { completed: error.is_none() },
        )
        .await;
        if let Err(e) = recorded {
            tracing::error!(job_id = job.id, status = status.name(), error = %e, "Failed to record run job outcome");
            return Err(e.into());
        }

        Ok(ProcessOutcome::Processed {
            job_id: job.id,
            status,
            error,
        })
    }

    /// Claim one job and drive it.
    pub async fn process_next(&self) -> PipelineResult<ProcessOutcome> {
        match self.claim_next().await? {
            ClaimOutcome::Claimed(job) => self.drive(&job).await,
            ClaimOutcome::NoQueuedJobs => Ok(ProcessOutcome::Idle(IdleReason::NoQueuedJobs)),
            ClaimOutcome::ClaimLost => Ok(ProcessOutcome::Idle(IdleReason::ClaimLost)),
        }
    }

    async fn update_order(&self, order_id: DbId, metadata: QueueMetadata, step: OrderStep) {
        let result = match step {
            OrderStep::Running => self.records.mark_order_running(order_id, &metadata).await,
            OrderStep::Review { completed } => {
                self.records.mark_order_review(order_id, &metadata, completed).await
            }
        };
        if let Err(e) = result {
            tracing::warn!(order_id, queue_status = %metadata.queue_status, error = %e, "Failed to update order");
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum OrderStep {
    Running,
    Review { completed: bool },
}
