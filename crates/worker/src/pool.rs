//! Fixed-size pool of queue workers.
//!
//! Each worker loops on [`JobQueue::process_next`]. When the queue is empty
//! (or the store errors) it parks until the enqueue notifier fires, the poll
//! interval elapses, or the pool is cancelled. Cancellation is only observed
//! between jobs, so an in-flight run is never torn down half way.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use wavelength_pipeline::queue::{IdleReason, JobQueue, ProcessOutcome};

use crate::config::WorkerConfig;

pub struct WorkerPool {
    queue: Arc<JobQueue>,
    config: WorkerConfig,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

impl WorkerPool {
    pub fn new(queue: Arc<JobQueue>, config: WorkerConfig) -> Self {
        Self {
            queue,
            config,
            cancel: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Token that stops every worker once cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn the configured number of workers. Returns how many were started.
    pub fn start(&self) -> usize {
        let count = self.config.worker_count;
        for worker_id in 0..count {
            self.tasks.spawn(run_worker(
                worker_id,
                self.queue.clone(),
                self.queue.notifier(),
                self.config.poll_interval,
                self.cancel.clone(),
            ));
        }
        if count > 0 {
            tracing::info!(
                workers = count,
                poll_interval_ms = self.config.poll_interval.as_millis() as u64,
                "Worker pool started",
            );
        }
        count
    }

    /// Stop accepting new jobs and wait for in-flight ones.
    ///
    /// Returns `false` when the shutdown timeout elapsed first; the
    /// remaining jobs are left in `running`.
    pub async fn shutdown(&self) -> bool {
        self.cancel.cancel();
        self.tasks.close();
        match tokio::time::timeout(self.config.shutdown_timeout, self.tasks.wait()).await {
            Ok(()) => {
                tracing::info!("Worker pool drained");
                true
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.config.shutdown_timeout.as_secs(),
                    still_running = self.tasks.len(),
                    "Worker pool shutdown timed out",
                );
                false
            }
        }
    }
}

async fn run_worker(
    worker_id: usize,
    queue: Arc<JobQueue>,
    notify: Arc<Notify>,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    tracing::debug!(worker_id, "Worker started");
    loop {
        if cancel.is_cancelled() {
            break;
        }

        match queue.process_next().await {
            Ok(ProcessOutcome::Processed { job_id, status, error }) => {
                match error {
                    Some(error) => tracing::warn!(worker_id, job_id, status = %status, error = %error, "Job failed"),
                    None => tracing::info!(worker_id, job_id, status = %status, "Job finished"),
                }
                continue;
            }
            // Another worker won the race; there may be more work behind it.
            Ok(ProcessOutcome::Idle(IdleReason::ClaimLost)) => continue,
            Ok(ProcessOutcome::Idle(IdleReason::NoQueuedJobs)) => {}
            Err(e) => tracing::error!(worker_id, error = %e, "Failed to process run job"),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = notify.notified() => {}
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
    tracing::debug!(worker_id, "Worker stopped");
}
