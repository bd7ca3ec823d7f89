//! Mirrors bus events into `tracing`.
//!
//! [`EventLogSink`] subscribes to the [`EventBus`](crate::bus::EventBus) and
//! emits one log line per run event at the event's own level. It runs as a
//! long-lived background task and exits when the bus is dropped.

use tokio::sync::broadcast;
use wavelength_core::run_events::EventLevel;

use crate::bus::NewRunEvent;

pub struct EventLogSink;

impl EventLogSink {
    /// Run the mirroring loop until the channel closes.
    pub async fn run(mut receiver: broadcast::Receiver<NewRunEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => Self::emit(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Run event log sink lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, run event log sink shutting down");
                    break;
                }
            }
        }
    }

    fn emit(event: &NewRunEvent) {
        let message = event.message.as_deref().unwrap_or("");
        match event.level {
            EventLevel::Info => tracing::info!(
                event_type = %event.event_type,
                run_id = ?event.pipeline_run_id,
                project_id = ?event.project_id,
                stage = ?event.stage_key,
                metadata = %event.metadata,
                "{message}"
            ),
            EventLevel::Warn => tracing::warn!(
                event_type = %event.event_type,
                run_id = ?event.pipeline_run_id,
                project_id = ?event.project_id,
                stage = ?event.stage_key,
                metadata = %event.metadata,
                "{message}"
            ),
            EventLevel::Error => tracing::error!(
                event_type = %event.event_type,
                run_id = ?event.pipeline_run_id,
                project_id = ?event.project_id,
                stage = ?event.stage_key,
                metadata = %event.metadata,
                "{message}"
            ),
        }
    }
}
