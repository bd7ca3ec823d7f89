//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] fans out every [`NewRunEvent`] logged through
//! [`RunTelemetry`](crate::telemetry::RunTelemetry). It is shared via
//! `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use wavelength_core::run_events::{EventLevel, RunEventType};
use wavelength_core::types::DbId;
use wavelength_db::models::run_event::CreateRunEvent;

// ---------------------------------------------------------------------------
// NewRunEvent
// ---------------------------------------------------------------------------

/// A telemetry event about a run or one of its stages.
///
/// Constructed via [`NewRunEvent::new`] and enriched with the builder
/// methods. `pipeline_run_id` may stay `None` for events logged before a
/// run record exists; those are joined to the run by project and time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRunEvent {
    pub event_type: RunEventType,
    pub pipeline_run_id: Option<DbId>,
    pub project_id: Option<DbId>,
    pub stage_key: Option<String>,
    pub level: EventLevel,
    pub message: Option<String>,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl NewRunEvent {
    /// Create an `info` event with no run, project, or stage attached.
    pub fn new(event_type: RunEventType) -> Self {
        Self {
            event_type,
            pipeline_run_id: None,
            project_id: None,
            stage_key: None,
            level: EventLevel::Info,
            message: None,
            metadata: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_run(mut self, run_id: Option<DbId>) -> Self {
        self.pipeline_run_id = run_id;
        self
    }

    pub fn with_project(mut self, project_id: DbId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn with_stage(mut self, stage_key: impl Into<String>) -> Self {
        self.stage_key = Some(stage_key.into());
        self
    }

    pub fn with_level(mut self, level: EventLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Insert DTO for the event store.
    pub fn to_create(&self) -> CreateRunEvent {
        CreateRunEvent {
            pipeline_run_id: self.pipeline_run_id,
            project_id: self.project_id,
            event_type: self.event_type,
            stage_key: self.stage_key.clone(),
            level: self.level,
            message: self.message.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<NewRunEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: NewRunEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NewRunEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(
            NewRunEvent::new(RunEventType::StageFailed)
                .with_run(Some(3))
                .with_project(9)
                .with_stage("labor_market")
                .with_level(EventLevel::Error)
                .with_metadata(serde_json::json!({ "attempt": 2 })),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, RunEventType::StageFailed);
        assert_eq!(received.pipeline_run_id, Some(3));
        assert_eq!(received.project_id, Some(9));
        assert_eq!(received.stage_key.as_deref(), Some("labor_market"));
        assert_eq!(received.metadata["attempt"], 2);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(NewRunEvent::new(RunEventType::RunStarted));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1.event_type, RunEventType::RunStarted);
        assert_eq!(e2.event_type, RunEventType::RunStarted);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(NewRunEvent::new(RunEventType::RunCompleted));
    }

    #[test]
    fn default_event_is_info_without_run() {
        let event = NewRunEvent::new(RunEventType::StageStarted);
        assert_eq!(event.level, EventLevel::Info);
        assert!(event.pipeline_run_id.is_none());
        assert!(event.metadata.is_object());

        let create = event.to_create();
        assert_eq!(create.event_type, RunEventType::StageStarted);
        assert!(create.stage_key.is_none());
    }
}
