//! Best-effort run telemetry.
//!
//! Telemetry describes a run; it never decides its outcome. A failed append
//! is logged at `warn` and swallowed, and the event is still published on
//! the bus.

use std::sync::Arc;

use wavelength_core::types::DbId;
use wavelength_db::store::EventStore;

use crate::bus::{EventBus, NewRunEvent};

/// Appends run events and fans them out on the [`EventBus`].
#[derive(Clone)]
pub struct RunTelemetry {
    store: Arc<dyn EventStore>,
    bus: Arc<EventBus>,
}

impl RunTelemetry {
    pub fn new(store: Arc<dyn EventStore>, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Record one event. Returns the stored row id, or `None` when the write
    /// failed.
    pub async fn log(&self, event: NewRunEvent) -> Option<DbId> {
        let stored = match self.store.append_event(&event.to_create()).await {
            Ok(row) => Some(row.id),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    event_type = %event.event_type,
                    run_id = ?event.pipeline_run_id,
                    "Failed to persist run event"
                );
                None
            }
        };
        self.bus.publish(event);
        stored
    }
}
