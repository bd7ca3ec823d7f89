use std::sync::Arc;

use tokio_util::task::TaskTracker;
use wavelength_pipeline::PipelineServices;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every member is an `Arc` or a bundle of them.
#[derive(Clone)]
pub struct AppState {
    /// Queue, tracker, checkpoints and orchestrator over the configured stores.
    pub services: PipelineServices,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Jobs claimed by `process-next`. Each one runs to a terminal state
    /// even if its request is dropped; shutdown waits on this tracker.
    pub runs: TaskTracker,
}
