//! Durable run pipeline for program validation.
//!
//! - [`queue`]: one active job per order, CAS claims, drive to a terminal
//!   state.
//! - [`checkpoints`] and [`stage`]: per-phase checkpoints and the retrying
//!   stage runner that emits stage telemetry.
//! - [`context`] and [`cache`]: shared per-run external data with a cached
//!   fallback chain.
//! - [`tracker`]: run records, manual resume, health and timelines.
//! - [`orchestrator`]: the eight-phase validation run.
//! - [`providers`] and [`http`]: collaborator traits and their HTTP adapters.

pub mod cache;
pub mod checkpoints;
pub mod context;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod providers;
pub mod queue;
pub mod report;
pub mod services;
pub mod settings;
pub mod stage;
pub mod tracker;

pub use error::{PipelineError, PipelineResult};
pub use services::PipelineServices;
