//! Pure domain logic for the Wavelength run pipeline.
//!
//! Nothing in this crate performs I/O. Storage, telemetry and agent calls
//! live in the `db`, `events` and `pipeline` crates and call into the
//! functions here.

pub mod error;
pub mod hashing;
pub mod health;
pub mod model_profile;
pub mod occupation;
pub mod phases;
pub mod report_id;
pub mod run_config;
pub mod run_events;
pub mod run_key;
pub mod scoring;
pub mod types;
