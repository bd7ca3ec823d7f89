//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod api_cache_repo;
pub mod checkpoint_repo;
pub mod order_repo;
pub mod pipeline_run_repo;
pub mod project_repo;
pub mod run_event_repo;
pub mod run_job_repo;

pub use api_cache_repo::ApiCacheRepo;
pub use checkpoint_repo::CheckpointRepo;
pub use order_repo::OrderRepo;
pub use pipeline_run_repo::PipelineRunRepo;
pub use project_repo::ProjectRepo;
pub use run_event_repo::RunEventRepo;
pub use run_job_repo::RunJobRepo;
