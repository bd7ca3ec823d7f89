pub mod checkpoints;
pub mod health;
pub mod pipeline_runs;
pub mod run_jobs;
