//! Run-job workers.
//!
//! [`WorkerPool`] runs a fixed number of tasks that each claim and drive
//! jobs from the pipeline's [`JobQueue`](wavelength_pipeline::queue::JobQueue).
//! The pool is used by the standalone `wavelength-worker` binary and can be
//! embedded in the API server.

pub mod config;
pub mod pool;
pub mod runtime;

pub use config::WorkerConfig;
pub use pool::WorkerPool;
