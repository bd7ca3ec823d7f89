//! Row structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A create DTO for inserts where the pipeline inserts rows

pub mod api_cache;
pub mod checkpoint;
pub mod order;
pub mod pipeline_run;
pub mod project;
pub mod run_event;
pub mod run_job;
pub mod status;
