//! Run telemetry for the Wavelength pipeline.
//!
//! - [`NewRunEvent`]: builder for one stage/run telemetry record.
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`RunTelemetry`]: best-effort writer that appends events to the event
//!   store and publishes them on the bus. Write failures never propagate.
//! - [`EventLogSink`]: background task mirroring bus events into `tracing`.

pub mod bus;
pub mod log_sink;
pub mod telemetry;

pub use bus::{EventBus, NewRunEvent};
pub use log_sink::EventLogSink;
pub use telemetry::RunTelemetry;
