//! Lifecycle events emitted while a job runs.
//!
//! The executor reports every stage transition to an [`EventSink`]. The
//! default sink writes them to the `tracing` log.

mod sink;

#[cfg(test)]
pub use sink::MockEventSink;
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A stage invocation is about to start.
pub const STAGE_STARTED: &str = "stage.started";
/// A stage was satisfied from existing artifacts.
pub const STAGE_CACHED: &str = "stage.cached";
/// A stage succeeded.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// A stage failed.
pub const STAGE_FAILED: &str = "stage.failed";
/// The run terminated.
pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
