//! # Audioflow
//!
//! Job execution engine for multi-stage audio analysis.
//!
//! A job takes one audio file through a fixed dependency graph of stages:
//!
//! - **transcription** and **diarization** run first, concurrently
//! - **alignment** apportions transcript words to speaker turns
//! - **sentiment** and **summarization** run last, concurrently
//!
//! Every stage exchanges data through files in the job's output directory.
//! A stage whose artifacts already exist is skipped unless a rerun is
//! forced, and a failing late stage leaves the earlier results usable.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use audioflow::prelude::*;
//!
//! let stages = StageSet::new()
//!     .with_stage(CommandStage::new(StageId::Transcription, "whisper-cli")
//!         .with_args(["{audio}", "--model", "{model}", "--out", "{transcript}"]));
//! let registry = JobRegistry::new(PipelineConfig::new().with_env_overrides(), stages);
//!
//! let submitted = registry.submit(SubmitRequest::new("meeting.mp3")).await?;
//! let results = registry.results(&submitted.job_id).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod registry;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{ConfigOverrides, JobConfig, PipelineConfig};
    pub use crate::core::{
        ArtifactContent, ArtifactKey, JobStatus, PipelineResult, PipelineStatus, StageOutcome,
    };
    pub use crate::errors::{AudioflowError, StageFault};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{build_subscriber, init_tracing, LogFormat};
    pub use crate::pipeline::{PipelineExecutor, StageGraph};
    pub use crate::registry::{JobRegistry, ResultsView, StatusView, SubmitRequest, SubmitResult};
    pub use crate::stages::{
        AlignmentStage, CommandStage, FailurePolicy, FnStage, Stage, StageId, StageSet,
    };
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn prelude_exposes_registry() {
        let registry = JobRegistry::new(PipelineConfig::new(), StageSet::new());
        assert!(registry.list().is_empty());
        assert_eq!(StageGraph::standard().stage_count(), StageId::ALL.len());
    }
}
