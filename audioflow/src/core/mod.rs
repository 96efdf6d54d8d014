//! Core domain model types for audioflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - Pipeline and job status enums
//! - Stage outcomes and the aggregate pipeline result
//! - Artifact keys and the record types stored in artifacts

mod artifact;
mod outcome;
mod result;
mod segments;
mod status;

pub use artifact::{
    artifact_exists, artifact_written, load_artifact, ArtifactContent, ArtifactKey,
};
pub use outcome::StageOutcome;
pub use result::PipelineResult;
pub use segments::{
    AlignedSegment, SentimentInput, SentimentLabel, SentimentRecord, SpeakerSegment,
};
pub use status::{JobStatus, PipelineStatus};
