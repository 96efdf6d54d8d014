//! Testing utilities for audioflow pipelines.
//!
//! This module provides:
//! - Scripted and failing stages
//! - Sample artifact contents matching the on-disk formats

mod fixtures;
mod mocks;

pub use fixtures::{
    sample_artifact, sample_segments, scripted_stages, write_artifacts, SAMPLE_TRANSCRIPT,
};
pub use mocks::{FailingStage, ScriptedStage};
