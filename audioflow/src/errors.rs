//! Error types for the audioflow engine.
//!
//! Registry-level failures are surfaced as [`AudioflowError`]. Stage-level
//! failures never cross the executor boundary as errors; they are captured
//! as [`StageFault`] values and stored in the pipeline result.

use crate::core::JobStatus;
use crate::stages::StageId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for audioflow operations.
#[derive(Debug, Error)]
pub enum AudioflowError {
    /// The job id is unknown to the registry.
    #[error("Job not found: {job_id}")]
    NotFound {
        /// The requested job id.
        job_id: String,
    },

    /// Results were requested before the job reached a success-bearing status.
    #[error("Results not available for job {job_id} (status: {status})")]
    NotReady {
        /// The requested job id.
        job_id: String,
        /// The job's current status.
        status: JobStatus,
    },

    /// A job with the same id is still running.
    #[error("Job {job_id} is already running")]
    JobInProgress {
        /// The conflicting job id.
        job_id: String,
    },

    /// The caller-supplied job id cannot be used as a directory name.
    #[error("Invalid job id '{job_id}': must match [A-Za-z0-9][A-Za-z0-9_.-]*")]
    InvalidJobId {
        /// The rejected job id.
        job_id: String,
    },

    /// The pipeline configuration is unusable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AudioflowError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(job_id: impl Into<String>) -> Self {
        Self::NotFound {
            job_id: job_id.into(),
        }
    }

    /// Creates a not-ready error.
    #[must_use]
    pub fn not_ready(job_id: impl Into<String>, status: JobStatus) -> Self {
        Self::NotReady {
            job_id: job_id.into(),
            status,
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Short machine-readable code, used by front ends to pick a status code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::NotReady { .. } => "not_ready",
            Self::JobInProgress { .. } => "job_in_progress",
            Self::InvalidJobId { .. } => "invalid_job_id",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map.insert("error".to_string(), serde_json::json!(self.to_string()));

        match self {
            Self::NotFound { job_id }
            | Self::JobInProgress { job_id }
            | Self::InvalidJobId { job_id } => {
                map.insert("job_id".to_string(), serde_json::json!(job_id));
            }
            Self::NotReady { job_id, status } => {
                map.insert("job_id".to_string(), serde_json::json!(job_id));
                map.insert("status".to_string(), serde_json::json!(status));
            }
            Self::Config(_) | Self::Serialization(_) | Self::Io(_) => {}
        }

        map
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = AudioflowError> = std::result::Result<T, E>;

/// A failure of a single stage invocation.
///
/// The rendered form (`"<stage>: <message>"`) is what ends up in
/// `PipelineResult::errors`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{stage}: {message}")]
pub struct StageFault {
    /// The stage that failed, or `pipeline` for faults outside any stage.
    pub stage: String,
    /// The error message.
    pub message: String,
}

impl StageFault {
    /// Creates a fault attributed to a stage.
    #[must_use]
    pub fn new(stage: StageId, message: impl Into<String>) -> Self {
        Self {
            stage: stage.to_string(),
            message: message.into(),
        }
    }

    /// Creates a fault raised by the executor itself.
    #[must_use]
    pub fn pipeline(message: impl Into<String>) -> Self {
        Self {
            stage: "pipeline".to_string(),
            message: message.into(),
        }
    }

    /// Builds a fault from an `anyhow` error, keeping the full context chain.
    #[must_use]
    pub fn from_anyhow(stage: StageId, err: &anyhow::Error) -> Self {
        Self::new(stage, format!("{err:#}"))
    }
}

/// An artifact listed as produced that could not be read or parsed.
#[derive(Debug, Error)]
pub enum ArtifactLoadError {
    /// The file does not exist.
    #[error("artifact missing at {}", path.display())]
    Missing {
        /// The artifact path.
        path: PathBuf,
    },

    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// The artifact path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// The artifact path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_fault_display() {
        let fault = StageFault::new(StageId::Diarization, "model unavailable");
        assert_eq!(fault.to_string(), "diarization: model unavailable");
    }

    #[test]
    fn test_stage_fault_keeps_anyhow_context() {
        let err = anyhow::anyhow!("file not found").context("loading transcript");
        let fault = StageFault::from_anyhow(StageId::Alignment, &err);

        assert_eq!(fault.stage, "alignment");
        assert_eq!(fault.message, "loading transcript: file not found");
    }

    #[test]
    fn test_pipeline_fault() {
        let fault = StageFault::pipeline("cancelled: shutdown");
        assert_eq!(fault.to_string(), "pipeline: cancelled: shutdown");
    }

    #[test]
    fn test_not_ready_to_dict() {
        let err = AudioflowError::not_ready("job-1", JobStatus::Failed);
        let dict = err.to_dict();

        assert_eq!(dict.get("code").unwrap(), "not_ready");
        assert_eq!(dict.get("job_id").unwrap(), "job-1");
        assert_eq!(dict.get("status").unwrap(), "failed");
    }

    #[test]
    fn test_not_found_message() {
        let err = AudioflowError::not_found("missing");
        assert_eq!(err.to_string(), "Job not found: missing");
        assert_eq!(err.code(), "not_found");
    }
}
