//! Job records and the views handed to callers.

use crate::config::JobConfig;
use crate::core::{ArtifactContent, ArtifactKey, JobStatus, PipelineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// A request to run the pipeline on one audio file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// The input audio file.
    pub audio_path: PathBuf,
    /// Caller-chosen job id; generated when absent.
    #[serde(default)]
    pub job_id: Option<String>,
    /// Output directory; `<results_root>/<job_id>` when absent.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Invoke every stage even if its artifacts already exist.
    #[serde(default)]
    pub force_rerun: bool,
}

impl SubmitRequest {
    /// Creates a request with a generated id and the default output directory.
    #[must_use]
    pub fn new(audio_path: impl Into<PathBuf>) -> Self {
        Self {
            audio_path: audio_path.into(),
            ..Self::default()
        }
    }

    /// Sets the job id.
    #[must_use]
    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    /// Sets whether cached artifacts are ignored.
    #[must_use]
    pub fn with_force_rerun(mut self, force_rerun: bool) -> Self {
        self.force_rerun = force_rerun;
        self
    }
}

/// What `submit` returns once the run has terminated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResult {
    /// The job id.
    pub job_id: String,
    /// Final job status.
    pub status: JobStatus,
    /// Where the artifacts were written.
    pub output_dir: PathBuf,
    /// The pipeline result, absent if the run itself crashed.
    pub result: Option<PipelineResult>,
    /// Fault outside any stage, if the run crashed.
    pub error: Option<String>,
}

/// Point-in-time status of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusView {
    /// The job id.
    pub job_id: String,
    /// Current status.
    pub status: JobStatus,
    /// Submission time.
    pub start_time: DateTime<Utc>,
    /// Termination time, once terminated.
    pub end_time: Option<DateTime<Utc>>,
    /// Run duration in seconds, once terminated.
    pub duration_secs: Option<f64>,
    /// The job's output directory.
    pub output_dir: PathBuf,
    /// Fault outside any stage, if the run crashed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The loaded artifacts of a finished job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsView {
    /// The job id.
    pub job_id: String,
    /// Final status; `completed` or `partially_completed`.
    pub status: JobStatus,
    /// The stored pipeline result.
    pub pipeline: PipelineResult,
    /// Artifact contents keyed like `pipeline.output_files`.
    pub outputs: BTreeMap<ArtifactKey, ArtifactContent>,
}

/// The registry's record of one submission.
#[derive(Debug, Clone)]
pub(crate) struct Job {
    pub(crate) config: Arc<JobConfig>,
    pub(crate) status: JobStatus,
    pub(crate) start_time: DateTime<Utc>,
    pub(crate) end_time: Option<DateTime<Utc>>,
    pub(crate) duration_secs: Option<f64>,
    pub(crate) result: Option<PipelineResult>,
    pub(crate) error: Option<String>,
}

impl Job {
    pub(crate) fn started(config: Arc<JobConfig>) -> Self {
        Self {
            config,
            status: JobStatus::Started,
            start_time: Utc::now(),
            end_time: None,
            duration_secs: None,
            result: None,
            error: None,
        }
    }

    pub(crate) fn finish(&mut self, result: Option<PipelineResult>, error: Option<String>) {
        let end_time = Utc::now();
        self.status = result
            .as_ref()
            .map_or(JobStatus::Failed, |result| result.status.into());
        self.duration_secs = Some(
            (end_time - self.start_time)
                .to_std()
                .map_or(0.0, |elapsed| elapsed.as_secs_f64()),
        );
        self.end_time = Some(end_time);
        self.result = result;
        self.error = error;
    }

    pub(crate) fn view(&self) -> StatusView {
        StatusView {
            job_id: self.config.job_id().to_string(),
            status: self.status,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_secs: self.duration_secs,
            output_dir: self.config.output_dir().to_path_buf(),
            error: self.error.clone(),
        }
    }
}
