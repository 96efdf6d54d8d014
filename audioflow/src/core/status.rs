//! Pipeline and job status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The aggregate status of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// The run has not terminated yet.
    #[default]
    Initialized,
    /// A required stage failed, or the run was cancelled.
    Failed,
    /// Required stages succeeded but at least one optional stage did not.
    PartiallyCompleted,
    /// Every stage succeeded.
    Completed,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized => write!(f, "initialized"),
            Self::Failed => write!(f, "failed"),
            Self::PartiallyCompleted => write!(f, "partially_completed"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl PipelineStatus {
    /// Returns true once the run has terminated.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Initialized)
    }

    /// Returns true if the run produced results worth collecting.
    #[must_use]
    pub fn has_results(&self) -> bool {
        matches!(self, Self::Completed | Self::PartiallyCompleted)
    }
}

/// The status of a job as tracked by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Submitted and running.
    Started,
    /// Mirrors [`PipelineStatus::Initialized`].
    Initialized,
    /// The run failed, or never produced a result.
    Failed,
    /// Mirrors [`PipelineStatus::PartiallyCompleted`].
    PartiallyCompleted,
    /// Mirrors [`PipelineStatus::Completed`].
    Completed,
}

impl From<PipelineStatus> for JobStatus {
    fn from(status: PipelineStatus) -> Self {
        match status {
            PipelineStatus::Initialized => Self::Initialized,
            PipelineStatus::Failed => Self::Failed,
            PipelineStatus::PartiallyCompleted => Self::PartiallyCompleted,
            PipelineStatus::Completed => Self::Completed,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Initialized => write!(f, "initialized"),
            Self::Failed => write!(f, "failed"),
            Self::PartiallyCompleted => write!(f, "partially_completed"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl JobStatus {
    /// Returns true if results may be requested for the job.
    #[must_use]
    pub fn has_results(&self) -> bool {
        matches!(self, Self::Completed | Self::PartiallyCompleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_status_display() {
        assert_eq!(PipelineStatus::Initialized.to_string(), "initialized");
        assert_eq!(PipelineStatus::PartiallyCompleted.to_string(), "partially_completed");
        assert_eq!(PipelineStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn test_pipeline_status_terminal() {
        assert!(!PipelineStatus::Initialized.is_terminal());
        assert!(PipelineStatus::Failed.is_terminal());
        assert!(PipelineStatus::PartiallyCompleted.is_terminal());
        assert!(PipelineStatus::Completed.is_terminal());
    }

    #[test]
    fn test_job_status_mirrors_pipeline_status() {
        assert_eq!(JobStatus::from(PipelineStatus::Failed), JobStatus::Failed);
        assert_eq!(
            JobStatus::from(PipelineStatus::PartiallyCompleted),
            JobStatus::PartiallyCompleted
        );
        assert!(JobStatus::from(PipelineStatus::Completed).has_results());
        assert!(!JobStatus::Started.has_results());
        assert!(!JobStatus::Failed.has_results());
    }

    #[test]
    fn test_status_serialize() {
        let json = serde_json::to_string(&JobStatus::PartiallyCompleted).unwrap();
        assert_eq!(json, r#""partially_completed""#);

        let status: PipelineStatus = serde_json::from_str(r#""failed""#).unwrap();
        assert_eq!(status, PipelineStatus::Failed);
    }
}
