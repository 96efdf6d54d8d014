//! Aggregate result of one pipeline run.

use super::{ArtifactKey, PipelineStatus, StageOutcome};
use crate::errors::StageFault;
use crate::stages::StageId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Aggregate result of one pipeline run.
///
/// The executor mutates it as stages terminate; callers only ever see the
/// finished value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Overall status.
    pub status: PipelineStatus,
    /// Names of stages that succeeded, in completion order.
    pub steps_completed: Vec<String>,
    /// Rendered faults, `"<stage>: <message>"`.
    pub errors: Vec<String>,
    /// Artifact paths for every stage that produced output.
    pub output_files: BTreeMap<ArtifactKey, PathBuf>,
    /// Per-stage outcomes, in attempt order.
    #[serde(default)]
    pub stages: Vec<StageOutcome>,
}

impl PipelineResult {
    /// Creates an empty result in the `initialized` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a stage outcome into the aggregate.
    pub fn record(&mut self, outcome: StageOutcome) {
        if outcome.success {
            self.steps_completed.push(outcome.stage.to_string());
            self.output_files.extend(
                outcome
                    .artifacts
                    .iter()
                    .map(|(key, path)| (*key, path.clone())),
            );
        } else if let Some(fault) = outcome.fault() {
            self.errors.push(fault.to_string());
        }
        self.stages.push(outcome);
    }

    /// Records a fault that is not tied to a stage outcome.
    pub fn record_fault(&mut self, fault: &StageFault) {
        self.errors.push(fault.to_string());
    }

    /// Returns the outcome recorded for a stage, if it was attempted.
    #[must_use]
    pub fn outcome(&self, stage: StageId) -> Option<&StageOutcome> {
        self.stages.iter().find(|outcome| outcome.stage == stage)
    }

    /// Returns true if the stage was attempted and succeeded.
    #[must_use]
    pub fn succeeded(&self, stage: StageId) -> bool {
        self.outcome(stage).is_some_and(|outcome| outcome.success)
    }

    /// Returns true if the stage was attempted at all.
    #[must_use]
    pub fn attempted(&self, stage: StageId) -> bool {
        self.outcome(stage).is_some()
    }

    /// Returns the recorded path for an artifact.
    #[must_use]
    pub fn artifact(&self, key: ArtifactKey) -> Option<&Path> {
        self.output_files.get(&key).map(PathBuf::as_path)
    }

    /// Marks the run terminal.
    pub fn finish(&mut self, status: PipelineStatus) {
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_success_and_failure() {
        let mut result = PipelineResult::new();

        let mut artifacts = BTreeMap::new();
        artifacts.insert(ArtifactKey::Transcript, PathBuf::from("/jobs/a/whisper_transcript.txt"));
        result.record(StageOutcome::succeeded(StageId::Transcription, artifacts, 1.0));
        result.record(StageOutcome::failed(StageId::Diarization, "no speakers", 2.0));

        assert_eq!(result.steps_completed, vec!["transcription".to_string()]);
        assert_eq!(result.errors, vec!["diarization: no speakers".to_string()]);
        assert_eq!(
            result.artifact(ArtifactKey::Transcript),
            Some(Path::new("/jobs/a/whisper_transcript.txt"))
        );
        assert!(result.artifact(ArtifactKey::Diarization).is_none());
        assert!(result.succeeded(StageId::Transcription));
        assert!(!result.succeeded(StageId::Diarization));
        assert!(result.attempted(StageId::Diarization));
        assert!(!result.attempted(StageId::Alignment));
        assert_eq!(result.status, PipelineStatus::Initialized);
    }

    #[test]
    fn test_serialization_uses_snake_case_keys() {
        let mut result = PipelineResult::new();
        let mut artifacts = BTreeMap::new();
        artifacts.insert(ArtifactKey::SentimentInput, PathBuf::from("in.json"));
        result.record(StageOutcome::cached(StageId::Alignment, artifacts));
        result.finish(PipelineStatus::Completed);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["output_files"]["sentiment_input"], "in.json");
        assert_eq!(json["steps_completed"][0], "alignment");
    }
}
