//! Outcome of a single stage attempt.

use super::ArtifactKey;
use crate::errors::StageFault;
use crate::stages::StageId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The result of one stage attempt.
///
/// There are no partial outcomes: either every declared artifact is
/// recorded and `success` is true, or `error` is set and `artifacts` is
/// empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    /// The stage this outcome belongs to.
    pub stage: StageId,
    /// Whether the stage succeeded.
    pub success: bool,
    /// Whether the stage was satisfied from existing artifacts.
    #[serde(default)]
    pub cached: bool,
    /// Artifacts produced (or reused) on success.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub artifacts: BTreeMap<ArtifactKey, PathBuf>,
    /// Error description on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock duration of the attempt in milliseconds.
    pub duration_ms: f64,
}

impl StageOutcome {
    /// Creates a successful outcome for a freshly executed stage.
    #[must_use]
    pub fn succeeded(
        stage: StageId,
        artifacts: BTreeMap<ArtifactKey, PathBuf>,
        duration_ms: f64,
    ) -> Self {
        Self {
            stage,
            success: true,
            cached: false,
            artifacts,
            error: None,
            duration_ms,
        }
    }

    /// Creates a successful outcome satisfied from cache.
    #[must_use]
    pub fn cached(stage: StageId, artifacts: BTreeMap<ArtifactKey, PathBuf>) -> Self {
        Self {
            stage,
            success: true,
            cached: true,
            artifacts,
            error: None,
            duration_ms: 0.0,
        }
    }

    /// Creates a failed outcome.
    #[must_use]
    pub fn failed(stage: StageId, message: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            stage,
            success: false,
            cached: false,
            artifacts: BTreeMap::new(),
            error: Some(message.into()),
            duration_ms,
        }
    }

    /// The fault to record in the pipeline result, if the stage failed.
    #[must_use]
    pub fn fault(&self) -> Option<StageFault> {
        self.error
            .as_ref()
            .map(|message| StageFault::new(self.stage, message.clone()))
    }
}
