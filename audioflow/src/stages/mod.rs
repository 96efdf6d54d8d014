//! Stage identifiers, the stage trait and stage lookup.
//!
//! Stages are the opaque units of work in an audioflow pipeline. Every
//! stage is addressed by a [`StageId`], which also carries the stage's
//! dependencies, declared artifacts and failure policy, so the dependency
//! graph is plain data rather than implicit call order.

mod alignment;
mod command;

pub use alignment::{align_segments, Alignment, AlignmentStage};
pub use command::CommandStage;

use crate::config::JobConfig;
use crate::core::ArtifactKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::str::FromStr;
use std::sync::Arc;

/// Identifies one stage of the analysis pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Speech-to-text over the whole input.
    Transcription,
    /// Speaker segmentation.
    Diarization,
    /// Apportions transcript words to speaker segments.
    Alignment,
    /// Per-segment sentiment scoring.
    Sentiment,
    /// Transcript summarization.
    Summarization,
}

/// What a stage failure means for the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Failure aborts the run; downstream stages have no valid input.
    Required,
    /// Failure is recorded and siblings keep running.
    Optional,
}

impl StageId {
    /// Every stage, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Transcription,
        Self::Diarization,
        Self::Alignment,
        Self::Sentiment,
        Self::Summarization,
    ];

    /// The snake-case stage name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transcription => "transcription",
            Self::Diarization => "diarization",
            Self::Alignment => "alignment",
            Self::Sentiment => "sentiment",
            Self::Summarization => "summarization",
        }
    }

    /// Stages whose outputs this stage consumes.
    #[must_use]
    pub fn dependencies(&self) -> &'static [Self] {
        match self {
            Self::Transcription | Self::Diarization => &[],
            Self::Alignment => &[Self::Transcription, Self::Diarization],
            Self::Sentiment | Self::Summarization => &[Self::Alignment],
        }
    }

    /// Artifacts the stage must leave behind on success.
    #[must_use]
    pub fn outputs(&self) -> &'static [ArtifactKey] {
        match self {
            Self::Transcription => &[ArtifactKey::Transcript],
            Self::Diarization => &[ArtifactKey::Diarization],
            Self::Alignment => &[
                ArtifactKey::Aligned,
                ArtifactKey::Formatted,
                ArtifactKey::SentimentInput,
            ],
            Self::Sentiment => &[ArtifactKey::Sentiment],
            Self::Summarization => &[ArtifactKey::Summary],
        }
    }

    /// How a failure of this stage affects the run.
    #[must_use]
    pub fn failure_policy(&self) -> FailurePolicy {
        match self {
            Self::Transcription | Self::Diarization | Self::Alignment => FailurePolicy::Required,
            Self::Sentiment | Self::Summarization => FailurePolicy::Optional,
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("unknown stage '{s}'"))
    }
}

/// Trait for pipeline stages.
///
/// A stage reads its inputs from, and writes its declared artifacts to, the
/// paths in the [`JobConfig`]. Returning `Ok(())` claims every artifact in
/// [`StageId::outputs`] was written; the executor verifies the claim.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the stage this implementation fulfils.
    fn id(&self) -> StageId;

    /// Runs the stage for one job.
    async fn invoke(&self, config: &JobConfig) -> anyhow::Result<()>;
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(&JobConfig) -> anyhow::Result<()> + Send + Sync,
{
    id: StageId,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&JobConfig) -> anyhow::Result<()> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(id: StageId, func: F) -> Self {
        Self { id, func }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&JobConfig) -> anyhow::Result<()> + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStage").field("id", &self.id).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&JobConfig) -> anyhow::Result<()> + Send + Sync,
{
    fn id(&self) -> StageId {
        self.id
    }

    async fn invoke(&self, config: &JobConfig) -> anyhow::Result<()> {
        (self.func)(config)
    }
}

/// Lookup table from stage id to implementation.
///
/// A new set already contains the built-in [`AlignmentStage`]; callers add
/// the model-backed stages.
#[derive(Debug, Clone)]
pub struct StageSet {
    stages: HashMap<StageId, Arc<dyn Stage>>,
}

impl Default for StageSet {
    fn default() -> Self {
        Self::new()
    }
}

impl StageSet {
    /// Creates a set holding only the built-in alignment stage.
    #[must_use]
    pub fn new() -> Self {
        Self::empty().with_stage(AlignmentStage)
    }

    /// Creates a set with no stages at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            stages: HashMap::new(),
        }
    }

    /// Registers a stage, replacing any previous implementation for its id.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.insert(Arc::new(stage));
        self
    }

    /// Registers a shared stage implementation.
    pub fn insert(&mut self, stage: Arc<dyn Stage>) {
        self.stages.insert(stage.id(), stage);
    }

    /// Returns the implementation registered for a stage.
    #[must_use]
    pub fn get(&self, id: StageId) -> Option<Arc<dyn Stage>> {
        self.stages.get(&id).cloned()
    }

    /// Stages with no registered implementation.
    #[must_use]
    pub fn missing(&self) -> Vec<StageId> {
        StageId::ALL
            .into_iter()
            .filter(|id| !self.stages.contains_key(id))
            .collect()
    }
}
