//! Artifact keys and on-disk artifact handling.

use crate::errors::ArtifactLoadError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Logical name of a persisted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKey {
    /// Speaker segments produced by diarization.
    Diarization,
    /// Flat transcript text.
    Transcript,
    /// Per-segment structured transcript.
    Aligned,
    /// Human-readable `speaker: text` transcript.
    Formatted,
    /// Sentiment scoring input keyed by timestamp range.
    SentimentInput,
    /// Sentiment scores per segment.
    Sentiment,
    /// Summary text.
    Summary,
}

impl ArtifactKey {
    /// Every artifact key, in pipeline order.
    pub const ALL: [Self; 7] = [
        Self::Diarization,
        Self::Transcript,
        Self::Aligned,
        Self::Formatted,
        Self::SentimentInput,
        Self::Sentiment,
        Self::Summary,
    ];

    /// The snake-case name used in maps and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Diarization => "diarization",
            Self::Transcript => "transcript",
            Self::Aligned => "aligned",
            Self::Formatted => "formatted",
            Self::SentimentInput => "sentiment_input",
            Self::Sentiment => "sentiment",
            Self::Summary => "summary",
        }
    }

    /// Default file name within a job directory.
    #[must_use]
    pub fn default_file_name(&self) -> &'static str {
        match self {
            Self::Diarization => "diarization_result.json",
            Self::Transcript => "whisper_transcript.txt",
            Self::Aligned => "aligned_transcript.json",
            Self::Formatted => "formatted_transcript.txt",
            Self::SentimentInput => "indicbert_input.json",
            Self::Sentiment => "sentiment_results.json",
            Self::Summary => "summary_output.txt",
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true if `path` exists and is a non-empty file.
///
/// This is the only signal used to decide whether a stage can be skipped.
pub async fn artifact_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

/// Returns true if `path` is a file, empty or not.
///
/// A stage that reports success must at least have created each declared
/// artifact; an empty transcript from silent audio is still an output.
pub async fn artifact_written(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file())
}

/// Loaded contents of one artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ArtifactContent {
    /// Parsed JSON document.
    Json(serde_json::Value),
    /// Raw text.
    Text(String),
    /// The artifact could not be loaded.
    Error(String),
}

impl ArtifactContent {
    /// Returns true if loading failed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Loads an artifact from disk.
///
/// Paths ending in `.json` are parsed, anything else is read as text.
pub async fn load_artifact(path: &Path) -> Result<ArtifactContent, ArtifactLoadError> {
    if !artifact_written(path).await {
        return Err(ArtifactLoadError::Missing {
            path: path.to_path_buf(),
        });
    }

    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ArtifactLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        let value = serde_json::from_str(&raw).map_err(|source| ArtifactLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(ArtifactContent::Json(value))
    } else {
        Ok(ArtifactContent::Text(raw))
    }
}
