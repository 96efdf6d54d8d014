//! Sample artifact contents and ready-made stage sets.

use crate::config::JobConfig;
use crate::core::{ArtifactKey, SentimentInput, SentimentRecord, SpeakerSegment};
use crate::stages::{StageId, StageSet};
use std::io;

use super::ScriptedStage;

/// Transcript matching [`sample_segments`]: two equal turns of four words.
pub const SAMPLE_TRANSCRIPT: &str = "a b c d e f g h";

/// Two back-to-back two-second speaker turns.
#[must_use]
pub fn sample_segments() -> Vec<SpeakerSegment> {
    vec![
        SpeakerSegment::new("SPEAKER_0", 0.0, 2.0),
        SpeakerSegment::new("SPEAKER_1", 2.0, 4.0),
    ]
}

/// Plausible content for an artifact, valid for whichever stage reads it.
#[must_use]
pub fn sample_artifact(key: ArtifactKey) -> String {
    match key {
        ArtifactKey::Diarization => json(&sample_segments()),
        ArtifactKey::Transcript => SAMPLE_TRANSCRIPT.to_string(),
        ArtifactKey::Aligned => json(&serde_json::json!([
            { "speaker": "SPEAKER_0", "start": 0.0, "end": 2.0, "text": "a b c d" },
            { "speaker": "SPEAKER_1", "start": 2.0, "end": 4.0, "text": "e f g h" },
        ])),
        ArtifactKey::Formatted => "SPEAKER_0: a b c d\nSPEAKER_1: e f g h".to_string(),
        ArtifactKey::SentimentInput => json(&sample_inputs()),
        ArtifactKey::Sentiment => json(
            &sample_inputs()
                .iter()
                .map(|input| SentimentRecord::scored(input, 0.9))
                .collect::<Vec<_>>(),
        ),
        ArtifactKey::Summary => "Two speakers read out the alphabet.".to_string(),
    }
}

/// A stage set where every model-backed stage is a [`ScriptedStage`] and
/// alignment is the real implementation.
#[must_use]
pub fn scripted_stages() -> StageSet {
    [
        StageId::Transcription,
        StageId::Diarization,
        StageId::Sentiment,
        StageId::Summarization,
    ]
    .into_iter()
    .fold(StageSet::new(), |set, id| set.with_stage(ScriptedStage::new(id)))
}

/// Writes sample content for `keys` into the job's output directory.
pub fn write_artifacts(config: &JobConfig, keys: &[ArtifactKey]) -> io::Result<()> {
    std::fs::create_dir_all(config.output_dir())?;
    for key in keys {
        if let Some(path) = config.artifact_path(*key) {
            std::fs::write(path, sample_artifact(*key))?;
        }
    }
    Ok(())
}

fn sample_inputs() -> Vec<SentimentInput> {
    vec![
        SentimentInput {
            speaker: "SPEAKER_0".to_string(),
            timestamp: "0.00-2.00".to_string(),
            text: "a b c d".to_string(),
        },
        SentimentInput {
            speaker: "SPEAKER_1".to_string(),
            timestamp: "2.00-4.00".to_string(),
            text: "e f g h".to_string(),
        },
    ]
}

fn json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}
