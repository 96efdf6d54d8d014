//! Built-in alignment stage.
//!
//! Apportions transcript words to diarized speaker segments in proportion to
//! segment duration. This is an approximation rather than forced alignment:
//! words are handed out front to back and any remainder is dropped, so
//! consumers must tolerate text/time drift.

use super::{Stage, StageId};
use crate::config::JobConfig;
use crate::core::{AlignedSegment, ArtifactKey, SentimentInput, SpeakerSegment};
use anyhow::{bail, Context};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Result of apportioning words to segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    /// One entry per input segment, in input order.
    pub segments: Vec<AlignedSegment>,
    /// Words left over after the last segment.
    pub unassigned_words: usize,
}

impl Alignment {
    /// Renders `"<speaker>: <text>"` lines joined by newlines.
    #[must_use]
    pub fn formatted(&self) -> String {
        self.segments
            .iter()
            .map(|segment| format!("{}: {}", segment.speaker, segment.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Builds the sentiment-scoring feed keyed by timestamp range.
    #[must_use]
    pub fn sentiment_inputs(&self) -> Vec<SentimentInput> {
        self.segments
            .iter()
            .map(|segment| SentimentInput {
                speaker: segment.speaker.clone(),
                timestamp: segment.timestamp(),
                text: segment.text.clone(),
            })
            .collect()
    }
}

/// Apportions the words of `transcript` across `segments`.
///
/// The speaking rate is `word_count / total_duration`, where the total
/// duration is the end time of the last segment. Each segment, in order,
/// takes `floor(duration * rate)` words from the front of the remaining
/// stream.
///
/// # Errors
///
/// Fails when there are no segments or the total duration is not positive.
pub fn align_segments(segments: &[SpeakerSegment], transcript: &str) -> anyhow::Result<Alignment> {
    let Some(last) = segments.last() else {
        bail!("diarization produced no segments");
    };

    let total_duration = last.end;
    if !(total_duration > 0.0) {
        bail!("total diarized duration must be positive, got {total_duration}");
    }

    let words: Vec<&str> = transcript.split_whitespace().collect();
    #[allow(clippy::cast_precision_loss)]
    let words_per_second = words.len() as f64 / total_duration;

    let mut cursor = 0;
    let aligned = segments
        .iter()
        .map(|segment| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let quota = (segment.duration() * words_per_second).floor() as usize;
            let take = quota.min(words.len() - cursor);
            let text = words[cursor..cursor + take].join(" ");
            cursor += take;

            AlignedSegment {
                speaker: segment.speaker.clone(),
                start: segment.start,
                end: segment.end,
                text,
            }
        })
        .collect();

    Ok(Alignment {
        segments: aligned,
        unassigned_words: words.len() - cursor,
    })
}

/// Stage that reads the diarization and transcript artifacts and writes the
/// aligned, formatted and sentiment-input artifacts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlignmentStage;

#[async_trait]
impl Stage for AlignmentStage {
    fn id(&self) -> StageId {
        StageId::Alignment
    }

    async fn invoke(&self, config: &JobConfig) -> anyhow::Result<()> {
        let diarization_path = config.require_artifact(ArtifactKey::Diarization)?;
        let transcript_path = config.require_artifact(ArtifactKey::Transcript)?;

        let raw_segments = tokio::fs::read_to_string(diarization_path)
            .await
            .with_context(|| format!("reading {}", diarization_path.display()))?;
        let segments: Vec<SpeakerSegment> = serde_json::from_str(&raw_segments)
            .with_context(|| format!("parsing {}", diarization_path.display()))?;

        let transcript = tokio::fs::read_to_string(transcript_path)
            .await
            .with_context(|| format!("reading {}", transcript_path.display()))?;

        let alignment = align_segments(&segments, transcript.trim())?;
        if alignment.unassigned_words > 0 {
            warn!(
                job_id = config.job_id(),
                unassigned_words = alignment.unassigned_words,
                "Alignment dropped trailing words"
            );
        }

        let aligned_path = config.require_artifact(ArtifactKey::Aligned)?;
        let formatted_path = config.require_artifact(ArtifactKey::Formatted)?;
        let sentiment_input_path = config.require_artifact(ArtifactKey::SentimentInput)?;

        tokio::fs::write(aligned_path, serde_json::to_string_pretty(&alignment.segments)?)
            .await
            .with_context(|| format!("writing {}", aligned_path.display()))?;
        tokio::fs::write(formatted_path, alignment.formatted())
            .await
            .with_context(|| format!("writing {}", formatted_path.display()))?;
        tokio::fs::write(
            sentiment_input_path,
            serde_json::to_string_pretty(&alignment.sentiment_inputs())?,
        )
        .await
        .with_context(|| format!("writing {}", sentiment_input_path.display()))?;

        debug!(
            job_id = config.job_id(),
            segments = alignment.segments.len(),
            "Alignment artifacts written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use pretty_assertions::assert_eq;

    fn texts(alignment: &Alignment) -> Vec<&str> {
        alignment.segments.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_even_apportionment() {
        let segments = vec![
            SpeakerSegment::new("A", 0.0, 2.0),
            SpeakerSegment::new("B", 2.0, 4.0),
        ];

        let alignment = align_segments(&segments, "a b c d e f g h").unwrap();

        assert_eq!(texts(&alignment), vec!["a b c d", "e f g h"]);
        assert_eq!(alignment.unassigned_words, 0);
    }

    #[test]
    fn test_remainder_is_dropped() {
        let segments = vec![
            SpeakerSegment::new("A", 0.0, 1.5),
            SpeakerSegment::new("B", 1.5, 3.0),
        ];

        // 7 words over 3s: each segment gets floor(1.5 * 7 / 3) = 3 words.
        let alignment = align_segments(&segments, "one two three four five six seven").unwrap();

        assert_eq!(texts(&alignment), vec!["one two three", "four five six"]);
        assert_eq!(alignment.unassigned_words, 1);
    }

    #[test]
    fn test_gap_before_first_segment_reduces_quota() {
        // Rate is computed against the last end time, not summed durations.
        let segments = vec![SpeakerSegment::new("A", 2.0, 4.0)];
        let alignment = align_segments(&segments, "a b c d").unwrap();

        assert_eq!(texts(&alignment), vec!["a b"]);
        assert_eq!(alignment.unassigned_words, 2);
    }

    #[test]
    fn test_empty_transcript() {
        let segments = vec![SpeakerSegment::new("A", 0.0, 1.0)];
        let alignment = align_segments(&segments, "").unwrap();

        assert_eq!(texts(&alignment), vec![""]);
        assert_eq!(alignment.formatted(), "A: ");
    }

    #[test]
    fn test_no_segments_is_an_error() {
        let err = align_segments(&[], "words").unwrap_err();
        assert!(err.to_string().contains("no segments"));
    }

    #[test]
    fn test_zero_duration_is_an_error() {
        let segments = vec![SpeakerSegment::new("A", 0.0, 0.0)];
        assert!(align_segments(&segments, "words").is_err());
    }

    #[test]
    fn test_derived_views() {
        let segments = vec![
            SpeakerSegment::new("SPEAKER_0", 0.0, 2.0),
            SpeakerSegment::new("SPEAKER_1", 2.0, 4.0),
        ];
        let alignment = align_segments(&segments, "hi there how are").unwrap();

        assert_eq!(alignment.formatted(), "SPEAKER_0: hi there\nSPEAKER_1: how are");

        let inputs = alignment.sentiment_inputs();
        assert_eq!(inputs[0].timestamp, "0.00-2.00");
        assert_eq!(inputs[1].timestamp, "2.00-4.00");
        assert_eq!(inputs[1].text, "how are");
    }

    #[tokio::test]
    async fn test_stage_writes_three_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let job = PipelineConfig::new()
            .with_results_root(dir.path())
            .job_config("align", "in.mp3", None)
            .unwrap();
        std::fs::create_dir_all(job.output_dir()).unwrap();

        std::fs::write(
            job.artifact_path(ArtifactKey::Diarization).unwrap(),
            r#"[{"speaker": "A", "start": 0.0, "end": 2.0}, {"speaker": "B", "start": 2.0, "end": 4.0}]"#,
        )
        .unwrap();
        std::fs::write(
            job.artifact_path(ArtifactKey::Transcript).unwrap(),
            "a b c d e f g h\n",
        )
        .unwrap();

        AlignmentStage.invoke(&job).await.unwrap();

        let aligned: Vec<AlignedSegment> = serde_json::from_str(
            &std::fs::read_to_string(job.artifact_path(ArtifactKey::Aligned).unwrap()).unwrap(),
        )
        .unwrap();
        assert_eq!(aligned[0].text, "a b c d");
        assert_eq!(aligned[1].text, "e f g h");

        let formatted =
            std::fs::read_to_string(job.artifact_path(ArtifactKey::Formatted).unwrap()).unwrap();
        assert_eq!(formatted, "A: a b c d\nB: e f g h");

        let inputs: Vec<SentimentInput> = serde_json::from_str(
            &std::fs::read_to_string(job.artifact_path(ArtifactKey::SentimentInput).unwrap())
                .unwrap(),
        )
        .unwrap();
        assert_eq!(inputs.len(), 2);
    }

    #[tokio::test]
    async fn test_stage_reports_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let job = PipelineConfig::new()
            .with_results_root(dir.path())
            .job_config("align", "in.mp3", None)
            .unwrap();

        let err = AlignmentStage.invoke(&job).await.unwrap_err();
        assert!(format!("{err:#}").contains("diarization_result.json"));
    }
}
