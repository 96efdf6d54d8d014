//! Record types stored inside JSON artifacts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One speaker turn produced by diarization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerSegment {
    /// Speaker label (e.g. `SPEAKER_0`).
    pub speaker: String,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
}

impl SpeakerSegment {
    /// Creates a new segment.
    #[must_use]
    pub fn new(speaker: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            speaker: speaker.into(),
            start,
            end,
        }
    }

    /// Segment duration in seconds, clamped at zero.
    #[must_use]
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// A diarized segment with the words apportioned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedSegment {
    /// Speaker label.
    pub speaker: String,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Words assigned to the segment, space separated.
    pub text: String,
}

impl AlignedSegment {
    /// The `"<start>-<end>"` range used to key sentiment input.
    #[must_use]
    pub fn timestamp(&self) -> String {
        format!("{:.2}-{:.2}", self.start, self.end)
    }
}

/// One entry of the sentiment-scoring input feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentInput {
    /// Speaker label.
    pub speaker: String,
    /// `"<start>-<end>"` with two decimals.
    pub timestamp: String,
    /// Segment text.
    pub text: String,
}

/// Coarse sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    /// Score above 0.7.
    Positive,
    /// Score between 0.3 and 0.7 inclusive, or empty text.
    Neutral,
    /// Score below 0.3.
    Negative,
}

impl SentimentLabel {
    /// Score assigned to segments with no text.
    pub const EMPTY_TEXT_SCORE: f64 = 0.5;

    /// Maps a positive-class probability to a label.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score > 0.7 {
            Self::Positive
        } else if score < 0.3 {
            Self::Negative
        } else {
            Self::Neutral
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive => write!(f, "positive"),
            Self::Neutral => write!(f, "neutral"),
            Self::Negative => write!(f, "negative"),
        }
    }
}

/// One scored entry of the sentiment results artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentRecord {
    /// Speaker label.
    pub speaker: String,
    /// `"<start>-<end>"` with two decimals.
    pub timestamp: String,
    /// Segment text.
    pub text: String,
    /// Label derived from the score.
    pub sentiment: SentimentLabel,
    /// Positive-class probability.
    pub sentiment_score: f64,
}

impl SentimentRecord {
    /// Scores an input entry; blank text is neutral without consulting `score`.
    #[must_use]
    pub fn scored(input: &SentimentInput, score: f64) -> Self {
        let score = if input.text.trim().is_empty() {
            SentimentLabel::EMPTY_TEXT_SCORE
        } else {
            score
        };

        Self {
            speaker: input.speaker.clone(),
            timestamp: input.timestamp.clone(),
            text: input.text.clone(),
            sentiment: SentimentLabel::from_score(score),
            sentiment_score: score,
        }
    }
}
