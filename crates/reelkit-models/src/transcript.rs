//! Normalized transcription payloads.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single timed segment. After normalization a segment is one word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Segment text
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Which provider produced a transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionProvider {
    Remote,
    Local,
}

impl TranscriptionProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptionProvider::Remote => "remote",
            TranscriptionProvider::Local => "local",
        }
    }
}

impl fmt::Display for TranscriptionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalized transcription result.
///
/// Segments are sorted by start time, non-overlapping, with
/// `0 <= start < end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptionResult {
    /// Full transcript text
    pub text: String,
    /// Word-level segments
    pub segments: Vec<TranscriptSegment>,
    /// ISO 639-1 language code
    pub language: String,
    /// Provider that produced this result
    pub provider: TranscriptionProvider,
}

impl TranscriptionResult {
    /// Check the segment ordering invariants.
    pub fn segments_are_ordered(&self) -> bool {
        let mut prev_end = 0.0f64;
        for seg in &self.segments {
            if seg.start < 0.0 || seg.start >= seg.end {
                return false;
            }
            if seg.start < prev_end {
                return false;
            }
            prev_end = seg.end;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(segments: Vec<TranscriptSegment>) -> TranscriptionResult {
        TranscriptionResult {
            text: segments
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            segments,
            language: "pt".to_string(),
            provider: TranscriptionProvider::Local,
        }
    }

    #[test]
    fn test_ordered_segments() {
        let res = result_with(vec![
            TranscriptSegment::new(0.0, 0.5, "Olá"),
            TranscriptSegment::new(0.55, 1.0, "mundo"),
        ]);
        assert!(res.segments_are_ordered());
    }

    #[test]
    fn test_overlapping_segments_rejected() {
        let res = result_with(vec![
            TranscriptSegment::new(0.0, 0.6, "Olá"),
            TranscriptSegment::new(0.5, 1.0, "mundo"),
        ]);
        assert!(!res.segments_are_ordered());
    }

    #[test]
    fn test_inverted_segment_rejected() {
        let res = result_with(vec![TranscriptSegment::new(1.0, 0.5, "oops")]);
        assert!(!res.segments_are_ordered());
    }
}
