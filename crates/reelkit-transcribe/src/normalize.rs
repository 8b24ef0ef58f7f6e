//! Normalization of raw provider output.
//!
//! Whatever the provider emitted, the result satisfies the segment
//! invariants: sorted by start, non-overlapping, `0 <= start < end`.

use reelkit_models::{TranscriptSegment, TranscriptionProvider, TranscriptionResult};

use crate::provider::ProviderTranscript;

/// Turn a raw transcript into a normalized result.
///
/// Words are sorted, empty and inverted spans are dropped, and overlaps
/// are clamped forward (`start = max(start, prev_end)`). The full text is
/// rebuilt from the words when the provider left it empty.
pub fn normalize(
    raw: ProviderTranscript,
    requested_language: &str,
    provider: TranscriptionProvider,
) -> TranscriptionResult {
    let mut words = raw.words;
    words.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut segments: Vec<TranscriptSegment> = Vec::with_capacity(words.len());
    let mut prev_end = 0.0f64;

    for word in words {
        let text = word.text.trim();
        if text.is_empty() {
            continue;
        }

        let start = word.start.max(prev_end).max(0.0);
        let end = word.end;
        if end <= start {
            continue;
        }

        prev_end = end;
        segments.push(TranscriptSegment::new(start, end, text));
    }

    let text = if raw.text.trim().is_empty() {
        segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        raw.text
    };

    TranscriptionResult {
        text,
        segments,
        language: raw
            .language
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| requested_language.to_string()),
        provider,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Word;

    fn word(start: f64, end: f64, text: &str) -> Word {
        Word {
            start,
            end,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_sorts_and_keeps_ordered_words() {
        let raw = ProviderTranscript {
            text: String::new(),
            language: Some("pt".to_string()),
            words: vec![word(0.55, 1.0, "mundo"), word(0.0, 0.5, "Olá")],
        };

        let result = normalize(raw, "pt", TranscriptionProvider::Remote);
        assert_eq!(result.segments.len(), 2);
        assert_eq!(result.segments[0].text, "Olá");
        assert_eq!(result.text, "Olá mundo");
        assert!(result.segments_are_ordered());
    }

    #[test]
    fn test_clamps_overlaps_forward() {
        let raw = ProviderTranscript {
            text: "a b".to_string(),
            language: None,
            words: vec![word(0.0, 0.6, "a"), word(0.5, 1.0, "b")],
        };

        let result = normalize(raw, "pt", TranscriptionProvider::Local);
        assert!((result.segments[1].start - 0.6).abs() < 1e-9);
        assert!(result.segments_are_ordered());
    }

    #[test]
    fn test_drops_empty_and_inverted_spans() {
        let raw = ProviderTranscript {
            text: String::new(),
            language: None,
            words: vec![
                word(0.0, 0.5, "ok"),
                word(0.5, 0.5, "zero"),
                word(1.0, 0.8, "inverted"),
                word(1.2, 1.5, "  "),
            ],
        };

        let result = normalize(raw, "pt", TranscriptionProvider::Local);
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.text, "ok");
    }

    #[test]
    fn test_swallowed_word_inside_previous_is_dropped() {
        // Second word ends before the clamped start; it cannot survive.
        let raw = ProviderTranscript {
            text: String::new(),
            language: None,
            words: vec![word(0.0, 1.0, "long"), word(0.2, 0.8, "inner")],
        };

        let result = normalize(raw, "pt", TranscriptionProvider::Local);
        assert_eq!(result.segments.len(), 1);
    }

    #[test]
    fn test_language_defaults_to_requested() {
        let raw = ProviderTranscript {
            text: "oi".to_string(),
            language: None,
            words: vec![word(0.0, 0.3, "oi")],
        };

        let result = normalize(raw, "en", TranscriptionProvider::Remote);
        assert_eq!(result.language, "en");
        assert_eq!(result.provider, TranscriptionProvider::Remote);
    }
}
