//! Silence detection results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A detected silent region. `duration == end - start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SilenceInterval {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

impl SilenceInterval {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            duration: end - start,
        }
    }
}

/// Result of running silence detection over a video.
///
/// Intervals are disjoint and sorted by start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SilenceDetection {
    pub silences: Vec<SilenceInterval>,
    /// Sum of interval durations, seconds
    pub total_silence: f64,
    /// Duration of the probed video, seconds
    pub video_duration: f64,
    /// `total_silence / video_duration * 100`
    pub silence_percentage: f64,
}

impl SilenceDetection {
    pub fn new(silences: Vec<SilenceInterval>, video_duration: f64) -> Self {
        let total_silence: f64 = silences.iter().map(|s| s.duration).sum();
        let silence_percentage = if video_duration > 0.0 {
            total_silence / video_duration * 100.0
        } else {
            0.0
        };
        Self {
            silences,
            total_silence,
            video_duration,
            silence_percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_duration() {
        let i = SilenceInterval::new(10.0, 14.0);
        assert!((i.duration - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_detection_percentage() {
        let det = SilenceDetection::new(vec![SilenceInterval::new(10.0, 14.0)], 30.0);
        assert!((det.total_silence - 4.0).abs() < 1e-9);
        assert!((det.silence_percentage - 13.333).abs() < 0.01);
    }

    #[test]
    fn test_detection_empty_video() {
        let det = SilenceDetection::new(vec![], 0.0);
        assert_eq!(det.silence_percentage, 0.0);
    }
}
