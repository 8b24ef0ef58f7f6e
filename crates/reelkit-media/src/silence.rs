//! Silence detection and removal.
//!
//! Detection runs FFmpeg's `silencedetect` filter and parses its stderr.
//! Removal trims the complement (keep) intervals into temp segments with
//! stream copy and concatenates them via the concat demuxer. Keyframe
//! alignment makes the cuts approximate; the result stays within one frame
//! of `duration - total_silence`.

use std::path::Path;

use tracing::{debug, info};

use reelkit_models::{SilenceDetection, SilenceInterval};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::move_file;
use crate::probe::probe_video;

/// Keep intervals shorter than this are dropped as slivers.
const MIN_KEEP_SECS: f64 = 0.05;

/// Detect silent regions in a video (local path or URL).
pub async fn detect_silences(
    input: &str,
    min_silence_s: f64,
    threshold_db: i32,
) -> MediaResult<SilenceDetection> {
    if min_silence_s <= 0.0 {
        return Err(MediaError::invalid_input(format!(
            "min_silence_s must be positive, got {min_silence_s}"
        )));
    }

    debug!(input = %input, min_silence_s, threshold_db, "Running silence detection");

    let cmd = FfmpegCommand::analysis(input)
        .audio_filter(format!(
            "silencedetect=noise={threshold_db}dB:d={min_silence_s}"
        ))
        .output_args(["-vn"]);

    let stderr = FfmpegRunner::new().run(&cmd).await?;

    let duration = parse_stream_duration(&stderr).unwrap_or(0.0);
    let silences = parse_silencedetect(&stderr, duration);

    info!(
        input = %input,
        silences = silences.len(),
        duration,
        "Silence detection complete"
    );

    Ok(SilenceDetection::new(silences, duration))
}

/// Parse `Duration: HH:MM:SS.cc` from FFmpeg's input banner.
fn parse_stream_duration(stderr: &str) -> Option<f64> {
    for line in stderr.lines() {
        let line = line.trim_start();
        if let Some(rest) = line.strip_prefix("Duration: ") {
            let stamp = rest.split(',').next()?.trim();
            return parse_clock(stamp);
        }
    }
    None
}

fn parse_clock(stamp: &str) -> Option<f64> {
    let mut parts = stamp.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Parse `silence_start` / `silence_end` pairs from silencedetect output.
///
/// A trailing `silence_start` with no matching end closes at stream end.
fn parse_silencedetect(stderr: &str, duration: f64) -> Vec<SilenceInterval> {
    let mut silences = Vec::new();
    let mut open_start: Option<f64> = None;

    for line in stderr.lines() {
        if let Some(value) = field_after(line, "silence_start:") {
            if let Ok(start) = value.parse::<f64>() {
                open_start = Some(start.max(0.0));
            }
        } else if let Some(value) = field_after(line, "silence_end:") {
            if let (Some(start), Ok(end)) = (open_start.take(), value.parse::<f64>()) {
                if end > start {
                    silences.push(SilenceInterval::new(start, end));
                }
            }
        }
    }

    // Silence running into the end of the stream never emits silence_end.
    if let Some(start) = open_start {
        if duration > start {
            silences.push(SilenceInterval::new(start, duration));
        }
    }

    silences.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));
    silences
}

fn field_after<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let idx = line.find(marker)?;
    let rest = &line[idx + marker.len()..];
    Some(rest.split_whitespace().next().unwrap_or("").trim_end_matches('|'))
}

/// Complement of the silence intervals over `[0, duration]`, dropping
/// slivers shorter than 50 ms.
pub fn keep_intervals(duration: f64, silences: &[SilenceInterval]) -> Vec<(f64, f64)> {
    let mut keeps = Vec::new();
    let mut cursor = 0.0f64;

    for s in silences {
        if s.start > cursor + MIN_KEEP_SECS {
            keeps.push((cursor, s.start.min(duration)));
        }
        cursor = cursor.max(s.end);
    }

    if duration > cursor + MIN_KEEP_SECS {
        keeps.push((cursor, duration));
    }

    keeps
}

/// Remove the given silences from `input`, writing `output`.
///
/// Each keep interval is extracted with stream copy into a temp segment;
/// segments are concatenated with the concat demuxer. When only one keep
/// segment results it is renamed into place. All temp files and the concat
/// manifest live in a scoped temp directory removed on success and failure.
pub async fn remove_silences(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    silences: &[SilenceInterval],
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();

    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    let duration = probe_video(input).await?.duration;
    let keeps = keep_intervals(duration, silences);

    if keeps.is_empty() {
        return Err(MediaError::invalid_input(
            "silence removal would drop the entire video",
        ));
    }

    debug!(
        input = %input.display(),
        keeps = keeps.len(),
        duration,
        "Removing silences"
    );

    // Temp dir owns every intermediate; dropped on all exit paths.
    let temp_dir = tempfile::tempdir()?;
    let mut segment_paths = Vec::with_capacity(keeps.len());

    for (i, (start, end)) in keeps.iter().enumerate() {
        let seg_path = temp_dir.path().join(format!("seg_{i:04}.mp4"));

        let cmd = FfmpegCommand::new(input.to_string_lossy(), &seg_path)
            .seek(*start)
            .duration(end - start)
            .stream_copy()
            .output_args(["-avoid_negative_ts", "make_zero"]);

        FfmpegRunner::new().run(&cmd).await?;
        segment_paths.push(seg_path);
    }

    if segment_paths.len() == 1 {
        move_file(&segment_paths[0], output).await?;
        return Ok(());
    }

    let concat_list = temp_dir.path().join("concat.txt");
    let manifest: String = segment_paths
        .iter()
        .map(|p| format!("file '{}'\n", p.display()))
        .collect();
    tokio::fs::write(&concat_list, &manifest).await?;

    let cmd = FfmpegCommand::new(concat_list.to_string_lossy(), output)
        .input_args(["-f", "concat", "-safe", "0"])
        .stream_copy()
        .output_args(["-movflags", "+faststart"]);

    FfmpegRunner::new().run(&cmd).await?;

    info!(
        segments = segment_paths.len(),
        output = %output.display(),
        "Silence removal concat complete"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_STDERR: &str = "\
Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'clip.mp4':
  Duration: 00:00:30.02, start: 0.000000, bitrate: 1205 kb/s
[silencedetect @ 0x5595] silence_start: 10.012
[silencedetect @ 0x5595] silence_end: 14.005 | silence_duration: 3.993
frame=  900 fps=450 q=-0.0 Lsize=N/A time=00:00:30.02 bitrate=N/A speed= 15x
";

    #[test]
    fn test_parse_single_interval() {
        let duration = parse_stream_duration(SAMPLE_STDERR).unwrap();
        assert!((duration - 30.02).abs() < 0.01);

        let silences = parse_silencedetect(SAMPLE_STDERR, duration);
        assert_eq!(silences.len(), 1);
        assert!((silences[0].start - 10.012).abs() < 1e-6);
        assert!((silences[0].end - 14.005).abs() < 1e-6);
        assert!((silences[0].duration - 3.993).abs() < 1e-6);
    }

    #[test]
    fn test_parse_unclosed_trailing_silence() {
        let stderr = "\
  Duration: 00:00:20.00, start: 0.000000
[silencedetect @ 0x1] silence_start: 5.0
[silencedetect @ 0x1] silence_end: 7.0 | silence_duration: 2.0
[silencedetect @ 0x1] silence_start: 18.5
";
        let silences = parse_silencedetect(stderr, 20.0);
        assert_eq!(silences.len(), 2);
        assert!((silences[1].start - 18.5).abs() < 1e-9);
        assert!((silences[1].end - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_no_silence() {
        let stderr = "  Duration: 00:01:00.00, start: 0.0\n";
        assert!(parse_silencedetect(stderr, 60.0).is_empty());
    }

    #[test]
    fn test_keep_intervals_complement() {
        let silences = vec![
            SilenceInterval::new(10.0, 14.0),
            SilenceInterval::new(20.0, 22.0),
        ];
        let keeps = keep_intervals(30.0, &silences);
        assert_eq!(keeps, vec![(0.0, 10.0), (14.0, 20.0), (22.0, 30.0)]);

        let kept: f64 = keeps.iter().map(|(s, e)| e - s).sum();
        assert!((kept - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_keep_intervals_silence_at_edges() {
        let silences = vec![
            SilenceInterval::new(0.0, 2.0),
            SilenceInterval::new(28.0, 30.0),
        ];
        let keeps = keep_intervals(30.0, &silences);
        assert_eq!(keeps, vec![(2.0, 28.0)]);
    }

    #[test]
    fn test_keep_intervals_drops_slivers() {
        let silences = vec![
            SilenceInterval::new(0.0, 9.99),
            SilenceInterval::new(10.0, 30.0),
        ];
        let keeps = keep_intervals(30.0, &silences);
        assert!(keeps.is_empty());
    }

    #[tokio::test]
    async fn test_detect_rejects_nonpositive_window() {
        let err = detect_silences("clip.mp4", 0.0, -30).await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_remove_missing_input() {
        let err = remove_silences("/nonexistent.mp4", "/tmp/out.mp4", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
