//! SRT generation and subtitle burning.

use std::path::Path;

use tracing::{debug, info};

use reelkit_models::{SubtitlePosition, SubtitlePreset, SubtitleStyle, TranscriptSegment};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::remove_quiet;

/// Gap between words that closes a sentence cue, seconds.
const SENTENCE_GAP_SECS: f64 = 0.8;

/// Format seconds as `HH:MM:SS,mmm`. Hours/minutes/seconds truncate; the
/// millisecond part rounds.
pub fn format_srt_time(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let mut whole = seconds as u64;
    let mut millis = ((seconds - whole as f64) * 1000.0).round() as u32;
    if millis >= 1000 {
        whole += 1;
        millis -= 1000;
    }

    let hours = whole / 3600;
    let minutes = (whole % 3600) / 60;
    let secs = whole % 60;

    format!("{hours:02}:{minutes:02}:{secs:02},{millis:03}")
}

/// Parse an `HH:MM:SS,mmm` timestamp back into seconds.
pub fn parse_srt_time(stamp: &str) -> MediaResult<f64> {
    let (clock, millis) = stamp
        .trim()
        .split_once(',')
        .ok_or_else(|| MediaError::invalid_input(format!("bad SRT timestamp: {stamp}")))?;

    let mut parts = clock.split(':');
    let mut read = |name: &str| -> MediaResult<u64> {
        parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| MediaError::invalid_input(format!("bad SRT {name}: {stamp}")))
    };

    let hours = read("hours")?;
    let minutes = read("minutes")?;
    let seconds = read("seconds")?;
    let millis: u64 = millis
        .parse()
        .map_err(|_| MediaError::invalid_input(format!("bad SRT millis: {stamp}")))?;

    Ok((hours * 3600 + minutes * 60 + seconds) as f64 + millis as f64 / 1000.0)
}

/// Materialize segments as SRT text with the preset's cue granularity.
pub fn build_srt(segments: &[TranscriptSegment], preset: SubtitlePreset) -> String {
    let cues: Vec<TranscriptSegment> = match preset {
        SubtitlePreset::WordByWord => segments.to_vec(),
        SubtitlePreset::Sentence => group_sentences(segments),
        SubtitlePreset::Full => match (segments.first(), segments.last()) {
            (Some(first), Some(last)) => vec![TranscriptSegment::new(
                first.start,
                last.end,
                segments
                    .iter()
                    .map(|s| s.text.trim())
                    .collect::<Vec<_>>()
                    .join(" "),
            )],
            _ => Vec::new(),
        },
    };

    let mut srt = String::new();
    for (i, cue) in cues.iter().enumerate() {
        srt.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_srt_time(cue.start),
            format_srt_time(cue.end),
            cue.text.trim()
        ));
    }
    srt
}

/// Group word segments into sentence cues, closing on terminal punctuation
/// or a gap longer than [`SENTENCE_GAP_SECS`].
fn group_sentences(segments: &[TranscriptSegment]) -> Vec<TranscriptSegment> {
    let mut cues = Vec::new();
    let mut current: Option<TranscriptSegment> = None;

    for seg in segments {
        match current.as_mut() {
            None => current = Some(seg.clone()),
            Some(cue) => {
                if seg.start - cue.end > SENTENCE_GAP_SECS {
                    cues.push(current.take().unwrap());
                    current = Some(seg.clone());
                } else {
                    cue.text = format!("{} {}", cue.text.trim(), seg.text.trim());
                    cue.end = seg.end;
                }
            }
        }

        let closed = current
            .as_ref()
            .map(|c| ends_sentence(&c.text))
            .unwrap_or(false);
        if closed {
            cues.push(current.take().unwrap());
        }
    }

    if let Some(cue) = current {
        cues.push(cue);
    }
    cues
}

fn ends_sentence(text: &str) -> bool {
    matches!(
        text.trim_end().chars().last(),
        Some('.') | Some('!') | Some('?') | Some('…')
    )
}

/// Parse SRT text back into `(start, end, text)` segments.
pub fn parse_srt(srt: &str) -> MediaResult<Vec<TranscriptSegment>> {
    let mut segments = Vec::new();

    for block in srt.split("\n\n").filter(|b| !b.trim().is_empty()) {
        let mut lines = block.lines().filter(|l| !l.trim().is_empty());

        // Cue index line
        let _ = lines
            .next()
            .ok_or_else(|| MediaError::invalid_input("SRT block missing index"))?;

        let timing = lines
            .next()
            .ok_or_else(|| MediaError::invalid_input("SRT block missing timing"))?;
        let (start, end) = timing
            .split_once("-->")
            .ok_or_else(|| MediaError::invalid_input(format!("bad SRT timing: {timing}")))?;

        let text = lines.collect::<Vec<_>>().join("\n");

        segments.push(TranscriptSegment::new(
            parse_srt_time(start)?,
            parse_srt_time(end)?,
            text,
        ));
    }

    Ok(segments)
}

/// Translate a style into the `force_style` syntax of the subtitles filter.
///
/// ASS colours are `&HAABBGGRR` (blue-green-red); the hex colours swap byte
/// order. Alignment uses the numpad layout (2 bottom, 5 middle, 8 top).
pub fn force_style(style: &SubtitleStyle) -> String {
    let alignment = match style.position {
        SubtitlePosition::Bottom => 2,
        SubtitlePosition::Center => 5,
        SubtitlePosition::Top => 8,
    };

    let fc = style.font_color;
    let mut parts = vec![
        format!("FontSize={}", style.font_size),
        format!("PrimaryColour=&H00{:02X}{:02X}{:02X}", fc.b, fc.g, fc.r),
        format!("Alignment={alignment}"),
    ];

    if style.background_opacity > 0.0 {
        let bc = style.background_color;
        let alpha = ((1.0 - style.background_opacity.clamp(0.0, 1.0)) * 255.0).round() as u8;
        parts.push("BorderStyle=3".to_string());
        parts.push(format!(
            "BackColour=&H{alpha:02X}{:02X}{:02X}{:02X}",
            bc.b, bc.g, bc.r
        ));
        parts.push("Outline=1".to_string());
        parts.push("Shadow=0".to_string());
    }

    parts.join(",")
}

/// Escape a path for use inside a filter-graph argument.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Burn subtitles into a video.
///
/// Writes an SRT next to the output, runs the subtitles filter with the
/// style translated to `force_style`, stream-copies audio, and removes the
/// SRT on every exit path.
pub async fn burn_subtitles(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    segments: &[TranscriptSegment],
    style: &SubtitleStyle,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();

    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }
    if segments.is_empty() {
        return Err(MediaError::invalid_input("no subtitle segments to burn"));
    }

    let srt_path = output.with_extension("srt");
    let srt = build_srt(segments, style.preset);
    tokio::fs::write(&srt_path, &srt).await?;

    debug!(
        input = %input.display(),
        srt = %srt_path.display(),
        cues = srt.matches("-->").count(),
        "Burning subtitles"
    );

    let filter = format!(
        "subtitles='{}':force_style='{}'",
        escape_filter_path(&srt_path),
        force_style(style)
    );

    let cmd = FfmpegCommand::new(input.to_string_lossy(), output)
        .video_filter(filter)
        .video_codec("libx264")
        .output_args(["-preset", "veryfast", "-crf", "23"])
        .audio_codec("copy");

    let result = FfmpegRunner::new().run(&cmd).await;

    remove_quiet(&srt_path).await;

    result?;
    info!(output = %output.display(), "Subtitle burn complete");
    Ok(())
}
