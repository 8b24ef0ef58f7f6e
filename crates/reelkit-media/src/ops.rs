//! Elementary FFmpeg operations: trim, convert, audio extraction.

use std::path::Path;

use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Trim `[start, end)` seconds into `output` with stream copy.
///
/// Preconditions: `0 <= start < end`, and `end <= duration` when the caller
/// knows it. End-user flows additionally require `end - start >= 3 s`,
/// enforced upstream.
pub async fn trim(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    start: f64,
    end: f64,
) -> MediaResult<()> {
    if start < 0.0 || start >= end {
        return Err(MediaError::invalid_input(format!(
            "invalid trim range: start={start} end={end}"
        )));
    }

    let input = input.as_ref();
    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    debug!(
        input = %input.display(),
        start,
        end,
        "Trimming with stream copy"
    );

    let cmd = FfmpegCommand::new(input.to_string_lossy(), output.as_ref())
        .seek(start)
        .duration(end - start)
        .stream_copy()
        .output_args(["-avoid_negative_ts", "make_zero"]);

    FfmpegRunner::new().run(&cmd).await?;
    Ok(())
}

/// Re-encode to H.264/AAC MP4 with the moov atom up front.
pub async fn convert(input: impl AsRef<Path>, output: impl AsRef<Path>) -> MediaResult<()> {
    let input = input.as_ref();
    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    let cmd = FfmpegCommand::new(input.to_string_lossy(), output.as_ref())
        .video_codec("libx264")
        .output_args(["-preset", "veryfast", "-crf", "23"])
        .audio_codec("aac")
        .output_args(["-b:a", "128k"])
        .output_args(["-movflags", "+faststart"]);

    FfmpegRunner::new().run(&cmd).await?;
    Ok(())
}

/// Extract ASR-ready audio: 16 kHz mono PCM WAV.
pub async fn extract_audio(input: impl AsRef<Path>, output: impl AsRef<Path>) -> MediaResult<()> {
    let input = input.as_ref();
    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    let cmd = FfmpegCommand::new(input.to_string_lossy(), output.as_ref())
        .output_args(["-vn"])
        .output_args(["-ar", "16000"])
        .output_args(["-ac", "1"])
        .audio_codec("pcm_s16le");

    FfmpegRunner::new().run(&cmd).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trim_rejects_bad_ranges() {
        for (start, end) in [(-1.0, 5.0), (5.0, 5.0), (6.0, 5.0)] {
            let err = trim("in.mp4", "out.mp4", start, end).await.unwrap_err();
            assert!(matches!(err, MediaError::InvalidInput(_)), "{start}..{end}");
        }
    }

    #[tokio::test]
    async fn test_trim_missing_input() {
        let err = trim("/nonexistent.mp4", "out.mp4", 0.0, 5.0)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_convert_missing_input() {
        let err = convert("/nonexistent.mp4", "out.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
