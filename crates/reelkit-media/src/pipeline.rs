//! Staged video processing pipeline.
//!
//! download -> trim -> silence removal -> subtitle burn -> finalize.
//! Stages are strictly ordered; each stage deletes its input once its
//! output exists, and the scoped work directory guarantees cleanup of
//! intermediates on every exit path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use reelkit_models::{SilenceInterval, SubtitleStyle, TranscriptSegment, VideoId};

use crate::download::download_to;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{move_file, remove_quiet};
use crate::ops::{convert, trim};
use crate::probe::probe_video;
use crate::silence::remove_silences;
use crate::subtitles::burn_subtitles;

/// Trim boundaries, seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimRange {
    pub start: f64,
    pub end: f64,
}

/// Silence removal request carried in the job payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SilenceRemovalOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub silences: Vec<SilenceInterval>,
}

/// Subtitle burn request carried in the job payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
    #[serde(default)]
    pub style: SubtitleStyle,
}

/// Options for a full pipeline run. All stages are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim: Option<TrimRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silence_removal: Option<SilenceRemovalOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitles: Option<SubtitleOptions>,
}

impl ProcessOptions {
    fn wants_silence_removal(&self) -> bool {
        self.silence_removal
            .as_ref()
            .map(|o| o.enabled && !o.silences.is_empty())
            .unwrap_or(false)
    }

    fn wants_subtitles(&self) -> bool {
        self.subtitles
            .as_ref()
            .map(|o| o.enabled && !o.segments.is_empty())
            .unwrap_or(false)
    }
}

/// Result of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutput {
    pub output_path: PathBuf,
    pub duration: f64,
    pub size_bytes: u64,
}

fn check_cancel(cancel: &Option<watch::Receiver<bool>>) -> MediaResult<()> {
    if let Some(rx) = cancel {
        if *rx.borrow() {
            return Err(MediaError::Cancelled);
        }
    }
    Ok(())
}

/// Run the full pipeline over a source blob URL.
///
/// The final MP4 lands in `work_dir` as `{video_id}_processed.mp4`; every
/// intermediate lives in a scoped temp directory. The progress callback is
/// invoked at stage boundaries with a percentage and a short status.
pub async fn process_video(
    url: &str,
    video_id: &VideoId,
    options: &ProcessOptions,
    work_dir: &Path,
    progress: impl Fn(u8, &str),
    cancel: Option<watch::Receiver<bool>>,
) -> MediaResult<ProcessOutput> {
    tokio::fs::create_dir_all(work_dir).await?;
    let scratch = tempfile::tempdir_in(work_dir)?;

    if let Some(t) = &options.trim {
        if t.start < 0.0 || t.start >= t.end {
            return Err(MediaError::invalid_input(format!(
                "invalid trim range: start={} end={}",
                t.start, t.end
            )));
        }
    }

    progress(10, "Downloading video");
    let original = scratch.path().join(format!("{video_id}_original.mp4"));
    download_to(url, &original).await?;
    check_cancel(&cancel)?;

    let probe = probe_video(&original).await?;
    debug!(
        video_id = %video_id,
        duration = probe.duration,
        codec = %probe.video_codec,
        "Probed source"
    );

    if let Some(t) = &options.trim {
        if t.end > probe.duration + 0.001 {
            return Err(MediaError::invalid_input(format!(
                "trim end {} beyond duration {}",
                t.end, probe.duration
            )));
        }
    }

    // `current` is the live intermediate; prior files are deleted as soon
    // as the next stage output exists.
    let mut current = original.clone();
    let mut stage = 0u32;

    if let Some(t) = &options.trim {
        progress(25, "Trimming video");
        stage += 1;
        let next = scratch.path().join(format!("{video_id}_s{stage}_trim.mp4"));
        trim(&current, &next, t.start, t.end).await?;
        advance(&mut current, next, &original).await;
        check_cancel(&cancel)?;
        metrics::counter!("reelkit_pipeline_stage_total", "stage" => "trim").increment(1);
    }

    if options.wants_silence_removal() {
        progress(40, "Removing silences");
        stage += 1;
        let silences = &options.silence_removal.as_ref().unwrap().silences;
        let next = scratch
            .path()
            .join(format!("{video_id}_s{stage}_silence.mp4"));
        remove_silences(&current, &next, silences).await?;
        advance(&mut current, next, &original).await;
        check_cancel(&cancel)?;
        metrics::counter!("reelkit_pipeline_stage_total", "stage" => "silence").increment(1);
    }

    if options.wants_subtitles() {
        progress(60, "Burning subtitles");
        stage += 1;
        let opts = options.subtitles.as_ref().unwrap();
        let next = scratch
            .path()
            .join(format!("{video_id}_s{stage}_subs.mp4"));
        burn_subtitles(&current, &next, &opts.segments, &opts.style).await?;
        advance(&mut current, next, &original).await;
        check_cancel(&cancel)?;
        metrics::counter!("reelkit_pipeline_stage_total", "stage" => "subtitles").increment(1);
    }

    progress(80, "Finalizing video");
    let finalized = scratch.path().join(format!("{video_id}_final.mp4"));
    convert(&current, &finalized).await?;
    check_cancel(&cancel)?;

    let output_path = work_dir.join(format!("{video_id}_processed.mp4"));
    move_file(&finalized, &output_path).await?;

    // Original download (and any surviving intermediate) goes with the
    // scratch dir; delete the original explicitly in case it equals current.
    remove_quiet(&original).await;

    let out_probe = probe_video(&output_path).await?;

    progress(100, "Processing complete");
    info!(
        video_id = %video_id,
        output = %output_path.display(),
        duration = out_probe.duration,
        size = out_probe.size,
        "Pipeline complete"
    );

    Ok(ProcessOutput {
        output_path,
        duration: out_probe.duration,
        size_bytes: out_probe.size,
    })
}

/// Promote `next` to the live intermediate, deleting the previous one
/// (never the original download, which is cleaned at the end).
async fn advance(current: &mut PathBuf, next: PathBuf, original: &Path) {
    if current.as_path() != original {
        remove_quiet(&*current).await;
    }
    *current = next;
}
