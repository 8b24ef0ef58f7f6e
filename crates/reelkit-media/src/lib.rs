//! FFmpeg-based video processing engine.
//!
//! All operations are protocol-level consumers of the external
//! `ffmpeg`/`ffprobe` binaries: arguments are passed as arrays, exit status
//! is checked, and stderr is propagated as the error message.

pub mod command;
pub mod download;
pub mod error;
pub mod fs_utils;
pub mod ops;
pub mod pipeline;
pub mod probe;
pub mod silence;
pub mod subtitles;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use pipeline::{
    process_video, ProcessOptions, ProcessOutput, SilenceRemovalOptions, SubtitleOptions,
    TrimRange,
};
pub use probe::{probe_video, VideoProbe};
pub use silence::{detect_silences, keep_intervals, remove_silences};
pub use subtitles::{build_srt, burn_subtitles, parse_srt};
