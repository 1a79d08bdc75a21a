//! media-mixer pairs audio files with videos or still images by file stem and muxes each pair
//! into an MP4 through the system `ffmpeg`.
//!
//! A run goes through a fixed pipeline:
//!
//! - [`scan_directory`] classifies the files of one flat directory and probes audio durations
//! - [`resolve_pairs`] picks one visual per audio stem
//! - [`ProcessingPlanner`] chooses loop, trim or still-image handling and builds the encoder
//!   command, optionally with a spectrum bar overlay ([`WaveformSpec`])
//! - an [`EncoderGateway`] runs the command and verifies the output
//!
//! [`BatchOrchestrator`] drives the whole pipeline and reports [`BatchEvent`]s to the caller.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub(crate) mod audio;
pub(crate) mod batch;
pub(crate) mod config;
pub(crate) mod encode;
pub(crate) mod media;
pub(crate) mod plan;
pub(crate) mod waveform;

pub use crate::foundation::core::{Canvas, Fps, format_secs};
pub use crate::foundation::error::{MixerError, MixerResult};

pub use crate::audio::pcm::{AudioPcm, decode_audio_f32};
pub use crate::batch::orchestrator::{
    BatchEvent, BatchOrchestrator, BatchPhase, BatchResult, PairOutcome, RunOptions, SkippedStem,
};
pub use crate::config::settings::{
    AudioCollisionPolicy, EncoderConfig, FormatConfig, MixerConfig, WaveformConfig,
    normalize_extension,
};
pub use crate::encode::gateway::{
    EncodedOutput, EncoderGateway, FfmpegGateway, STDERR_TAIL_LINES, ensure_parent_dir,
    is_ffmpeg_available, stderr_tail,
};
pub use crate::media::asset::{MediaAsset, MediaKind, MediaPair};
pub use crate::media::catalog::{AudioCollision, DroppedAsset, ScanResult, scan_directory};
pub use crate::media::pairing::{resolve_pairs, unpaired_stems};
pub use crate::media::probe::{
    DurationProbe, FfmpegProbe, image_frame_size, parse_duration_token, parse_video_size,
};
pub use crate::plan::planner::{
    Branch, ProcessingPlan, ProcessingPlanner, SCRATCH_DIR, choose_video_branch, video_filter,
};
pub use crate::waveform::bars::{BAR_ALPHA, ColorMode, WaveformSpec, bar_color};
pub use crate::waveform::raster::{WaveformFrame, WaveformFrames, WaveformRenderer};
pub use crate::waveform::spectrum::{
    AMPLITUDE_FLOOR, AnalysisParams, Spectrogram, band_bin_ranges, hann_window, log_band_edges,
};
