use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::foundation::core::Canvas;
use crate::foundation::error::{MixerError, MixerResult};

/// Source of asset durations and video frame sizes.
///
/// The scanner probes every audio file and the planner probes video visuals; tests swap in a
/// table-driven implementation.
pub trait DurationProbe {
    /// Duration of the media file at `path`, in seconds.
    fn probe_duration(&self, path: &Path) -> MixerResult<f64>;

    /// Pixel size of the first video stream of `path`.
    ///
    /// Only needed for overlay plans over video visuals.
    fn probe_frame_size(&self, path: &Path) -> MixerResult<Canvas> {
        Err(MixerError::frame_size_unavailable(
            path,
            "this probe does not report frame sizes",
        ))
    }
}

/// Probe that asks the encoder to describe the input and parses its `Duration:` line.
#[derive(Clone, Debug)]
pub struct FfmpegProbe {
    ffmpeg_path: PathBuf,
}

impl FfmpegProbe {
    /// Probe through the given encoder executable.
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Input summary the encoder prints to stderr for `path`.
    fn describe(&self, path: &Path) -> std::io::Result<String> {
        // Without an output the encoder exits non-zero after printing the input summary, so the
        // exit status carries no information here.
        let out = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-nostdin", "-i"])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .output()?;
        Ok(String::from_utf8_lossy(&out.stderr).into_owned())
    }
}

impl DurationProbe for FfmpegProbe {
    #[tracing::instrument(level = "debug", skip(self))]
    fn probe_duration(&self, path: &Path) -> MixerResult<f64> {
        let stderr = self.describe(path).map_err(|e| {
            MixerError::duration_unavailable(path, format!("failed to run ffmpeg: {e}"))
        })?;
        parse_duration_token(&stderr).ok_or_else(|| {
            MixerError::duration_unavailable(path, "no 'Duration: HH:MM:SS.ff' in ffmpeg output")
        })
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn probe_frame_size(&self, path: &Path) -> MixerResult<Canvas> {
        let stderr = self.describe(path).map_err(|e| {
            MixerError::frame_size_unavailable(path, format!("failed to run ffmpeg: {e}"))
        })?;
        parse_video_size(&stderr).ok_or_else(|| {
            MixerError::frame_size_unavailable(path, "no video stream size in ffmpeg output")
        })
    }
}

/// Pixel size of a still image, read from its header.
pub fn image_frame_size(path: &Path) -> MixerResult<Canvas> {
    let (width, height) = image::image_dimensions(path)
        .map_err(|e| MixerError::frame_size_unavailable(path, e.to_string()))?;
    Ok(Canvas { width, height })
}

/// Find the first `Duration: HH:MM:SS.ff` token and convert it to seconds.
///
/// `Duration: N/A` (streams without a known length) yields `None`.
pub fn parse_duration_token(diagnostics: &str) -> Option<f64> {
    const KEY: &str = "Duration: ";
    let start = diagnostics.find(KEY)? + KEY.len();
    let token = diagnostics[start..]
        .split(|c: char| c == ',' || c.is_whitespace())
        .next()?;

    let mut parts = token.split(':');
    let hours = parse_fixed_digits(parts.next()?)?;
    let minutes = parse_fixed_digits(parts.next()?)?;
    let (secs, frac) = parts.next()?.split_once('.')?;
    if parts.next().is_some() || minutes >= 60 {
        return None;
    }
    let secs = parse_fixed_digits(secs)?;
    if secs >= 60 || frac.len() < 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let frac = frac.parse::<u64>().ok()? as f64 / 10f64.powi(frac.len() as i32);

    Some((hours * 3600 + minutes * 60 + secs) as f64 + frac)
}

/// Size of the first `Video:` stream, taken from its `WIDTHxHEIGHT` field.
pub fn parse_video_size(diagnostics: &str) -> Option<Canvas> {
    let line = diagnostics.lines().find(|l| l.contains("Video: "))?;
    let (_, streams) = line.split_once("Video: ")?;
    streams
        .split(|c: char| c == ',' || c.is_whitespace())
        .find_map(|token| {
            let (w, h) = token.split_once('x')?;
            if w.starts_with('0') || !w.bytes().chain(h.bytes()).all(|b| b.is_ascii_digit()) {
                return None;
            }
            let (width, height) = (w.parse().ok()?, h.parse().ok()?);
            (height > 0).then_some(Canvas { width, height })
        })
}

fn parse_fixed_digits(s: &str) -> Option<u64> {
    if s.len() < 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
#[path = "../../tests/unit/media/probe.rs"]
mod tests;
