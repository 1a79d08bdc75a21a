use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::settings::{EncoderConfig, MixerConfig};
use crate::foundation::core::{Canvas, format_secs};
use crate::foundation::error::{MixerError, MixerResult};
use crate::media::asset::{MediaAsset, MediaKind, MediaPair};
use crate::media::probe::{DurationProbe, image_frame_size};
use crate::waveform::bars::{ColorMode, WaveformSpec};

/// Name of the scratch subfolder inside an output directory.
pub const SCRATCH_DIR: &str = "temp";

/// How the visual is stretched or cut to the audio length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Branch {
    /// The video is shorter than the audio and is repeated.
    LoopVideo {
        /// Total plays of the video, `floor(audio / video) + 1`.
        loop_count: u32,
    },
    /// The video is at least as long as the audio and is cut.
    TrimVideo,
    /// A still image is held for the whole audio.
    ImageToVideo,
}

impl Branch {
    /// Short label for listings and logs.
    pub fn label(self) -> String {
        match self {
            Self::LoopVideo { loop_count } => format!("loop x{loop_count}"),
            Self::TrimVideo => "trim".to_string(),
            Self::ImageToVideo => "image".to_string(),
        }
    }
}

/// Everything needed to produce one output file.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessingPlan {
    /// The pair being rendered.
    pub pair: MediaPair,
    /// Chosen branch.
    pub branch: Branch,
    /// Spectrum overlay, when requested.
    pub overlay: Option<WaveformSpec>,
    /// Encoder arguments, without the executable itself.
    pub encoder_args: Vec<OsString>,
    /// Final output file.
    pub output_path: PathBuf,
    /// Decoded audio read back by the encoder; only set for overlay plans.
    pub scratch_audio: Option<PathBuf>,
    /// Length of the output in seconds.
    pub audio_duration_secs: f64,
}

/// Builds [`ProcessingPlan`]s from pairs.
pub struct ProcessingPlanner<'a> {
    cfg: &'a MixerConfig,
    probe: &'a dyn DurationProbe,
}

impl<'a> ProcessingPlanner<'a> {
    /// Plan with the given configuration, probing missing durations through `probe`.
    pub fn new(cfg: &'a MixerConfig, probe: &'a dyn DurationProbe) -> Self {
        Self { cfg, probe }
    }

    /// Choose a branch for `pair` and build its encoder command.
    #[tracing::instrument(skip(self, pair), fields(stem = %pair.audio.stem))]
    pub fn plan(
        &self,
        pair: &MediaPair,
        overlay: Option<ColorMode>,
        output_dir: &Path,
    ) -> MixerResult<ProcessingPlan> {
        let audio_secs = self.duration_of(&pair.audio)?;
        let branch = match pair.visual.kind {
            MediaKind::Image => Branch::ImageToVideo,
            MediaKind::Video => {
                let video_secs = self.duration_of(&pair.visual)?;
                choose_video_branch(audio_secs, video_secs)
            }
            MediaKind::Audio => {
                return Err(MixerError::UnsupportedMediaKind {
                    path: pair.visual.path.clone(),
                    kind: pair.visual.kind,
                });
            }
        };

        let output_path = output_dir.join(pair.output_name(&self.cfg.output_prefix));
        let overlay = match overlay {
            Some(mode) => {
                let frame = self.frame_size_of(&pair.visual)?;
                Some(WaveformSpec::from_config(self.cfg, mode, frame)?)
            }
            None => None,
        };
        let scratch_audio = overlay.as_ref().map(|_| {
            output_dir
                .join(SCRATCH_DIR)
                .join(format!("{}.f32le", pair.audio.stem))
        });

        let enc = &self.cfg.encoder;
        let mut args = os_args(&["-y", "-loglevel", "error"]);
        args.extend(visual_input_args(branch, enc, &pair.visual.path));

        let duration = format_secs(audio_secs);
        match (&overlay, &scratch_audio) {
            (Some(spec), Some(scratch)) => {
                args.extend(os_args(&[
                    "-f",
                    "rawvideo",
                    "-pix_fmt",
                    "rgba",
                    "-s",
                    &format!("{}x{}", spec.strip.width, spec.strip.height),
                    "-r",
                    &enc.fps.to_string(),
                    "-i",
                    "pipe:0",
                    "-f",
                    "f32le",
                    "-ar",
                    &spec.analysis.sample_rate.to_string(),
                    "-ac",
                    &spec.channels.to_string(),
                    "-i",
                ]));
                args.push(scratch.clone().into_os_string());
                args.extend(os_args(&[
                    "-filter_complex",
                    &format!(
                        "[0:v][1:v]overlay=x=(W-w)/2:y=H-h:format=auto[mixed];[mixed]{}[v]",
                        video_filter(enc)
                    ),
                    "-map",
                    "[v]",
                    "-map",
                    "2:a:0",
                    "-t",
                    &duration,
                ]));
                args.extend(codec_args(branch, enc, false));
            }
            _ => {
                args.push("-i".into());
                args.push(pair.audio.path.clone().into_os_string());
                args.extend(os_args(&["-map", "0:v:0", "-map", "1:a:0", "-t", &duration]));
                args.extend(codec_args(branch, enc, true));
            }
        }
        args.push("-shortest".into());
        args.push(output_path.clone().into_os_string());

        tracing::debug!(branch = %branch.label(), args = ?args, "planned");
        Ok(ProcessingPlan {
            pair: pair.clone(),
            branch,
            overlay,
            encoder_args: args,
            output_path,
            scratch_audio,
            audio_duration_secs: audio_secs,
        })
    }

    fn duration_of(&self, asset: &MediaAsset) -> MixerResult<f64> {
        let secs = match asset.duration_secs {
            Some(secs) => secs,
            None => self.probe.probe_duration(&asset.path)?,
        };
        if !(secs.is_finite() && secs > 0.0) {
            return Err(MixerError::duration_unavailable(
                &asset.path,
                format!("duration must be positive, got {secs}"),
            ));
        }
        Ok(secs)
    }

    fn frame_size_of(&self, visual: &MediaAsset) -> MixerResult<Canvas> {
        match visual.kind {
            MediaKind::Image => image_frame_size(&visual.path),
            _ => self.probe.probe_frame_size(&visual.path),
        }
    }
}

/// Loop a shorter video, trim a video that is at least as long as the audio.
pub fn choose_video_branch(audio_secs: f64, video_secs: f64) -> Branch {
    if video_secs < audio_secs {
        Branch::LoopVideo {
            loop_count: (audio_secs / video_secs).floor() as u32 + 1,
        }
    } else {
        Branch::TrimVideo
    }
}

/// Scale into the canvas keeping the aspect ratio, then letterbox to the exact size.
pub fn video_filter(enc: &EncoderConfig) -> String {
    let (w, h) = (enc.canvas.width, enc.canvas.height);
    format!("scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2")
}

fn visual_input_args(branch: Branch, enc: &EncoderConfig, visual: &Path) -> Vec<OsString> {
    let mut args = match branch {
        Branch::LoopVideo { loop_count } => {
            os_args(&["-stream_loop", &loop_count.saturating_sub(1).to_string()])
        }
        Branch::TrimVideo => Vec::new(),
        Branch::ImageToVideo => os_args(&["-loop", "1", "-framerate", &enc.fps.to_string()]),
    };
    args.push("-i".into());
    args.push(visual.as_os_str().to_os_string());
    args
}

fn codec_args(branch: Branch, enc: &EncoderConfig, with_filter: bool) -> Vec<OsString> {
    let mut args = os_args(&["-c:v", "libx264", "-preset", &enc.video_preset]);
    if branch == Branch::ImageToVideo {
        args.extend(os_args(&["-tune", "stillimage"]));
    }
    args.extend(
        os_args(&[
            "-profile:v",
            "main",
            "-level",
            "4.0",
            "-tag:v",
            "avc1",
            "-pix_fmt",
            "yuv420p",
        ]),
    );
    if with_filter {
        args.push("-vf".into());
        args.push(video_filter(enc).into());
    }
    args.extend(
        os_args(&[
            "-r",
            &enc.fps.to_string(),
            "-vsync",
            "cfr",
            "-c:a",
            "aac",
            "-b:a",
            &enc.audio_bitrate,
            "-ac",
            &enc.audio_channels.to_string(),
            "-ar",
            &enc.audio_sample_rate.to_string(),
            "-movflags",
            "+faststart",
            "-threads",
            &enc.threads.to_string(),
        ]),
    );
    args
}

fn os_args(items: &[&str]) -> Vec<OsString> {
    items.iter().map(OsString::from).collect()
}

#[cfg(test)]
#[path = "../../tests/unit/plan/planner.rs"]
mod tests;
