use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{MixerError, MixerResult};
use crate::waveform::bars::ColorMode;

/// Top-level mixer configuration.
///
/// Every field has a default, so a JSON file only needs to list the values it overrides.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Extension sets used to classify directory entries.
    pub formats: FormatConfig,
    /// Encoder executable and output stream settings.
    pub encoder: EncoderConfig,
    /// Spectrum overlay settings.
    pub waveform: WaveformConfig,
    /// Name of the results subfolder created inside the input directory.
    pub results_folder: String,
    /// Prefix prepended to every output file name.
    pub output_prefix: String,
    /// Keep per-pair scratch files (decoded audio) for debugging.
    pub preserve_temp: bool,
    /// What to do when two audio files share a stem.
    pub audio_collision: AudioCollisionPolicy,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            formats: FormatConfig::default(),
            encoder: EncoderConfig::default(),
            waveform: WaveformConfig::default(),
            results_folder: "__results".to_string(),
            output_prefix: String::new(),
            preserve_temp: false,
            audio_collision: AudioCollisionPolicy::Reject,
        }
    }
}

impl MixerConfig {
    /// Load a JSON config file, normalize extensions and validate the result.
    pub fn from_path(path: impl AsRef<Path>) -> MixerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        Self::from_json(&text)
    }

    /// Parse a JSON config string, normalize extensions and validate the result.
    pub fn from_json(text: &str) -> MixerResult<Self> {
        let mut cfg: Self = serde_json::from_str(text)
            .map_err(|e| MixerError::validation(format!("config json: {e}")))?;
        cfg.formats.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> MixerResult<()> {
        self.formats.validate()?;
        self.encoder.validate()?;
        self.waveform.validate()?;
        if self.results_folder.is_empty()
            || self.results_folder.contains(['/', '\\'])
            || self.results_folder == "."
            || self.results_folder == ".."
        {
            return Err(MixerError::validation(
                "results_folder must be a plain folder name",
            ));
        }
        Ok(())
    }

    /// Results directory for a given input directory.
    pub fn results_dir(&self, input_dir: &Path) -> PathBuf {
        input_dir.join(&self.results_folder)
    }
}

/// Duplicate audio handling when several audio files map to one stem.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCollisionPolicy {
    /// Skip the stem and report it.
    #[default]
    Reject,
    /// Keep the smallest file name and report the collision.
    FirstByName,
}

/// Extension sets (lower-case, without the leading dot).
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Audio extensions.
    pub audio: Vec<String>,
    /// Video extensions.
    pub video: Vec<String>,
    /// Still image extensions.
    pub image: Vec<String>,
    /// Image extensions in descending preference when several images share a stem.
    pub image_preference: Vec<String>,
}

impl Default for FormatConfig {
    fn default() -> Self {
        fn list(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| (*s).to_string()).collect()
        }
        Self {
            audio: list(&["mp3"]),
            video: list(&["mp4"]),
            image: list(&["jpg", "jpeg", "webp", "png"]),
            image_preference: list(&["jpg", "jpeg", "webp", "png"]),
        }
    }
}

impl FormatConfig {
    /// Lower-case every extension and strip leading dots (`.JPG` -> `jpg`).
    pub fn normalize(&mut self) {
        for set in [
            &mut self.audio,
            &mut self.video,
            &mut self.image,
            &mut self.image_preference,
        ] {
            for ext in set.iter_mut() {
                *ext = normalize_extension(ext);
            }
        }
    }

    fn validate(&self) -> MixerResult<()> {
        if self.audio.is_empty() {
            return Err(MixerError::validation("at least one audio format is required"));
        }
        if self.video.is_empty() && self.image.is_empty() {
            return Err(MixerError::validation(
                "at least one video or image format is required",
            ));
        }
        let sets = [
            ("audio", &self.audio),
            ("video", &self.video),
            ("image", &self.image),
        ];
        for (i, (name_a, a)) in sets.iter().enumerate() {
            for (name_b, b) in &sets[i + 1..] {
                if let Some(ext) = a.iter().find(|ext| b.contains(ext)) {
                    return Err(MixerError::validation(format!(
                        "extension '{ext}' is listed as both {name_a} and {name_b}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Rank of an image extension in the preference order; unlisted extensions rank last.
    pub fn image_rank(&self, ext: &str) -> usize {
        self.image_preference
            .iter()
            .position(|p| p == ext)
            .unwrap_or(usize::MAX)
    }
}

/// Lower-case an extension and strip any leading dots.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Encoder executable and output stream settings.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Encoder executable; a bare name is resolved through `PATH`.
    pub ffmpeg_path: PathBuf,
    /// Output frame size; the visual is scaled and letterboxed into it.
    pub canvas: Canvas,
    /// Output frame rate.
    pub fps: Fps,
    /// x264 preset.
    pub video_preset: String,
    /// AAC bitrate, e.g. `192k`.
    pub audio_bitrate: String,
    /// Output audio sample rate; also the waveform analysis rate.
    pub audio_sample_rate: u32,
    /// Output audio channels.
    pub audio_channels: u16,
    /// Encoder worker threads.
    pub threads: u32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            canvas: Canvas::default(),
            fps: Fps::default(),
            video_preset: "ultrafast".to_string(),
            audio_bitrate: "192k".to_string(),
            audio_sample_rate: 44_100,
            audio_channels: 2,
            threads: 4,
        }
    }
}

impl EncoderConfig {
    fn validate(&self) -> MixerResult<()> {
        if self.ffmpeg_path.as_os_str().is_empty() {
            return Err(MixerError::validation("ffmpeg_path must not be empty"));
        }
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(MixerError::validation(
                "encoder canvas width/height must be non-zero",
            ));
        }
        if !self.canvas.width.is_multiple_of(2) || !self.canvas.height.is_multiple_of(2) {
            return Err(MixerError::validation(
                "encoder canvas width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        Fps::new(self.fps.num, self.fps.den)?;
        if self.audio_sample_rate == 0 || self.audio_channels == 0 {
            return Err(MixerError::validation(
                "audio sample rate and channel count must be non-zero",
            ));
        }
        if self.video_preset.is_empty() || self.audio_bitrate.is_empty() {
            return Err(MixerError::validation(
                "video_preset and audio_bitrate must not be empty",
            ));
        }
        Ok(())
    }
}

/// Spectrum overlay settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WaveformConfig {
    /// Number of frequency bars.
    pub bar_count: usize,
    /// STFT window size in samples (power of two).
    pub n_fft: usize,
    /// STFT hop size in samples.
    pub hop_length: usize,
    /// Strip height as a fraction of the output frame height.
    pub strip_fraction: f64,
    /// Tallest bar as a fraction of the strip height.
    pub bar_fill: f64,
    /// Dynamic range shown by the bars, in dB below the peak.
    pub floor_db: f64,
    /// Bar coloring used when the caller does not pick one.
    pub color_mode: ColorMode,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            bar_count: 64,
            n_fft: 2048,
            hop_length: 512,
            strip_fraction: 0.15,
            bar_fill: 0.9,
            floor_db: 80.0,
            color_mode: ColorMode::Classic,
        }
    }
}

impl WaveformConfig {
    fn validate(&self) -> MixerResult<()> {
        if self.bar_count == 0 {
            return Err(MixerError::validation("waveform bar_count must be > 0"));
        }
        if self.n_fft < 4 || !self.n_fft.is_power_of_two() {
            return Err(MixerError::validation(
                "waveform n_fft must be a power of two >= 4",
            ));
        }
        if self.hop_length == 0 || self.hop_length > self.n_fft {
            return Err(MixerError::validation(
                "waveform hop_length must be in 1..=n_fft",
            ));
        }
        if !(self.strip_fraction > 0.0 && self.strip_fraction <= 1.0) {
            return Err(MixerError::validation(
                "waveform strip_fraction must be in (0, 1]",
            ));
        }
        if !(self.bar_fill > 0.0 && self.bar_fill <= 1.0) {
            return Err(MixerError::validation("waveform bar_fill must be in (0, 1]"));
        }
        if !(self.floor_db.is_finite() && self.floor_db > 0.0) {
            return Err(MixerError::validation("waveform floor_db must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/config/settings.rs"]
mod tests;
