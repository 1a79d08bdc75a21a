use crate::config::settings::MixerConfig;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{MixerError, MixerResult};
use crate::waveform::spectrum::{AnalysisParams, log_band_edges};

/// Bar alpha shared by every color mode.
pub const BAR_ALPHA: u8 = 180;

/// How bars are colored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    /// Every bar the same translucent green.
    #[default]
    Classic,
    /// Blue → magenta → orange across the bar index.
    Gradient,
}

/// Everything the renderer needs to draw the spectrum strip.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveformSpec {
    /// Number of bars.
    pub bar_count: usize,
    /// Bar coloring.
    pub color_mode: ColorMode,
    /// `bar_count + 1` ascending, log-spaced band edges in Hz.
    pub band_edges_hz: Vec<f64>,
    /// Strip size; full width of the visual, a fraction of its height.
    pub strip: Canvas,
    /// Frame rate of the generated strip frames.
    pub fps: Fps,
    /// STFT parameters.
    pub analysis: AnalysisParams,
    /// Channel count of the decoded audio the encoder reads back.
    pub channels: u16,
    /// Tallest bar as a fraction of the strip height.
    pub bar_fill: f64,
    /// Dynamic range in dB below the peak.
    pub floor_db: f64,
}

impl WaveformSpec {
    /// Derive the overlay spec for a visual of size `frame`.
    pub fn from_config(
        cfg: &MixerConfig,
        color_mode: ColorMode,
        frame: Canvas,
    ) -> MixerResult<Self> {
        let wf = &cfg.waveform;
        let strip_height = (f64::from(frame.height) * wf.strip_fraction).floor() as u32;
        if frame.width == 0 || strip_height == 0 {
            return Err(MixerError::validation(format!(
                "waveform strip over a {}x{} frame would be empty; raise strip_fraction",
                frame.width, frame.height
            )));
        }
        let analysis = AnalysisParams {
            sample_rate: cfg.encoder.audio_sample_rate,
            n_fft: wf.n_fft,
            hop_length: wf.hop_length,
        };
        Ok(Self {
            bar_count: wf.bar_count,
            color_mode,
            band_edges_hz: log_band_edges(wf.bar_count, analysis),
            strip: Canvas {
                width: frame.width,
                height: strip_height,
            },
            fps: cfg.encoder.fps,
            analysis,
            channels: cfg.encoder.audio_channels,
            bar_fill: wf.bar_fill,
            floor_db: wf.floor_db,
        })
    }

    /// Height in pixels of a bar whose loudest bin is `max_db`.
    ///
    /// `0` means the bar is not drawn.
    pub fn bar_height(&self, max_db: f64) -> u32 {
        let norm = ((max_db + self.floor_db) / self.floor_db).clamp(0.0, 1.0);
        (norm * f64::from(self.strip.height) * self.bar_fill).floor() as u32
    }

    /// RGBA color of bar `index`.
    pub fn bar_color(&self, index: usize) -> [u8; 4] {
        bar_color(self.color_mode, index, self.bar_count)
    }
}

/// RGBA color of bar `index` out of `bar_count` bars.
pub fn bar_color(mode: ColorMode, index: usize, bar_count: usize) -> [u8; 4] {
    match mode {
        ColorMode::Classic => [0, 255, 0, BAR_ALPHA],
        ColorMode::Gradient => {
            const BLUE: [f64; 3] = [0.0, 120.0, 255.0];
            const MAGENTA: [f64; 3] = [200.0, 0.0, 200.0];
            const ORANGE: [f64; 3] = [255.0, 120.0, 0.0];

            let t = index as f64 / bar_count.saturating_sub(1).max(1) as f64;
            let (from, to, k) = if t < 0.5 {
                (BLUE, MAGENTA, t / 0.5)
            } else {
                (MAGENTA, ORANGE, (t - 0.5) / 0.5)
            };
            let lerp = |c: usize| (from[c] + (to[c] - from[c]) * k) as u8;
            [lerp(0), lerp(1), lerp(2), BAR_ALPHA]
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/waveform/bars.rs"]
mod tests;
