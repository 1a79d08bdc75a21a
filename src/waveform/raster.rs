use std::ops::Range;
use std::path::Path;

use anyhow::Context as _;
use image::{GrayImage, Luma, Rgb, RgbImage, RgbaImage};
use rayon::prelude::*;

use crate::foundation::error::{MixerError, MixerResult};
use crate::waveform::bars::WaveformSpec;
use crate::waveform::spectrum::{Spectrogram, band_bin_ranges};

/// One strip frame: color and coverage kept in separate planes.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveformFrame {
    /// Bar colors; black where nothing is drawn.
    pub rgb: RgbImage,
    /// Bar coverage; `0` where nothing is drawn.
    pub alpha: GrayImage,
}

impl WaveformFrame {
    /// Fully transparent frame of the given size.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            rgb: RgbImage::new(width, height),
            alpha: GrayImage::new(width, height),
        }
    }

    /// Draw bars bottom-aligned, one slot of `width / bar_count` pixels per bar.
    ///
    /// Each bar leaves a 2px gap to its right neighbour; bars of height `0` are skipped.
    pub fn from_heights(spec: &WaveformSpec, heights: &[u32]) -> Self {
        let (w, h) = (spec.strip.width, spec.strip.height);
        let mut frame = Self::transparent(w, h);
        if w == 0 || h == 0 || heights.is_empty() {
            return frame;
        }

        let slot = f64::from(w) / heights.len() as f64;
        for (i, &bar_h) in heights.iter().enumerate() {
            let bar_h = bar_h.min(h);
            if bar_h == 0 {
                continue;
            }
            let left = i as f64 * slot;
            let x0 = (left.floor() as u32).min(w - 1);
            let x1 = ((left + slot - 2.0).floor().max(0.0) as u32).max(x0).min(w - 1);
            let [r, g, b, a] = spec.bar_color(i);
            for y in (h - bar_h)..h {
                for x in x0..=x1 {
                    frame.rgb.put_pixel(x, y, Rgb([r, g, b]));
                    frame.alpha.put_pixel(x, y, Luma([a]));
                }
            }
        }
        frame
    }

    /// Strip width in pixels.
    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    /// Strip height in pixels.
    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    /// Interleave both planes into `out` as RGBA8, replacing its contents.
    pub fn write_rgba_into(&self, out: &mut Vec<u8>) {
        out.clear();
        out.reserve(self.rgb.as_raw().len() / 3 * 4);
        for (rgb, a) in self.rgb.as_raw().chunks_exact(3).zip(self.alpha.as_raw()) {
            out.extend_from_slice(rgb);
            out.push(*a);
        }
    }

    /// Interleaved RGBA8 bytes.
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_rgba_into(&mut out);
        out
    }

    /// Combined RGBA image.
    pub fn to_rgba_image(&self) -> MixerResult<RgbaImage> {
        RgbaImage::from_raw(self.width(), self.height(), self.to_rgba_bytes())
            .ok_or_else(|| MixerError::analysis("rgba buffer does not match strip size"))
    }

    /// Write the frame as a PNG.
    pub fn save_png(&self, path: &Path) -> MixerResult<()> {
        self.to_rgba_image()?
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }
}

/// Turns a spectrogram into strip frames at the output frame rate.
#[derive(Clone, Debug)]
pub struct WaveformRenderer {
    spec: WaveformSpec,
    spectrogram: Spectrogram,
    band_bins: Vec<Range<usize>>,
    duration_secs: f64,
}

impl WaveformRenderer {
    /// Build a renderer over an already analyzed spectrogram.
    pub fn new(
        spec: WaveformSpec,
        spectrogram: Spectrogram,
        duration_secs: f64,
    ) -> MixerResult<Self> {
        if spectrogram.params() != spec.analysis {
            return Err(MixerError::analysis(
                "spectrogram parameters do not match the waveform spec",
            ));
        }
        if !(duration_secs.is_finite() && duration_secs > 0.0) {
            return Err(MixerError::analysis(format!(
                "waveform duration must be positive, got {duration_secs}"
            )));
        }
        let band_bins = band_bin_ranges(&spec.band_edges_hz, &spec.analysis.bin_frequencies());
        Ok(Self {
            spec,
            spectrogram,
            band_bins,
            duration_secs,
        })
    }

    /// Analyze mono samples and build a renderer covering `duration_secs`.
    #[tracing::instrument(level = "debug", skip(spec, mono))]
    pub fn from_pcm(spec: WaveformSpec, mono: &[f32], duration_secs: f64) -> MixerResult<Self> {
        let spectrogram = Spectrogram::analyze(mono, spec.analysis, spec.floor_db)?;
        tracing::debug!(frames = spectrogram.frame_count(), "spectrogram ready");
        Self::new(spec, spectrogram, duration_secs)
    }

    /// Overlay spec in use.
    pub fn spec(&self) -> &WaveformSpec {
        &self.spec
    }

    /// Number of strip frames needed to cover the duration.
    pub fn frame_count(&self) -> u64 {
        self.spec.fps.secs_to_frames_ceil(self.duration_secs)
    }

    /// Bar heights at `t` seconds, one per band.
    pub fn bar_heights_at(&self, t: f64) -> Vec<u32> {
        let row = self
            .spectrogram
            .db_frame(self.spectrogram.frame_index_at(t));
        self.band_bins
            .iter()
            .map(|bins| {
                if bins.is_empty() {
                    return 0;
                }
                let max_db = row[bins.clone()]
                    .iter()
                    .fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
                self.spec.bar_height(f64::from(max_db))
            })
            .collect()
    }

    /// Strip frame at `t` seconds.
    pub fn render_at(&self, t: f64) -> WaveformFrame {
        WaveformFrame::from_heights(&self.spec, &self.bar_heights_at(t))
    }

    /// Bar heights for every frame, computed in parallel.
    pub fn height_table(&self) -> Vec<Vec<u32>> {
        let fps = self.spec.fps;
        (0..self.frame_count() as usize)
            .into_par_iter()
            .map(|i| self.bar_heights_at(fps.frames_to_secs(i as u64)))
            .collect()
    }

    /// Every strip frame in presentation order.
    ///
    /// Bar heights come from [`Self::height_table`]; rasters are drawn as the iterator advances.
    pub fn frames(&self) -> WaveformFrames<'_> {
        WaveformFrames {
            spec: &self.spec,
            heights: self.height_table().into_iter(),
        }
    }
}

/// Iterator over a renderer's frames.
#[derive(Clone, Debug)]
pub struct WaveformFrames<'a> {
    spec: &'a WaveformSpec,
    heights: std::vec::IntoIter<Vec<u32>>,
}

impl Iterator for WaveformFrames<'_> {
    type Item = WaveformFrame;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.heights.next()?;
        Some(WaveformFrame::from_heights(self.spec, &row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.heights.size_hint()
    }
}

impl ExactSizeIterator for WaveformFrames<'_> {}

#[cfg(test)]
#[path = "../../tests/unit/waveform/raster.rs"]
mod tests;
