use std::f64::consts::PI;
use std::ops::Range;

use rayon::prelude::*;
use rustfft::{FftPlanner, num_complex::Complex};

use crate::foundation::error::{MixerError, MixerResult};

/// Magnitudes at or below this amplitude are treated as silence.
pub const AMPLITUDE_FLOOR: f64 = 1e-5;

/// STFT parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AnalysisParams {
    /// Sample rate of the analyzed signal in Hz.
    pub sample_rate: u32,
    /// Window size in samples.
    pub n_fft: usize,
    /// Distance between consecutive windows in samples.
    pub hop_length: usize,
}

impl AnalysisParams {
    /// Number of non-negative frequency bins (`n_fft / 2 + 1`).
    pub fn bin_count(self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Center frequency of every bin, ascending from 0 Hz to Nyquist.
    pub fn bin_frequencies(self) -> Vec<f64> {
        let step = f64::from(self.sample_rate) / self.n_fft as f64;
        (0..self.bin_count()).map(|k| k as f64 * step).collect()
    }

    fn validate(self) -> MixerResult<()> {
        if self.sample_rate == 0 {
            return Err(MixerError::analysis("sample rate must be non-zero"));
        }
        if self.n_fft < 4 || !self.n_fft.is_power_of_two() {
            return Err(MixerError::analysis("n_fft must be a power of two >= 4"));
        }
        if self.hop_length == 0 {
            return Err(MixerError::analysis("hop length must be non-zero"));
        }
        Ok(())
    }
}

/// Decibel spectrogram referenced to its own peak, stored frame-major.
#[derive(Clone, Debug)]
pub struct Spectrogram {
    params: AnalysisParams,
    frames: usize,
    bins: usize,
    db: Vec<f32>,
}

impl Spectrogram {
    /// Run a centered, Hann-windowed STFT over mono `samples`.
    ///
    /// Frames start every `hop_length` samples with `n_fft / 2` samples of zero padding on
    /// both ends, so there are always `1 + len / hop_length` frames. Values are
    /// `20·log10(m / peak)` clamped to `-floor_db`; a silent signal is `-floor_db` everywhere.
    pub fn analyze(samples: &[f32], params: AnalysisParams, floor_db: f64) -> MixerResult<Self> {
        params.validate()?;
        if !(floor_db.is_finite() && floor_db > 0.0) {
            return Err(MixerError::analysis("floor_db must be a positive number"));
        }

        let n_fft = params.n_fft;
        let bins = params.bin_count();
        let frames = 1 + samples.len() / params.hop_length;
        let window = hann_window(n_fft);
        let fft = FftPlanner::<f32>::new().plan_fft_forward(n_fft);
        let scratch_len = fft.get_inplace_scratch_len();

        let magnitudes: Vec<Vec<f32>> = (0..frames)
            .into_par_iter()
            .map_init(
                || {
                    (
                        vec![Complex::new(0.0f32, 0.0); n_fft],
                        vec![Complex::new(0.0f32, 0.0); scratch_len],
                    )
                },
                |(buf, scratch), frame| {
                    let start = (frame * params.hop_length) as isize - (n_fft / 2) as isize;
                    for (i, slot) in buf.iter_mut().enumerate() {
                        let idx = start + i as isize;
                        let s = if idx >= 0 {
                            samples.get(idx as usize).copied().unwrap_or(0.0)
                        } else {
                            0.0
                        };
                        *slot = Complex::new(s * window[i], 0.0);
                    }
                    fft.process_with_scratch(buf, scratch);
                    buf[..bins].iter().map(|c| c.norm()).collect::<Vec<f32>>()
                },
            )
            .collect();

        let peak = magnitudes
            .iter()
            .flatten()
            .fold(0.0f64, |acc, &m| acc.max(f64::from(m)));

        let mut db = Vec::with_capacity(frames * bins);
        if peak <= AMPLITUDE_FLOOR {
            db.resize(frames * bins, -floor_db as f32);
        } else {
            let ref_db = 20.0 * peak.log10();
            for m in magnitudes.iter().flatten() {
                let level = 20.0 * f64::from(*m).max(AMPLITUDE_FLOOR).log10() - ref_db;
                db.push(level.max(-floor_db) as f32);
            }
        }

        Ok(Self {
            params,
            frames,
            bins,
            db,
        })
    }

    /// Parameters the spectrogram was computed with.
    pub fn params(&self) -> AnalysisParams {
        self.params
    }

    /// Number of analysis frames (always at least one).
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Decibel values of one frame, one per bin.
    pub fn db_frame(&self, frame: usize) -> &[f32] {
        let frame = frame.min(self.frames - 1);
        &self.db[frame * self.bins..(frame + 1) * self.bins]
    }

    /// Analysis frame nearest to `t` seconds, clamped to the analyzed range.
    pub fn frame_index_at(&self, t: f64) -> usize {
        let pos = t * f64::from(self.params.sample_rate) / self.params.hop_length as f64;
        if !pos.is_finite() || pos <= 0.0 {
            return 0;
        }
        (pos.round() as usize).min(self.frames - 1)
    }
}

/// Periodic Hann window of length `n`.
pub fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| (0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos()) as f32)
        .collect()
}

/// `bar_count + 1` logarithmically spaced edges from the first non-DC bin to Nyquist.
pub fn log_band_edges(bar_count: usize, params: AnalysisParams) -> Vec<f64> {
    let freqs = params.bin_frequencies();
    let lo = freqs[1];
    let hi = freqs[freqs.len() - 1];
    let (log_lo, log_hi) = (lo.log10(), hi.log10());
    (0..=bar_count)
        .map(|i| match i {
            0 => lo,
            i if i == bar_count => hi,
            i => 10f64.powf(log_lo + (log_hi - log_lo) * i as f64 / bar_count as f64),
        })
        .collect()
}

/// Bin range of every band: bins whose frequency is in `[edge_i, edge_{i+1})`.
///
/// Narrow low bands can be empty; their bars are never drawn.
pub fn band_bin_ranges(edges: &[f64], bin_freqs: &[f64]) -> Vec<Range<usize>> {
    edges
        .windows(2)
        .map(|w| {
            let start = bin_freqs.partition_point(|f| *f < w[0]);
            let end = bin_freqs.partition_point(|f| *f < w[1]);
            start..end.max(start)
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/waveform/spectrum.rs"]
mod tests;
