use std::io::Write as _;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::Context as _;

use crate::foundation::error::{MixerError, MixerResult};

/// Decoded audio as interleaved 32-bit float samples.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioPcm {
    /// Samples per second per channel.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Interleaved samples, `channels` values per frame.
    pub interleaved_f32: Vec<f32>,
}

impl AudioPcm {
    /// Parse raw little-endian `f32` bytes.
    pub fn from_f32le_bytes(bytes: &[u8], sample_rate: u32, channels: u16) -> MixerResult<Self> {
        if channels == 0 {
            return Err(MixerError::analysis("pcm channel count must be non-zero"));
        }
        if !bytes.len().is_multiple_of(4) {
            return Err(MixerError::analysis(
                "decoded audio byte length is not aligned to f32 samples",
            ));
        }
        let interleaved_f32 = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self {
            sample_rate,
            channels,
            interleaved_f32,
        })
    }

    /// Number of sample frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        self.interleaved_f32.len() / usize::from(self.channels.max(1))
    }

    /// Length in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / f64::from(self.sample_rate)
    }

    /// Average all channels into one.
    pub fn downmix_mono(&self) -> Vec<f32> {
        let ch = usize::from(self.channels.max(1));
        if ch == 1 {
            return self.interleaved_f32.clone();
        }
        self.interleaved_f32
            .chunks_exact(ch)
            .map(|frame| frame.iter().sum::<f32>() / ch as f32)
            .collect()
    }

    /// Write the samples to `path` as raw little-endian `f32`, as the encoder reads them with
    /// `-f f32le`.
    pub fn write_f32le_file(&self, path: &Path) -> MixerResult<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("create scratch audio '{}'", path.display()))?;
        let mut out = std::io::BufWriter::new(file);
        for s in &self.interleaved_f32 {
            out.write_all(&s.to_le_bytes())
                .with_context(|| format!("write scratch audio '{}'", path.display()))?;
        }
        out.flush()
            .with_context(|| format!("flush scratch audio '{}'", path.display()))?;
        Ok(())
    }
}

/// Decode any audio file the encoder understands to interleaved `f32` PCM.
#[tracing::instrument(level = "debug", skip(ffmpeg_path))]
pub fn decode_audio_f32(
    ffmpeg_path: &Path,
    path: &Path,
    sample_rate: u32,
    channels: u16,
) -> MixerResult<AudioPcm> {
    let out = Command::new(ffmpeg_path)
        .args(["-v", "error", "-nostdin", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            &channels.to_string(),
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .stdin(Stdio::null())
        .output()
        .map_err(|e| MixerError::analysis(format!("failed to run ffmpeg for audio decode: {e}")))?;

    if !out.status.success() {
        let msg = String::from_utf8_lossy(&out.stderr);
        return Err(MixerError::analysis(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            msg.trim()
        )));
    }

    let pcm = AudioPcm::from_f32le_bytes(&out.stdout, sample_rate, channels)?;
    if pcm.interleaved_f32.is_empty() {
        return Err(MixerError::analysis(format!(
            "'{}' decoded to no audio samples",
            path.display()
        )));
    }
    tracing::debug!(frames = pcm.frame_count(), "audio decoded");
    Ok(pcm)
}

#[cfg(test)]
#[path = "../../tests/unit/audio/pcm.rs"]
mod tests;
