use std::io::{Read as _, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use anyhow::Context as _;

use crate::audio::pcm::decode_audio_f32;
use crate::config::settings::MixerConfig;
use crate::foundation::error::{MixerError, MixerResult};
use crate::plan::planner::ProcessingPlan;
use crate::waveform::bars::WaveformSpec;
use crate::waveform::raster::WaveformRenderer;

/// Number of non-empty stderr lines kept in [`MixerError::EncoderFailed`].
pub const STDERR_TAIL_LINES: usize = 12;

/// A file produced by the encoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedOutput {
    /// Output path.
    pub path: PathBuf,
    /// Size on disk.
    pub size_bytes: u64,
}

/// Executes processing plans.
pub trait EncoderGateway {
    /// Run one plan to completion.
    fn execute(&mut self, plan: &ProcessingPlan) -> MixerResult<EncodedOutput>;
}

/// Gateway that runs the system encoder executable.
#[derive(Clone, Debug)]
pub struct FfmpegGateway {
    ffmpeg_path: PathBuf,
    preserve_temp: bool,
}

impl FfmpegGateway {
    /// Gateway using the given encoder executable; scratch files are always removed.
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            preserve_temp: false,
        }
    }

    /// Gateway using the encoder and scratch policy of `cfg`.
    pub fn from_config(cfg: &MixerConfig) -> Self {
        Self {
            ffmpeg_path: cfg.encoder.ffmpeg_path.clone(),
            preserve_temp: cfg.preserve_temp,
        }
    }

    fn run_plain(&self, plan: &ProcessingPlan) -> MixerResult<()> {
        let out = Command::new(&self.ffmpeg_path)
            .args(&plan.encoder_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| spawn_error(&self.ffmpeg_path, e))?;

        if !out.status.success() {
            return Err(MixerError::EncoderFailed {
                status: out.status.to_string(),
                stderr_tail: stderr_tail(&out.stderr, STDERR_TAIL_LINES),
            });
        }
        Ok(())
    }

    fn run_overlay(&self, plan: &ProcessingPlan, spec: &WaveformSpec) -> MixerResult<()> {
        let scratch = plan.scratch_audio.as_deref().ok_or_else(|| {
            MixerError::validation("overlay plan has no scratch audio path")
        })?;
        ensure_parent_dir(scratch)?;
        let _scratch_guard = TempFileGuard((!self.preserve_temp).then(|| scratch.to_path_buf()));

        let pcm = decode_audio_f32(
            &self.ffmpeg_path,
            &plan.pair.audio.path,
            spec.analysis.sample_rate,
            spec.channels,
        )?;
        pcm.write_f32le_file(scratch)?;
        let renderer =
            WaveformRenderer::from_pcm(spec.clone(), &pcm.downmix_mono(), plan.audio_duration_secs)?;
        drop(pcm);

        let mut child = Command::new(&self.ffmpeg_path)
            .args(&plan.encoder_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&self.ffmpeg_path, e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow::anyhow!("failed to open ffmpeg stdin"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("failed to open ffmpeg stderr"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok::<_, std::io::Error>(bytes)
        });

        let mut buf = Vec::new();
        let mut written = 0u64;
        for frame in renderer.frames() {
            frame.write_rgba_into(&mut buf);
            match stdin.write_all(&buf) {
                Ok(()) => written += 1,
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::debug!(written, "encoder closed its input early");
                    break;
                }
                Err(e) => {
                    abort(&mut child);
                    return Err(anyhow::Error::new(e)
                        .context("failed to write waveform frame to ffmpeg stdin")
                        .into());
                }
            }
        }
        drop(stdin);

        let status = child
            .wait()
            .context("failed to wait for ffmpeg to finish")?;
        let stderr_bytes = stderr_drain
            .join()
            .map_err(|_| anyhow::anyhow!("ffmpeg stderr drain thread panicked"))?
            .context("ffmpeg stderr read failed")?;

        tracing::debug!(frames = written, "waveform frames streamed");
        if !status.success() {
            return Err(MixerError::EncoderFailed {
                status: status.to_string(),
                stderr_tail: stderr_tail(&stderr_bytes, STDERR_TAIL_LINES),
            });
        }
        Ok(())
    }
}

impl EncoderGateway for FfmpegGateway {
    #[tracing::instrument(skip(self, plan), fields(output = %plan.output_path.display()))]
    fn execute(&mut self, plan: &ProcessingPlan) -> MixerResult<EncodedOutput> {
        remove_stale_output(&plan.output_path)?;
        ensure_parent_dir(&plan.output_path)?;
        tracing::debug!(ffmpeg = %self.ffmpeg_path.display(), args = ?plan.encoder_args, "encoding");

        match &plan.overlay {
            Some(spec) => self.run_overlay(plan, spec)?,
            None => self.run_plain(plan)?,
        }
        verify_output(&plan.output_path)
    }
}

/// Remove the file when dropped, unless it was never set.
struct TempFileGuard(Option<PathBuf>);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

fn abort(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_error(ffmpeg: &Path, e: std::io::Error) -> MixerError {
    MixerError::from(anyhow::anyhow!(
        "failed to spawn '{}' (is it installed and on PATH?): {e}",
        ffmpeg.display()
    ))
}

/// Delete a previous output at `path`; a missing file is fine.
pub(crate) fn remove_stale_output(path: &Path) -> MixerResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!("removed stale output '{}'", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(anyhow::Error::new(e)
            .context(format!("failed to remove stale output '{}'", path.display()))
            .into()),
    }
}

fn verify_output(path: &Path) -> MixerResult<EncodedOutput> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(EncodedOutput {
            path: path.to_path_buf(),
            size_bytes: meta.len(),
        }),
        _ => Err(MixerError::OutputNotCreated {
            path: path.to_path_buf(),
        }),
    }
}

/// Last `max_lines` non-empty lines of `stderr`, joined by newlines.
pub fn stderr_tail(stderr: &[u8], max_lines: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect();
    lines[lines.len().saturating_sub(max_lines)..].join("\n")
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> MixerResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when the encoder at `ffmpeg_path` runs and reports its version.
pub fn is_ffmpeg_available(ffmpeg_path: &Path) -> bool {
    Command::new(ffmpeg_path)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/gateway.rs"]
mod tests;
