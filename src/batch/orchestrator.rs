use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::settings::MixerConfig;
use crate::encode::gateway::{EncoderGateway, remove_stale_output};
use crate::foundation::error::{MixerError, MixerResult};
use crate::media::asset::{MediaAsset, MediaKind, MediaPair};
use crate::media::catalog::scan_directory;
use crate::media::pairing::{resolve_pairs, unpaired_stems};
use crate::media::probe::DurationProbe;
use crate::plan::planner::{ProcessingPlanner, SCRATCH_DIR};
use crate::waveform::bars::ColorMode;

/// Stage of a batch run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchPhase {
    /// Listing and probing the input directory.
    Scanning,
    /// Matching audio stems to visuals.
    Resolving,
    /// Encoding pair `index` (1-based) of `total`.
    Processing {
        /// 1-based pair index.
        index: usize,
        /// Number of pairs in the batch.
        total: usize,
    },
    /// All pairs handled.
    Done,
}

/// Progress notification delivered to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchEvent {
    /// Human-readable status line.
    Status(String),
    /// Overall percentage, non-decreasing within a run.
    Progress(u8),
    /// Phase transition.
    Phase(BatchPhase),
    /// Terminal signal; `success` is `true` when every pair was encoded.
    Finished {
        /// Whether the run completed without failures or cancellation.
        success: bool,
    },
}

/// Result of one pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PairOutcome {
    /// Output written.
    Success {
        /// Output file.
        output_path: PathBuf,
        /// Output size in bytes.
        size_bytes: u64,
    },
    /// The pair failed; the batch moved on.
    Failure {
        /// Error message.
        reason: String,
    },
}

impl PairOutcome {
    /// `true` for [`PairOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// A stem that never became a pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedStem {
    /// The stem.
    pub stem: String,
    /// Why it was skipped.
    pub reason: String,
}

/// Aggregate result of a run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchResult {
    /// Number of resolved pairs.
    pub total: usize,
    /// Pairs encoded successfully.
    pub succeeded: usize,
    /// One entry per processed pair, in processing order.
    pub outcomes: Vec<(MediaPair, PairOutcome)>,
    /// Stems left out before processing.
    pub skipped: Vec<SkippedStem>,
    /// The run stopped early on request.
    pub cancelled: bool,
}

impl BatchResult {
    /// Pairs that were processed and failed.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded
    }

    fn is_success(&self) -> bool {
        !self.cancelled && self.succeeded == self.total
    }
}

/// Per-run options.
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Draw the spectrum overlay with this color mode.
    pub waveform: Option<ColorMode>,
    /// Checked between pairs; setting it stops the run after the current pair.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl RunOptions {
    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Runs whole directories or single pairs through planning and encoding.
pub struct BatchOrchestrator<'a> {
    cfg: &'a MixerConfig,
    probe: &'a dyn DurationProbe,
    gateway: &'a mut dyn EncoderGateway,
}

impl<'a> BatchOrchestrator<'a> {
    /// Orchestrator over the given configuration, probe and encoder.
    pub fn new(
        cfg: &'a MixerConfig,
        probe: &'a dyn DurationProbe,
        gateway: &'a mut dyn EncoderGateway,
    ) -> Self {
        Self {
            cfg,
            probe,
            gateway,
        }
    }

    /// Pair every audio file in `input_dir` with its visual and encode the pairs into the
    /// results folder.
    ///
    /// Only a failing scan is an error; pair failures are recorded and the run continues.
    #[tracing::instrument(skip(self, opts, on_event))]
    pub fn run(
        &mut self,
        input_dir: &Path,
        opts: &RunOptions,
        on_event: &mut dyn FnMut(BatchEvent),
    ) -> MixerResult<BatchResult> {
        on_event(BatchEvent::Phase(BatchPhase::Scanning));
        on_event(BatchEvent::Progress(0));
        on_event(BatchEvent::Status(format!(
            "Scanning '{}'",
            input_dir.display()
        )));
        let scan = match scan_directory(
            input_dir,
            &self.cfg.formats,
            self.cfg.audio_collision,
            self.probe,
        ) {
            Ok(scan) => scan,
            Err(e) => {
                on_event(BatchEvent::Status(format!("Scan failed: {e}")));
                on_event(BatchEvent::Finished { success: false });
                return Err(e);
            }
        };

        on_event(BatchEvent::Phase(BatchPhase::Resolving));
        let pairs = resolve_pairs(&scan, &self.cfg.formats);
        let mut result = BatchResult {
            total: pairs.len(),
            ..BatchResult::default()
        };
        for collision in &scan.collisions {
            if collision.kept.is_none() {
                result.skipped.push(SkippedStem {
                    stem: collision.stem.clone(),
                    reason: collision.to_error().to_string(),
                });
            }
        }
        for dropped in &scan.dropped {
            let stem = dropped
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            result.skipped.push(SkippedStem {
                stem,
                reason: dropped.reason.clone(),
            });
        }
        for stem in unpaired_stems(&scan) {
            result.skipped.push(SkippedStem {
                stem,
                reason: "no matching video or image".to_string(),
            });
        }
        for skipped in &result.skipped {
            on_event(BatchEvent::Status(format!(
                "Skipping '{}': {}",
                skipped.stem, skipped.reason
            )));
        }
        on_event(BatchEvent::Status(format!("Found {} pair(s)", pairs.len())));
        tracing::info!(pairs = pairs.len(), skipped = result.skipped.len(), "pairs resolved");

        let out_dir = self.cfg.results_dir(input_dir);
        let planner = ProcessingPlanner::new(self.cfg, self.probe);
        let total = pairs.len();
        for (i, pair) in pairs.into_iter().enumerate() {
            if opts.is_cancelled() {
                tracing::info!(remaining = total - i, "batch cancelled");
                on_event(BatchEvent::Status("Cancelled".to_string()));
                result.cancelled = true;
                break;
            }
            let index = i + 1;
            on_event(BatchEvent::Phase(BatchPhase::Processing { index, total }));
            on_event(BatchEvent::Status(format!(
                "Processing {index}/{total}: {} + {}",
                pair.audio.file_name(),
                pair.visual.file_name()
            )));

            let outcome = self.process_pair(&planner, &pair, opts.waveform, &out_dir);
            report_outcome(&pair, &outcome, on_event);
            if outcome.is_success() {
                result.succeeded += 1;
            }
            result.outcomes.push((pair, outcome));
            on_event(BatchEvent::Progress(percent(index, total)));
        }

        remove_empty_scratch_dir(&out_dir);
        on_event(BatchEvent::Phase(BatchPhase::Done));
        if !result.cancelled {
            on_event(BatchEvent::Progress(100));
        }
        on_event(BatchEvent::Status(format!(
            "Done: {}/{} succeeded",
            result.succeeded, result.total
        )));
        tracing::info!(
            succeeded = result.succeeded,
            total = result.total,
            cancelled = result.cancelled,
            "batch finished"
        );
        on_event(BatchEvent::Finished {
            success: result.is_success(),
        });
        Ok(result)
    }

    /// Encode one user-selected audio file with one visual into `output_dir`.
    ///
    /// The stems do not need to match. Progress is reported as 5, 10 and 100.
    #[tracing::instrument(skip(self, opts, on_event))]
    pub fn run_single(
        &mut self,
        audio: &Path,
        visual: &Path,
        output_dir: &Path,
        opts: &RunOptions,
        on_event: &mut dyn FnMut(BatchEvent),
    ) -> MixerResult<BatchResult> {
        on_event(BatchEvent::Progress(5));
        on_event(BatchEvent::Status(format!(
            "Preparing {} + {}",
            audio.display(),
            visual.display()
        )));
        let pair = match self.single_pair(audio, visual) {
            Ok(pair) => pair,
            Err(e) => {
                on_event(BatchEvent::Status(format!("Cannot pair inputs: {e}")));
                on_event(BatchEvent::Finished { success: false });
                return Err(e);
            }
        };

        on_event(BatchEvent::Phase(BatchPhase::Processing { index: 1, total: 1 }));
        on_event(BatchEvent::Progress(10));
        let planner = ProcessingPlanner::new(self.cfg, self.probe);
        let outcome = self.process_pair(&planner, &pair, opts.waveform, output_dir);
        report_outcome(&pair, &outcome, on_event);
        remove_empty_scratch_dir(output_dir);

        let result = BatchResult {
            total: 1,
            succeeded: usize::from(outcome.is_success()),
            outcomes: vec![(pair, outcome)],
            ..BatchResult::default()
        };
        on_event(BatchEvent::Phase(BatchPhase::Done));
        on_event(BatchEvent::Progress(100));
        on_event(BatchEvent::Finished {
            success: result.is_success(),
        });
        Ok(result)
    }

    fn single_pair(&self, audio: &Path, visual: &Path) -> MixerResult<MediaPair> {
        for path in [audio, visual] {
            if !path.is_file() {
                return Err(MixerError::validation(format!(
                    "'{}' is not a file",
                    path.display()
                )));
            }
        }
        let audio_asset = MediaAsset::from_path(audio, &self.cfg.formats)
            .filter(|a| a.kind == MediaKind::Audio)
            .ok_or_else(|| {
                MixerError::validation(format!(
                    "'{}' is not a supported audio file",
                    audio.display()
                ))
            })?;
        let visual_asset = MediaAsset::from_path(visual, &self.cfg.formats).ok_or_else(|| {
            MixerError::validation(format!(
                "'{}' is not a supported video or image file",
                visual.display()
            ))
        })?;
        MediaPair::explicit(audio_asset, visual_asset)
    }

    fn process_pair(
        &mut self,
        planner: &ProcessingPlanner<'_>,
        pair: &MediaPair,
        waveform: Option<ColorMode>,
        out_dir: &Path,
    ) -> PairOutcome {
        let stale = out_dir.join(pair.output_name(&self.cfg.output_prefix));
        let encoded = remove_stale_output(&stale)
            .and_then(|()| planner.plan(pair, waveform, out_dir))
            .and_then(|plan| self.gateway.execute(&plan));
        match encoded {
            Ok(out) => PairOutcome::Success {
                output_path: out.path,
                size_bytes: out.size_bytes,
            },
            Err(e) => PairOutcome::Failure {
                reason: e.to_string(),
            },
        }
    }
}

fn report_outcome(pair: &MediaPair, outcome: &PairOutcome, on_event: &mut dyn FnMut(BatchEvent)) {
    match outcome {
        PairOutcome::Success {
            output_path,
            size_bytes,
        } => {
            tracing::info!(
                stem = %pair.audio.stem,
                size_bytes,
                "wrote '{}'",
                output_path.display()
            );
            on_event(BatchEvent::Status(format!(
                "Created {} ({size_bytes} bytes)",
                output_path.display()
            )));
        }
        PairOutcome::Failure { reason } => {
            tracing::warn!(stem = %pair.audio.stem, "pair failed: {reason}");
            on_event(BatchEvent::Status(format!(
                "Failed {}: {reason}",
                pair.audio.stem
            )));
        }
    }
}

fn percent(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (index * 100 / total).min(100) as u8
}

fn remove_empty_scratch_dir(out_dir: &Path) {
    // Only succeeds when every scratch file was cleaned up.
    let _ = std::fs::remove_dir(out_dir.join(SCRATCH_DIR));
}

#[cfg(test)]
#[path = "../../tests/unit/batch/orchestrator.rs"]
mod tests;
