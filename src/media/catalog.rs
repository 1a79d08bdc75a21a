use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::settings::{AudioCollisionPolicy, FormatConfig};
use crate::foundation::error::{MixerError, MixerResult};
use crate::media::asset::{MediaAsset, MediaKind};
use crate::media::probe::DurationProbe;

/// Classified contents of one directory.
#[derive(Clone, Debug, Default)]
pub struct ScanResult {
    /// Audio assets with probed durations, one per stem, in first-seen stem order.
    pub audio: Vec<MediaAsset>,
    /// Video candidates per stem, sorted by file name.
    pub videos: BTreeMap<String, Vec<MediaAsset>>,
    /// Image candidates per stem, sorted by file name.
    pub images: BTreeMap<String, Vec<MediaAsset>>,
    /// Stems with more than one audio file.
    pub collisions: Vec<AudioCollision>,
    /// Audio files left out because their duration could not be determined.
    pub dropped: Vec<DroppedAsset>,
}

impl ScanResult {
    /// Video candidates for `stem`, sorted by file name.
    pub fn videos_for(&self, stem: &str) -> &[MediaAsset] {
        self.videos.get(stem).map(Vec::as_slice).unwrap_or_default()
    }

    /// Image candidates for `stem`, sorted by file name.
    pub fn images_for(&self, stem: &str) -> &[MediaAsset] {
        self.images.get(stem).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Several audio files sharing one stem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioCollision {
    /// Shared stem.
    pub stem: String,
    /// Every colliding audio file, sorted by file name.
    pub paths: Vec<PathBuf>,
    /// The file kept under [`AudioCollisionPolicy::FirstByName`]; `None` when the stem was skipped.
    pub kept: Option<PathBuf>,
}

impl AudioCollision {
    /// The collision as a reportable error.
    pub fn to_error(&self) -> MixerError {
        MixerError::PairingAmbiguity {
            stem: self.stem.clone(),
            paths: self.paths.clone(),
        }
    }
}

/// An asset removed from the catalog, with the reason.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DroppedAsset {
    /// Dropped file.
    pub path: PathBuf,
    /// Why it was dropped.
    pub reason: String,
}

/// Classify the direct files of `dir` and probe every kept audio file.
///
/// Entries are visited in file-name order so the result never depends on how the filesystem
/// happens to list them. Subdirectories (including the results folder) are not visited.
#[tracing::instrument(skip(formats, probe))]
pub fn scan_directory(
    dir: &Path,
    formats: &FormatConfig,
    policy: AudioCollisionPolicy,
    probe: &dyn DurationProbe,
) -> MixerResult<ScanResult> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| MixerError::scan(format!("cannot read '{}': {e}", dir.display())))?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if path.is_file() {
                    files.push(path);
                }
            }
            Err(e) => tracing::warn!("skipping unreadable entry in '{}': {e}", dir.display()),
        }
    }
    files.sort_by_key(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()));

    let mut scan = ScanResult::default();
    let mut audio_order: Vec<String> = Vec::new();
    let mut audio_by_stem: BTreeMap<String, Vec<MediaAsset>> = BTreeMap::new();

    for path in files {
        let Some(asset) = MediaAsset::from_path(&path, formats) else {
            continue;
        };
        match asset.kind {
            MediaKind::Audio => {
                let group = audio_by_stem.entry(asset.stem.clone()).or_default();
                if group.is_empty() {
                    audio_order.push(asset.stem.clone());
                }
                group.push(asset);
            }
            MediaKind::Video => scan.videos.entry(asset.stem.clone()).or_default().push(asset),
            MediaKind::Image => scan.images.entry(asset.stem.clone()).or_default().push(asset),
        }
    }

    for stem in audio_order {
        let Some(mut group) = audio_by_stem.remove(&stem) else {
            continue;
        };
        let chosen = if group.len() > 1 {
            let kept = match policy {
                AudioCollisionPolicy::Reject => None,
                AudioCollisionPolicy::FirstByName => Some(group.remove(0)),
            };
            let mut paths: Vec<PathBuf> = group.iter().map(|a| a.path.clone()).collect();
            if let Some(kept) = &kept {
                paths.insert(0, kept.path.clone());
            }
            let collision = AudioCollision {
                stem: stem.clone(),
                paths,
                kept: kept.as_ref().map(|a| a.path.clone()),
            };
            tracing::warn!("{}", collision.to_error());
            scan.collisions.push(collision);
            kept
        } else {
            group.pop()
        };

        let Some(audio) = chosen else {
            continue;
        };
        match probe.probe_duration(&audio.path) {
            Ok(secs) if secs.is_finite() && secs > 0.0 => {
                scan.audio.push(audio.with_duration(secs));
            }
            Ok(secs) => drop_asset(&mut scan, audio.path, format!("invalid duration {secs}")),
            Err(e) => drop_asset(&mut scan, audio.path, e.to_string()),
        }
    }

    tracing::debug!(
        audio = scan.audio.len(),
        video_stems = scan.videos.len(),
        image_stems = scan.images.len(),
        "scan complete"
    );
    Ok(scan)
}

fn drop_asset(scan: &mut ScanResult, path: PathBuf, reason: String) {
    tracing::warn!("dropping '{}': {reason}", path.display());
    scan.dropped.push(DroppedAsset { path, reason });
}

#[cfg(test)]
#[path = "../../tests/unit/media/catalog.rs"]
mod tests;
