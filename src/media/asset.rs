use std::path::{Path, PathBuf};

use crate::config::settings::{FormatConfig, normalize_extension};
use crate::foundation::error::{MixerError, MixerResult};

/// Closed set of media roles recognized by extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum MediaKind {
    /// Audio track; always the `audio` side of a pair.
    Audio,
    /// Video clip used as the visual.
    Video,
    /// Still image used as the visual.
    Image,
}

impl MediaKind {
    /// Classify an extension (any case, with or without dot) against the configured sets.
    pub fn classify(ext: &str, formats: &FormatConfig) -> Option<Self> {
        let ext = normalize_extension(ext);
        if formats.audio.contains(&ext) {
            Some(Self::Audio)
        } else if formats.video.contains(&ext) {
            Some(Self::Video)
        } else if formats.image.contains(&ext) {
            Some(Self::Image)
        } else {
            None
        }
    }
}

/// One classified file on disk.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaAsset {
    /// File path; identity of the asset.
    pub path: PathBuf,
    /// File name without extension; join key between audio and visuals.
    pub stem: String,
    /// Classified role.
    pub kind: MediaKind,
    /// Duration in seconds once probed (audio at scan time, video during planning).
    pub duration_secs: Option<f64>,
}

impl MediaAsset {
    /// Build an asset from a path, deriving its stem.
    pub fn new(path: impl Into<PathBuf>, kind: MediaKind) -> MixerResult<Self> {
        let path = path.into();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                MixerError::validation(format!("'{}' has no file stem", path.display()))
            })?;
        Ok(Self {
            path,
            stem,
            kind,
            duration_secs: None,
        })
    }

    /// Classify `path` by its extension; `None` when the extension is not configured.
    pub fn from_path(path: &Path, formats: &FormatConfig) -> Option<Self> {
        let kind = MediaKind::classify(&path.extension()?.to_string_lossy(), formats)?;
        Self::new(path, kind).ok()
    }

    /// Same asset with a known duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    /// File name as a platform-independent string.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Lower-case extension without the dot.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| normalize_extension(&e.to_string_lossy()))
            .unwrap_or_default()
    }
}

/// One audio track bound to exactly one visual.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaPair {
    /// The audio side.
    pub audio: MediaAsset,
    /// The video or image side.
    pub visual: MediaAsset,
}

impl MediaPair {
    /// Pair two assets discovered by stem matching.
    pub fn new(audio: MediaAsset, visual: MediaAsset) -> MixerResult<Self> {
        if audio.stem != visual.stem {
            return Err(MixerError::validation(format!(
                "pair stems differ: '{}' vs '{}'",
                audio.stem, visual.stem
            )));
        }
        Self::explicit(audio, visual)
    }

    /// Pair two user-selected assets whose stems may differ.
    pub fn explicit(audio: MediaAsset, visual: MediaAsset) -> MixerResult<Self> {
        if audio.kind != MediaKind::Audio {
            return Err(MixerError::UnsupportedMediaKind {
                path: audio.path,
                kind: audio.kind,
            });
        }
        Ok(Self { audio, visual })
    }

    /// `true` when the visual is a video clip.
    pub fn is_video(&self) -> bool {
        self.visual.kind == MediaKind::Video
    }

    /// Output file name: `prefix + audio stem + ".mp4"`.
    pub fn output_name(&self, prefix: &str) -> String {
        format!("{prefix}{}.mp4", self.audio.stem)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/asset.rs"]
mod tests;
