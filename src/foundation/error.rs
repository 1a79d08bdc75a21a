use std::path::PathBuf;

use crate::media::asset::MediaKind;

/// Convenience result type used across the mixer.
pub type MixerResult<T> = Result<T, MixerError>;

/// Top-level error taxonomy used by the scanning, planning and encoding APIs.
#[derive(thiserror::Error, Debug)]
pub enum MixerError {
    /// Invalid user-provided configuration or arguments.
    #[error("validation error: {0}")]
    Validation(String),

    /// The input directory could not be read.
    #[error("scan error: {0}")]
    Scan(String),

    /// More than one audio file shares a stem.
    #[error("pairing ambiguity: stem '{stem}' has {} audio files ({})", paths.len(), join_paths(paths))]
    PairingAmbiguity {
        /// Shared file stem.
        stem: String,
        /// Every audio file found for the stem, sorted by file name.
        paths: Vec<PathBuf>,
    },

    /// The asset kind cannot be used in the requested role.
    #[error("unsupported media kind {kind:?} for '{}'", path.display())]
    UnsupportedMediaKind {
        /// Offending asset.
        path: PathBuf,
        /// Its classified kind.
        kind: MediaKind,
    },

    /// The duration of an audio or video asset could not be determined.
    #[error("duration unavailable for '{}': {reason}", path.display())]
    DurationUnavailable {
        /// Probed asset.
        path: PathBuf,
        /// Why probing failed.
        reason: String,
    },

    /// The pixel size of a visual could not be determined.
    #[error("frame size unavailable for '{}': {reason}", path.display())]
    FrameSizeUnavailable {
        /// Probed asset.
        path: PathBuf,
        /// Why probing failed.
        reason: String,
    },

    /// Spectral analysis or waveform rendering failed.
    #[error("analysis error: {0}")]
    Analysis(String),

    /// The encoder exited with a non-zero status.
    #[error("encoder failed ({status}): {stderr_tail}")]
    EncoderFailed {
        /// Exit status as reported by the OS.
        status: String,
        /// Last lines of the encoder's diagnostic output.
        stderr_tail: String,
    },

    /// The encoder reported success but left no usable output file.
    #[error("output not created: '{}'", path.display())]
    OutputNotCreated {
        /// Expected output path.
        path: PathBuf,
    },

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MixerError {
    /// Build a [`MixerError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MixerError::Scan`] value.
    pub fn scan(msg: impl Into<String>) -> Self {
        Self::Scan(msg.into())
    }

    /// Build a [`MixerError::Analysis`] value.
    pub fn analysis(msg: impl Into<String>) -> Self {
        Self::Analysis(msg.into())
    }

    /// Build a [`MixerError::DurationUnavailable`] value.
    pub fn duration_unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::DurationUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build a [`MixerError::FrameSizeUnavailable`] value.
    pub fn frame_size_unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FrameSizeUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
