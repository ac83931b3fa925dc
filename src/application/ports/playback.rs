//! Reference playback port

use std::path::Path;

use thiserror::Error;

/// Errors that can occur during reference playback
#[derive(Error, Debug, Clone)]
pub enum PlaybackError {
    #[error("Failed to load {path}: {message}")]
    LoadFailed { path: String, message: String },

    #[error("Audio output device not available: {0}")]
    DeviceNotAvailable(String),

    #[error("Playback failed: {0}")]
    PlaybackFailed(String),
}

/// Port for looping a reference file while the run captures
pub trait Player: Send + Sync {
    /// Start looping `path` in the background.
    fn play(&self, path: &Path) -> Result<(), PlaybackError>;

    /// Stop playback. Stopping when nothing plays is not an error.
    fn stop(&self) -> Result<(), PlaybackError>;
}
