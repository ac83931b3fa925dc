//! Segment artifact port

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::recording::AudioFormat;

/// Artifact writing errors
#[derive(Debug, Clone, Error)]
pub enum ArtifactError {
    #[error("Failed to create artifact {path}: {message}")]
    CreateFailed { path: PathBuf, message: String },

    #[error("Failed to write artifact {path}: {message}")]
    WriteFailed { path: PathBuf, message: String },

    #[error("Artifact {0} was already finalized")]
    AlreadyFinalized(PathBuf),

    #[error("Artifact {path} exceeds the container size limit ({bytes} bytes of audio)")]
    Oversized { path: PathBuf, bytes: u64 },
}

/// Accumulates the raw frames of one segment.
pub trait SegmentSink: Send {
    /// Append bytes in arrival order.
    fn append(&mut self, bytes: &[u8]) -> Result<(), ArtifactError>;

    /// Write the final header, flush and close. Calling it twice is an error.
    fn finalize(&mut self) -> Result<(), ArtifactError>;

    /// Audio bytes appended so far (header excluded)
    fn data_len(&self) -> u64;

    fn path(&self) -> &Path;
}

/// Creates the sink for a segment's artifact.
pub trait ArtifactStore: Send + Sync {
    fn create(&self, path: &Path, format: AudioFormat)
        -> Result<Box<dyn SegmentSink>, ArtifactError>;
}
