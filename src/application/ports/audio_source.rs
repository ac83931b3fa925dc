//! Audio input port

use thiserror::Error;

use crate::domain::recording::{AudioFormat, FormatRange};

/// Audio source errors
#[derive(Debug, Clone, Error)]
pub enum AudioSourceError {
    #[error("No audio input device available")]
    NoDevice,

    #[error("Audio device is already in use")]
    Busy,

    #[error("Failed to query device capabilities: {0}")]
    Capabilities(String),

    #[error("Failed to open audio device: {0}")]
    OpenFailed(String),

    #[error("Failed to release audio device: {0}")]
    CloseFailed(String),
}

/// Receives captured bytes (16-bit little-endian PCM, interleaved).
///
/// Invoked on the device's own thread; it must only hand the bytes off and
/// return.
pub type FrameCallback = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// Port for a hardware audio input device.
///
/// The device is exclusive: at most one [`CaptureStream`] may be open at a time.
pub trait AudioSource: Send + Sync {
    /// Supported channel/sample-rate combinations, queried once at startup.
    fn capabilities(&self) -> Result<Vec<FormatRange>, AudioSourceError>;

    /// Acquire the device and start delivering frames to `on_frame`.
    ///
    /// The callback is owned by the returned stream and is dropped when the
    /// stream is closed, so no frame can reach it afterwards.
    fn open(
        &self,
        format: AudioFormat,
        on_frame: FrameCallback,
    ) -> Result<Box<dyn CaptureStream>, AudioSourceError>;
}

/// An open capture on the device.
pub trait CaptureStream: Send {
    /// Stop capture and release the device.
    ///
    /// Returns only once the device is released and the frame callback has
    /// been dropped.
    fn close(self: Box<Self>) -> Result<(), AudioSourceError>;
}
