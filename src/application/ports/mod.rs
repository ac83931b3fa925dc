//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod artifact;
pub mod audio_source;
pub mod config;
pub mod ingest;
pub mod playback;

// Re-export common types
pub use artifact::{ArtifactError, ArtifactStore, SegmentSink};
pub use audio_source::{AudioSource, AudioSourceError, CaptureStream, FrameCallback};
pub use config::ConfigStore;
pub use ingest::{IngestTransport, StoreAdmin, TransportError, TransportResponse, UploadPayload};
pub use playback::{PlaybackError, Player};
