//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with the audio hardware, the filesystem and the ingestion
//! endpoint.

pub mod artifact;
pub mod capture;
pub mod config;
pub mod ingest;
pub mod playback;

// Re-export adapters
pub use artifact::{WavArtifactStore, WavSegmentWriter};
pub use capture::CpalAudioSource;
pub use config::XdgConfigStore;
pub use ingest::HttpIngestClient;
pub use playback::RodioPlayer;
