//! Segment artifact infrastructure
//!
//! Streams captured PCM straight to disk as RIFF/WAVE files.

mod wav_writer;

pub use wav_writer::{WavArtifactStore, WavSegmentWriter};
