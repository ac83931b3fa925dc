//! Streaming WAV segment writer
//!
//! Frames arrive as little-endian 16-bit PCM bytes and are handed to
//! [`hound::WavWriter`] sample by sample. A sample split across two chunks is
//! carried over to the next append.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{debug, warn};

use crate::application::ports::{ArtifactError, ArtifactStore, SegmentSink};
use crate::domain::recording::AudioFormat;

/// Largest data chunk a 32-bit RIFF size field can describe
const MAX_DATA_SIZE: u64 = u32::MAX as u64 - 36;

/// Writes one segment's PCM frames into a WAV file.
pub struct WavSegmentWriter {
    path: PathBuf,
    writer: Option<WavWriter<BufWriter<File>>>,
    /// Low byte of a sample whose high byte has not arrived yet
    pending: Option<u8>,
    data_len: u64,
}

impl WavSegmentWriter {
    /// Create (or truncate) `path` and write the header.
    pub fn create(path: &Path, format: AudioFormat) -> Result<Self, ArtifactError> {
        let spec = WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: format.bit_depth,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(path, spec).map_err(|e| ArtifactError::CreateFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        debug!(path = %path.display(), %format, "artifact created");
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
            pending: None,
            data_len: 0,
        })
    }
}

fn write_failed(path: &Path, e: hound::Error) -> ArtifactError {
    ArtifactError::WriteFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

impl SegmentSink for WavSegmentWriter {
    fn append(&mut self, bytes: &[u8]) -> Result<(), ArtifactError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ArtifactError::AlreadyFinalized(self.path.clone()))?;

        let buffered = self.pending.map_or(0, |_| 1);
        let new_len = self.data_len + ((bytes.len() as u64 + buffered) & !1);
        if new_len > MAX_DATA_SIZE {
            return Err(ArtifactError::Oversized {
                path: self.path.clone(),
                bytes: new_len,
            });
        }

        let joined: Vec<u8>;
        let data = match self.pending.take() {
            Some(low) => {
                joined = std::iter::once(low).chain(bytes.iter().copied()).collect();
                &joined[..]
            }
            None => bytes,
        };

        let mut pairs = data.chunks_exact(2);
        for pair in &mut pairs {
            writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .map_err(|e| write_failed(&self.path, e))?;
            self.data_len += 2;
        }
        self.pending = pairs.remainder().first().copied();
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), ArtifactError> {
        // Taking the writer makes any later call fail, even if this one does
        let writer = self
            .writer
            .take()
            .ok_or_else(|| ArtifactError::AlreadyFinalized(self.path.clone()))?;
        if self.pending.take().is_some() {
            warn!(path = %self.path.display(), "dropping half a sample at end of segment");
        }
        writer
            .finalize()
            .map_err(|e| write_failed(&self.path, e))?;

        debug!(path = %self.path.display(), bytes = self.data_len, "artifact finalized");
        Ok(())
    }

    fn data_len(&self) -> u64 {
        self.data_len
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Creates [`WavSegmentWriter`]s on the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct WavArtifactStore;

impl WavArtifactStore {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactStore for WavArtifactStore {
    fn create(
        &self,
        path: &Path,
        format: AudioFormat,
    ) -> Result<Box<dyn SegmentSink>, ArtifactError> {
        Ok(Box::new(WavSegmentWriter::create(path, format)?))
    }
}
