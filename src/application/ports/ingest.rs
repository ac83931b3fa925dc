//! Remote ingestion port

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::delivery::UploadMode;

/// Transport-level errors (no usable response)
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to read response body: {0}")]
    BodyFailed(String),
}

/// A fully built upload request body, reused across attempts.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    /// Artifact file name, e.g. `sample3.wav`
    pub name: String,
    pub content: Vec<u8>,
    /// Lowercase hex SHA-256 of `content`
    pub digest: String,
    pub mode: UploadMode,
}

/// Raw response of the ingestion endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Port for sending an artifact to the ingestion endpoint
#[async_trait]
pub trait IngestTransport: Send + Sync {
    /// Issue one upload request. A returned response may still be a rejection.
    async fn send(&self, payload: &UploadPayload) -> Result<TransportResponse, TransportError>;
}

/// Port for the administrative side of the ingestion service
#[async_trait]
pub trait StoreAdmin: Send + Sync {
    /// Truncate every stored record. Returns the service's confirmation text.
    async fn clear_all(&self) -> Result<String, TransportError>;
}
