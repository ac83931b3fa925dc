//! Segment delivery use case
//!
//! Reads a finalized artifact once, digests it, and pushes the same payload
//! to the ingestion endpoint until it is acknowledged or the attempt budget
//! runs out.

use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{error, info, warn};

use super::ports::{IngestTransport, UploadPayload};
use crate::domain::delivery::{
    judge_response, AttemptOutcome, DeliveryAttempt, DeliveryReport, RejectReason, UploadMode,
    MAX_ARTIFACT_BYTES, MAX_ATTEMPTS,
};

/// Errors that end delivery of one segment
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("Artifact {name} is {size} bytes, above the {limit} byte delivery limit")]
    TooLarge { name: String, size: u64, limit: u64 },

    #[error("Failed to read artifact {name}: {message}")]
    ReadFailed { name: String, message: String },

    #[error("Segment {} was not accepted after {} attempts", .0.segment, .0.attempt_count())]
    Exhausted(Box<DeliveryReport>),
}

impl DeliveryError {
    /// Attempts made before giving up (zero for pre-transport failures)
    pub fn attempts(&self) -> usize {
        match self {
            Self::Exhausted(report) => report.attempt_count(),
            _ => 0,
        }
    }
}

/// Uploads finished artifacts with bounded, sequential retries
pub struct DeliveryClient {
    transport: Arc<dyn IngestTransport>,
    mode: UploadMode,
    max_attempts: u32,
    max_bytes: u64,
}

impl DeliveryClient {
    pub fn new(transport: Arc<dyn IngestTransport>, mode: UploadMode) -> Self {
        Self {
            transport,
            mode,
            max_attempts: MAX_ATTEMPTS,
            max_bytes: MAX_ARTIFACT_BYTES,
        }
    }

    /// Override the artifact size bound
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Read `artifact` and build the request payload.
    ///
    /// The size is checked from metadata before anything is read.
    pub async fn build_payload(&self, artifact: &Path) -> Result<UploadPayload, DeliveryError> {
        let name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| artifact.to_string_lossy().into_owned());
        let size = tokio::fs::metadata(artifact)
            .await
            .map_err(|e| read_failed(&name, e))?
            .len();
        if size > self.max_bytes {
            return Err(DeliveryError::TooLarge {
                name,
                size,
                limit: self.max_bytes,
            });
        }

        let content = tokio::fs::read(artifact)
            .await
            .map_err(|e| read_failed(&name, e))?;
        // The file may have grown between the two calls
        if content.len() as u64 > self.max_bytes {
            return Err(DeliveryError::TooLarge {
                name,
                size: content.len() as u64,
                limit: self.max_bytes,
            });
        }

        let digest = hex::encode(Sha256::digest(&content));

        Ok(UploadPayload {
            name,
            content,
            digest,
            mode: self.mode,
        })
    }

    /// Deliver the artifact of `segment`.
    ///
    /// The payload is built exactly once and resent unchanged on every
    /// attempt. Attempts run strictly one after another and stop at the
    /// first acceptance.
    pub async fn deliver(
        &self,
        segment: u64,
        artifact: &Path,
    ) -> Result<DeliveryReport, DeliveryError> {
        let payload = match self.build_payload(artifact).await {
            Ok(payload) => payload,
            Err(e) => {
                error!(segment, "delivery aborted: {}", e);
                return Err(e);
            }
        };

        let mut report = DeliveryReport {
            segment,
            artifact_name: payload.name.clone(),
            digest: payload.digest.clone(),
            size_bytes: payload.content.len() as u64,
            attempts: Vec::with_capacity(self.max_attempts as usize),
        };

        for attempt_number in 1..=self.max_attempts {
            let outcome = match self.transport.send(&payload).await {
                Ok(response) => judge_response(response.status, &response.body),
                Err(e) => AttemptOutcome::Rejected(RejectReason::Transport(e.to_string())),
            };

            match &outcome {
                AttemptOutcome::Accepted => {
                    info!(
                        segment,
                        attempt = attempt_number,
                        artifact = %payload.name,
                        "upload acknowledged by server"
                    );
                }
                AttemptOutcome::Rejected(reason) if attempt_number < self.max_attempts => {
                    warn!(
                        segment,
                        attempt = attempt_number,
                        "upload rejected ({}), retransmitting ({} of {})",
                        reason,
                        attempt_number,
                        self.max_attempts - 1
                    );
                }
                AttemptOutcome::Rejected(reason) => {
                    warn!(segment, attempt = attempt_number, "upload rejected ({})", reason);
                }
                AttemptOutcome::Pending => {}
            }

            let accepted = outcome.is_accepted();
            report.attempts.push(DeliveryAttempt {
                segment,
                attempt_number,
                outcome,
            });
            if accepted {
                return Ok(report);
            }
        }

        error!(
            segment,
            artifact = %payload.name,
            "giving up after {} attempts",
            self.max_attempts
        );
        Err(DeliveryError::Exhausted(Box::new(report)))
    }
}

fn read_failed(name: &str, e: std::io::Error) -> DeliveryError {
    DeliveryError::ReadFailed {
        name: name.to_string(),
        message: e.to_string(),
    }
}
