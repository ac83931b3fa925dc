//! Delivery attempt bookkeeping

use std::fmt;

/// Upper bound on upload attempts for one segment
pub const MAX_ATTEMPTS: u32 = 3;

/// Largest artifact accepted for delivery (20 MiB)
pub const MAX_ARTIFACT_BYTES: u64 = 20 * 1024 * 1024;

/// Body the ingestion endpoint returns when it has stored an upload
pub const ACK_TOKEN: &str = "OK";

/// Why an attempt was not accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The request never produced a response (connect error, timeout, ...)
    Transport(String),
    /// The endpoint answered with a non-success status
    Status(u16),
    /// Success status, but the body was not the acknowledgement token
    NegativeAck(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport failure: {}", msg),
            Self::Status(code) => write!(f, "HTTP status {}", code),
            Self::NegativeAck(body) => write!(f, "negative acknowledgement: {:?}", body),
        }
    }
}

/// Result of a single attempt
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttemptOutcome {
    #[default]
    Pending,
    Accepted,
    Rejected(RejectReason),
}

impl AttemptOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Judge an endpoint response: accepted only on a success status AND a body
/// that is exactly [`ACK_TOKEN`], byte for byte.
pub fn judge_response(status: u16, body: &str) -> AttemptOutcome {
    if !(200..300).contains(&status) {
        return AttemptOutcome::Rejected(RejectReason::Status(status));
    }
    if body == ACK_TOKEN {
        AttemptOutcome::Accepted
    } else {
        AttemptOutcome::Rejected(RejectReason::NegativeAck(body.to_string()))
    }
}

/// One upload try for a segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAttempt {
    pub segment: u64,
    /// 1-based, never above [`MAX_ATTEMPTS`]
    pub attempt_number: u32,
    pub outcome: AttemptOutcome,
}

/// Everything that happened while delivering one artifact
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub segment: u64,
    pub artifact_name: String,
    pub digest: String,
    pub size_bytes: u64,
    pub attempts: Vec<DeliveryAttempt>,
}

impl DeliveryReport {
    /// True when the last attempt was accepted
    pub fn is_accepted(&self) -> bool {
        self.attempts
            .last()
            .is_some_and(|attempt| attempt.outcome.is_accepted())
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}
