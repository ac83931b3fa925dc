//! Domain layer - Core pipeline model
//!
//! Contains value objects, the capture session state machine, delivery
//! bookkeeping and domain errors.
//! This layer has no dependencies on external systems.

pub mod config;
pub mod delivery;
pub mod error;
pub mod recording;
pub mod session;

// Re-export common types
pub use config::AppConfig;
pub use delivery::{AttemptOutcome, DeliveryAttempt, RejectReason, UploadMode};
pub use error::*;
pub use recording::{AudioFormat, Duration, FormatRange};
pub use session::{artifact_name, CaptureSession, SessionState};
