//! Delivery domain module

mod attempt;
mod upload_mode;

pub use attempt::{
    judge_response, AttemptOutcome, DeliveryAttempt, DeliveryReport, RejectReason, ACK_TOKEN,
    MAX_ARTIFACT_BYTES, MAX_ATTEMPTS,
};
pub use upload_mode::UploadMode;
