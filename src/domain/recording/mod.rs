//! Recording domain module

mod duration;
mod format;

pub use duration::{
    Duration, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SEGMENT_SECS, DEFAULT_SETTLE_MS,
};
pub use format::{AudioFormat, FormatRange, PCM_BIT_DEPTH, TARGET_SAMPLE_RATE};
