//! Audio capture infrastructure
//!
//! Provides the cpal-backed input device used for segment capture.

mod cpal_source;

pub use cpal_source::CpalAudioSource;
