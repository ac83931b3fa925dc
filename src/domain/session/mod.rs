//! Capture session domain module

mod capture_session;

pub use capture_session::{
    artifact_name, CaptureSession, InvalidStateTransition, SessionState, ARTIFACT_EXTENSION,
};
