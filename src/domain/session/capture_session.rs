//! Capture session state machine

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::recording::AudioFormat;

/// File extension of finalized artifacts
pub const ARTIFACT_EXTENSION: &str = "wav";

/// Artifact file name for the segment at `index`
pub fn artifact_name(index: u64) -> String {
    format!("sample{}.{}", index, ARTIFACT_EXTENSION)
}

/// Lifecycle states of one capture segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Recording,
    Finalizing,
    Delivering,
    Completed,
    Failed,
}

impl SessionState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Finalizing => "finalizing",
            Self::Delivering => "delivering",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition for segment {index}: cannot {action} while {current_state}")]
pub struct InvalidStateTransition {
    pub index: u64,
    pub current_state: SessionState,
    pub action: String,
}

/// One segment's lifecycle record.
///
/// State machine (strictly forward, no state is revisited):
///   IDLE -> RECORDING (start_recording)
///   RECORDING -> FINALIZING (begin_finalize)
///   FINALIZING -> DELIVERING (begin_delivery)
///   DELIVERING -> COMPLETED (complete)
///   any non-terminal -> FAILED (fail)
#[derive(Debug, Clone)]
pub struct CaptureSession {
    index: u64,
    artifact_path: PathBuf,
    format: AudioFormat,
    state: SessionState,
    failure: Option<String>,
}

impl CaptureSession {
    /// Create an idle session whose artifact lives in `output_dir`
    pub fn new(index: u64, output_dir: &Path, format: AudioFormat) -> Self {
        Self {
            index,
            artifact_path: output_dir.join(artifact_name(index)),
            format,
            state: SessionState::Idle,
            failure: None,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Reason recorded by the transition into FAILED, if any
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn start_recording(&mut self) -> Result<(), InvalidStateTransition> {
        self.advance(SessionState::Idle, SessionState::Recording, "start recording")
    }

    pub fn begin_finalize(&mut self) -> Result<(), InvalidStateTransition> {
        self.advance(SessionState::Recording, SessionState::Finalizing, "finalize")
    }

    pub fn begin_delivery(&mut self) -> Result<(), InvalidStateTransition> {
        self.advance(SessionState::Finalizing, SessionState::Delivering, "deliver")
    }

    pub fn complete(&mut self) -> Result<(), InvalidStateTransition> {
        self.advance(SessionState::Delivering, SessionState::Completed, "complete")
    }

    /// Move any non-terminal session to FAILED
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), InvalidStateTransition> {
        if self.state.is_terminal() {
            return Err(self.invalid("fail"));
        }
        self.state = SessionState::Failed;
        self.failure = Some(reason.into());
        Ok(())
    }

    fn advance(
        &mut self,
        from: SessionState,
        to: SessionState,
        action: &str,
    ) -> Result<(), InvalidStateTransition> {
        if self.state != from {
            return Err(self.invalid(action));
        }
        self.state = to;
        Ok(())
    }

    fn invalid(&self, action: &str) -> InvalidStateTransition {
        InvalidStateTransition {
            index: self.index,
            current_state: self.state,
            action: action.to_string(),
        }
    }
}
