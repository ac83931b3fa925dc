//! CLI presenter for output formatting

use colored::*;

use crate::application::{RunSummary, SegmentCompletion, SessionRecord};
use crate::domain::session::SessionState;

/// Presenter for CLI output formatting
pub struct Presenter;

impl Presenter {
    /// Create a new presenter
    pub fn new() -> Self {
        Self
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        eprintln!("{} {}", "ℹ".cyan(), message);
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green(), message);
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Output text to stdout
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Print a key-value pair (for config list)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }

    /// Announce a segment taking the device
    pub fn segment_started(&self, index: u64, total: u64) {
        eprintln!(
            "{} Recording {}...",
            "●".red(),
            Self::segment_label(index, total)
        );
    }

    /// Report a segment that released the device
    pub fn segment_finished(&self, completion: &SegmentCompletion) {
        let name = completion
            .artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match &completion.failure {
            None => self.success(&format!(
                "{} captured ({}), uploading in background",
                name,
                format_bytes(completion.captured_bytes)
            )),
            Some(reason) => self.warn(&format!("{} unusable: {}", name, reason)),
        }
    }

    /// Print one line per segment plus totals (stdout)
    pub fn summary(&self, summary: &RunSummary) {
        for session in &summary.sessions {
            self.output(&Self::session_line(session));
        }
        let line = format!(
            "{} of {} segments delivered",
            summary.completed(),
            summary.sessions.len()
        );
        if summary.failed() == 0 {
            self.success(&line);
        } else {
            self.warn(&line);
        }
    }

    /// `"3/10"` style position, 1-based for humans
    pub fn segment_label(index: u64, total: u64) -> String {
        format!("segment {}/{}", index + 1, total)
    }

    fn session_line(session: &SessionRecord) -> String {
        let status = match session.state {
            SessionState::Completed => format!(
                "delivered after {} attempt{}",
                session.attempts,
                if session.attempts == 1 { "" } else { "s" }
            ),
            _ => session
                .failure
                .clone()
                .unwrap_or_else(|| session.state.to_string()),
        };
        format!(
            "{}\t{}\t{}",
            session.artifact.display(),
            session.state,
            status
        )
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}

/// Human readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let value = bytes as f64;
    if value >= MB {
        format!("{:.1} MB", value / MB)
    } else if value >= KB {
        format!("{:.1} KB", value / KB)
    } else {
        format!("{} B", bytes)
    }
}
