//! Application configuration value object

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::delivery::UploadMode;
use crate::domain::recording::Duration;

/// Ingestion endpoint used when nothing else is configured
pub const DEFAULT_ENDPOINT: &str = "http://therentistoodamnhigh.co.uk/api.php";

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub endpoint: Option<String>,
    pub segment_duration: Option<String>,
    pub settle_delay: Option<String>,
    pub output_dir: Option<String>,
    pub upload_mode: Option<String>,
    pub clear_store: Option<bool>,
    pub request_timeout: Option<String>,
    pub log_level: Option<String>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            endpoint: Some(DEFAULT_ENDPOINT.to_string()),
            segment_duration: Some(Duration::default_segment().to_string()),
            settle_delay: Some(Duration::default_settle().to_string()),
            output_dir: Some(".".to_string()),
            upload_mode: Some(UploadMode::default().to_string()),
            clear_store: Some(true),
            request_timeout: Some(Duration::default_request_timeout().to_string()),
            log_level: Some("info".to_string()),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            endpoint: other.endpoint.or(self.endpoint),
            segment_duration: other.segment_duration.or(self.segment_duration),
            settle_delay: other.settle_delay.or(self.settle_delay),
            output_dir: other.output_dir.or(self.output_dir),
            upload_mode: other.upload_mode.or(self.upload_mode),
            clear_store: other.clear_store.or(self.clear_store),
            request_timeout: other.request_timeout.or(self.request_timeout),
            log_level: other.log_level.or(self.log_level),
        }
    }

    pub fn endpoint_or_default(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    /// Segment duration, or the default if not set/invalid
    pub fn segment_duration_or_default(&self) -> Duration {
        parse_or(&self.segment_duration, Duration::default_segment())
    }

    /// Settling delay, or the default if not set/invalid
    pub fn settle_delay_or_default(&self) -> Duration {
        parse_or(&self.settle_delay, Duration::default_settle())
    }

    /// Request timeout, or the default if not set/invalid
    pub fn request_timeout_or_default(&self) -> Duration {
        parse_or(&self.request_timeout, Duration::default_request_timeout())
    }

    pub fn output_dir_or_default(&self) -> PathBuf {
        PathBuf::from(self.output_dir.as_deref().unwrap_or("."))
    }

    pub fn upload_mode_or_default(&self) -> UploadMode {
        self.upload_mode
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn clear_store_or_default(&self) -> bool {
        self.clear_store.unwrap_or(true)
    }

    pub fn log_level_or_default(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}

fn parse_or(value: &Option<String>, fallback: Duration) -> Duration {
    value
        .as_ref()
        .and_then(|s| s.parse().ok())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_expected_values() {
        let config = AppConfig::defaults();
        assert_eq!(config.endpoint.as_deref(), Some(DEFAULT_ENDPOINT));
        assert_eq!(config.segment_duration.as_deref(), Some("10s"));
        assert_eq!(config.settle_delay.as_deref(), Some("50ms"));
        assert_eq!(config.output_dir.as_deref(), Some("."));
        assert_eq!(config.upload_mode.as_deref(), Some("digest"));
        assert_eq!(config.clear_store, Some(true));
        assert_eq!(config.request_timeout.as_deref(), Some("30s"));
    }

    #[test]
    fn empty_has_all_none() {
        let config = AppConfig::empty();
        assert!(config.endpoint.is_none());
        assert!(config.segment_duration.is_none());
        assert!(config.clear_store.is_none());
    }

    #[test]
    fn merge_other_takes_precedence() {
        let base = AppConfig {
            endpoint: Some("http://base/api.php".to_string()),
            segment_duration: Some("10s".to_string()),
            ..Default::default()
        };
        let other = AppConfig {
            endpoint: Some("http://other/api.php".to_string()),
            clear_store: Some(false),
            ..Default::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.endpoint.as_deref(), Some("http://other/api.php"));
        assert_eq!(merged.segment_duration.as_deref(), Some("10s"));
        assert_eq!(merged.clear_store, Some(false));
    }

    #[test]
    fn accessors_fall_back_on_invalid_values() {
        let config = AppConfig {
            segment_duration: Some("forever".to_string()),
            settle_delay: Some("20ms".to_string()),
            upload_mode: Some("carrier-pigeon".to_string()),
            ..Default::default()
        };
        assert_eq!(config.segment_duration_or_default(), Duration::from_secs(10));
        assert_eq!(config.settle_delay_or_default(), Duration::from_millis(20));
        assert_eq!(config.upload_mode_or_default(), UploadMode::Digest);
    }

    #[test]
    fn empty_accessors_use_defaults() {
        let config = AppConfig::empty();
        assert_eq!(config.endpoint_or_default(), DEFAULT_ENDPOINT);
        assert_eq!(config.output_dir_or_default(), PathBuf::from("."));
        assert!(config.clear_store_or_default());
        assert_eq!(config.log_level_or_default(), "info");
        assert_eq!(config.request_timeout_or_default(), Duration::from_secs(30));
    }
}
