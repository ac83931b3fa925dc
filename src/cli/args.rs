//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::domain::config::AppConfig;
use crate::domain::delivery::UploadMode;

/// SegmentRelay - segmented audio capture with remote hand-off
#[derive(Parser, Debug)]
#[command(name = "segment-relay")]
#[command(version)]
#[command(
    about = "Capture audio in fixed-length segments and upload each one to an ingestion endpoint"
)]
#[command(long_about = None)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
pub struct Cli {
    /// Reference audio file looped during capture, relative to the working directory
    #[arg(value_name = "REFERENCE", required = true)]
    pub reference: Option<PathBuf>,

    /// Number of segments to capture
    #[arg(
        value_name = "SEGMENTS",
        required = true,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub segments: Option<u64>,

    /// Length of each segment (e.g., 10s, 1m, 1m30s)
    #[arg(short = 'd', long, value_name = "TIME")]
    pub duration: Option<String>,

    /// Ingestion endpoint URL
    #[arg(short = 'e', long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Directory that receives the segment artifacts
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// What accompanies each uploaded artifact
    #[arg(short = 'm', long, value_name = "MODE")]
    pub mode: Option<UploadModeArg>,

    /// Do not clear the remote store before capturing
    #[arg(long)]
    pub no_clear: bool,

    /// Config subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Config overrides given on the command line
    pub fn to_config(&self) -> AppConfig {
        AppConfig {
            endpoint: self.endpoint.clone(),
            segment_duration: self.duration.clone(),
            output_dir: self
                .output_dir
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            upload_mode: self.mode.map(|m| UploadMode::from(m).to_string()),
            clear_store: if self.no_clear { Some(false) } else { None },
            ..Default::default()
        }
    }
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Upload mode argument for clap ValueEnum
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum UploadModeArg {
    /// Send the SHA-256 digest with the content
    Digest,
    /// Send the artifact name with the content
    Named,
}

impl From<UploadModeArg> for UploadMode {
    fn from(arg: UploadModeArg) -> Self {
        match arg {
            UploadModeArg::Digest => UploadMode::Digest,
            UploadModeArg::Named => UploadMode::Named,
        }
    }
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "endpoint",
    "segment_duration",
    "settle_delay",
    "output_dir",
    "upload_mode",
    "clear_store",
    "request_timeout",
    "log_level",
];

/// Accepted `log_level` values
pub const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}
