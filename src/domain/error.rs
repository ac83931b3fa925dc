//! Domain error types

use std::path::PathBuf;

use thiserror::Error;

/// A duration setting that does not parse
#[derive(Debug, Clone, Error)]
#[error("Invalid duration format: \"{input}\". Expected <number> followed by ms, s or m (e.g., 50ms, 10s, 1m30s)")]
pub struct DurationParseError {
    pub input: String,
}

/// An upload mode name that is neither `digest` nor `named`
#[derive(Debug, Clone, Error)]
#[error("Invalid upload mode: \"{input}\". Valid modes are: digest, named")]
pub struct InvalidUploadModeError {
    pub input: String,
}

/// Failures of the persisted configuration file
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    #[error("Config file {} is not valid TOML: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Cannot write config file {}: {message}", .path.display())]
    Write { path: PathBuf, message: String },

    #[error("Invalid config value for '{key}': {message}")]
    Invalid { key: String, message: String },

    #[error("Config file already exists at: {}", .0.display())]
    AlreadyExists(PathBuf),
}
