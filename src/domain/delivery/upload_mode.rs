//! Upload mode value object

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::InvalidUploadModeError;

/// Which companion part accompanies the artifact bytes in an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    /// Content plus its SHA-256 digest
    #[default]
    Digest,
    /// Content plus the artifact name
    Named,
}

impl UploadMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Digest => "digest",
            Self::Named => "named",
        }
    }
}

impl FromStr for UploadMode {
    type Err = InvalidUploadModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "digest" | "hash" => Ok(Self::Digest),
            "named" | "name" => Ok(Self::Named),
            _ => Err(InvalidUploadModeError {
                input: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for UploadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
