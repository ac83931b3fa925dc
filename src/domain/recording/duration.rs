//! Duration value object

use std::fmt;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use crate::domain::error::DurationParseError;

/// Default length of one capture segment (10 seconds)
pub const DEFAULT_SEGMENT_SECS: u64 = 10;

/// Default pause between releasing the device and starting the next segment
pub const DEFAULT_SETTLE_MS: u64 = 50;

/// Default HTTP request timeout for a single delivery attempt
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Value object representing a time span with millisecond resolution.
/// Immutable and validated on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration {
    milliseconds: u64,
}

impl Duration {
    /// Create a Duration from milliseconds
    pub const fn from_millis(ms: u64) -> Self {
        Self { milliseconds: ms }
    }

    /// Create a Duration from seconds
    pub const fn from_secs(secs: u64) -> Self {
        Self {
            milliseconds: secs * 1000,
        }
    }

    /// Default segment length (10 seconds)
    pub const fn default_segment() -> Self {
        Self::from_secs(DEFAULT_SEGMENT_SECS)
    }

    /// Default device settling delay (50 milliseconds)
    pub const fn default_settle() -> Self {
        Self::from_millis(DEFAULT_SETTLE_MS)
    }

    /// Default per-attempt request timeout (30 seconds)
    pub const fn default_request_timeout() -> Self {
        Self::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    pub const fn as_millis(&self) -> u64 {
        self.milliseconds
    }

    pub const fn as_std(&self) -> StdDuration {
        StdDuration::from_millis(self.milliseconds)
    }
}

impl FromStr for Duration {
    type Err = DurationParseError;

    /// Parse strings such as "50ms", "10s", "2m", "1m30s" or "1s500ms".
    /// Units must appear in descending order (m, s, ms), each at most once.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || DurationParseError {
            input: s.to_string(),
        };
        let input = s.trim().to_lowercase();
        if input.is_empty() {
            return Err(err());
        }

        let mut rest = input.as_str();
        let mut total_ms: u64 = 0;
        // Rank of the last unit seen: m = 3, s = 2, ms = 1
        let mut last_rank = u8::MAX;

        while !rest.is_empty() {
            let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
            if digits == 0 {
                return Err(err());
            }
            let value: u64 = rest[..digits].parse().map_err(|_| err())?;
            rest = &rest[digits..];

            let (factor, rank, unit_len) = if rest.starts_with("ms") {
                (1, 1, 2)
            } else if rest.starts_with('m') {
                (60_000, 3, 1)
            } else if rest.starts_with('s') {
                (1000, 2, 1)
            } else {
                return Err(err());
            };
            if rank >= last_rank {
                return Err(err());
            }
            last_rank = rank;
            rest = &rest[unit_len..];

            total_ms = value
                .checked_mul(factor)
                .and_then(|ms| total_ms.checked_add(ms))
                .ok_or_else(err)?;
        }

        if total_ms == 0 {
            return Err(err());
        }

        Ok(Self::from_millis(total_ms))
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = self.milliseconds / 60_000;
        let seconds = (self.milliseconds % 60_000) / 1000;
        let millis = self.milliseconds % 1000;

        let mut wrote = false;
        if minutes > 0 {
            write!(f, "{}m", minutes)?;
            wrote = true;
        }
        if seconds > 0 {
            write!(f, "{}s", seconds)?;
            wrote = true;
        }
        if millis > 0 || !wrote {
            write!(f, "{}ms", millis)?;
        }
        Ok(())
    }
}

impl Default for Duration {
    fn default() -> Self {
        Self::default_segment()
    }
}
