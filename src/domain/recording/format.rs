//! Capture format value objects

use std::fmt;

/// Preferred capture sample rate (CD quality)
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

/// Captured samples are always signed 16-bit little-endian PCM
pub const PCM_BIT_DEPTH: u16 = 16;

/// A sample format fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
}

impl AudioFormat {
    /// Create a 16-bit PCM format
    pub const fn pcm16(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bit_depth: PCM_BIT_DEPTH,
        }
    }

    /// Pick the run format from the ranges a device advertises.
    ///
    /// Ranges that contain [`TARGET_SAMPLE_RATE`] win over ranges that do not;
    /// among equals, stereo beats mono and mono beats anything else. The first
    /// range wins a tie. Returns `None` when the device advertises nothing.
    pub fn negotiate(ranges: &[FormatRange]) -> Option<Self> {
        let mut best: Option<(&FormatRange, (bool, u8))> = None;

        for range in ranges.iter().filter(|r| r.channels > 0) {
            let score = (range.contains(TARGET_SAMPLE_RATE), channel_preference(range.channels));
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((range, score)),
            }
        }

        best.map(|(range, _)| {
            let rate = TARGET_SAMPLE_RATE.clamp(range.min_sample_rate, range.max_sample_rate);
            Self::pcm16(rate, range.channels)
        })
    }
}

fn channel_preference(channels: u16) -> u8 {
    match channels {
        2 => 2,
        1 => 1,
        _ => 0,
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::pcm16(TARGET_SAMPLE_RATE, 2)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}-bit",
            self.sample_rate, self.channels, self.bit_depth
        )
    }
}

/// One supported channel count with its sample rate range, as reported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatRange {
    pub channels: u16,
    pub min_sample_rate: u32,
    pub max_sample_rate: u32,
}

impl FormatRange {
    pub fn contains(&self, rate: u32) -> bool {
        self.min_sample_rate <= rate && rate <= self.max_sample_rate
    }
}
