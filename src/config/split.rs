//! # Split Configuration
//!
//! Encoder timing parameters that bound how long a caller waits for the
//! producer to reach a split point.

use std::time::Duration;

use crate::error::{BufferError, BufferResult};

/// Shortest wait ever used for a split point.
pub const MIN_SPLIT_TIMEOUT: Duration = Duration::from_secs(15);

/// Encoder timing used to bound split waits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitConfig {
    /// Frames between key frames (and therefore between headers). A value of
    /// 1 makes every buffer eligible as a split point.
    pub intra_period: u32,

    /// Frames per second produced by the encoder.
    pub framerate: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            intra_period: 60,
            framerate: 30.0,
        }
    }
}

impl SplitConfig {
    pub fn new(intra_period: u32, framerate: f64) -> Self {
        Self {
            intra_period,
            framerate,
        }
    }

    pub fn validate(&self) -> BufferResult<()> {
        if self.intra_period == 0 {
            return Err(BufferError::invalid_configuration(
                "intra_period",
                "0",
                "intra period must be at least 1",
            ));
        }
        if !self.framerate.is_finite() || self.framerate <= 0.0 {
            return Err(BufferError::invalid_configuration(
                "framerate",
                self.framerate.to_string(),
                "framerate must be a positive number",
            ));
        }
        Ok(())
    }

    /// Three intra periods' worth of time, and never less than
    /// [`MIN_SPLIT_TIMEOUT`].
    pub fn split_timeout(&self) -> Duration {
        let periods = Duration::from_secs_f64(
            (self.intra_period as f64 / self.framerate.max(f64::MIN_POSITIVE)) * 3.0,
        );
        periods.max(MIN_SPLIT_TIMEOUT)
    }

    /// Whether splits need an explicit key frame request to happen promptly.
    pub fn needs_key_frame_request(&self) -> bool {
        self.intra_period > 1
    }
}
