//! # Ring Configuration
//!
//! Sizing for a video ring buffer. The capacity is given either directly in
//! bytes or as a number of seconds at an expected bitrate, never both.
//!
//! | Parameter | Type | Description |
//! |-----------|------|-------------|
//! | `size` | `Option<usize>` | Capacity in bytes |
//! | `seconds` | `Option<u64>` | Capacity as seconds of video at `bitrate` |
//! | `bitrate` | `u64` | Expected encoder bitrate in bits per second |
//!
//! ```rust
//! use frame_ring::config::RingConfig;
//!
//! let config = RingConfig::from_seconds(20);
//! assert!(config.validate().is_ok());
//! assert_eq!(config.capacity().unwrap(), 17_000_000 * 20 / 8);
//! ```

use crate::error::{BufferError, BufferResult};

/// Default encoder bitrate used to turn seconds into bytes.
pub const DEFAULT_BITRATE: u64 = 17_000_000;

/// Configuration for a video ring buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingConfig {
    /// Capacity in bytes.
    pub size: Option<usize>,

    /// Capacity expressed as seconds of video at `bitrate`.
    pub seconds: Option<u64>,

    /// Expected bitrate (bits per second) of the encoded stream. Only used
    /// when `seconds` is set.
    pub bitrate: u64,
}

impl Default for RingConfig {
    /// Twenty seconds at the default bitrate.
    fn default() -> Self {
        Self::from_seconds(20)
    }
}

impl RingConfig {
    pub fn new(size: Option<usize>, seconds: Option<u64>, bitrate: u64) -> Self {
        Self {
            size,
            seconds,
            bitrate,
        }
    }

    pub fn from_size(size: usize) -> Self {
        Self::new(Some(size), None, DEFAULT_BITRATE)
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self::new(None, Some(seconds), DEFAULT_BITRATE)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> BufferResult<()> {
        match (self.size, self.seconds) {
            (None, None) => Err(BufferError::invalid_configuration(
                "size",
                "none",
                "you must specify either size or seconds",
            )),
            (Some(_), Some(_)) => Err(BufferError::invalid_configuration(
                "seconds",
                format!("{:?}", self.seconds),
                "you cannot specify both size and seconds",
            )),
            (Some(0), None) => Err(BufferError::invalid_configuration(
                "size",
                "0",
                "size must be a positive integer",
            )),
            (None, Some(_)) if self.bitrate == 0 => Err(BufferError::invalid_configuration(
                "bitrate",
                "0",
                "bitrate must be positive when sizing by seconds",
            )),
            (None, Some(seconds)) if seconds == 0 => Err(BufferError::invalid_configuration(
                "seconds",
                "0",
                "seconds must be positive",
            )),
            _ => Ok(()),
        }
    }

    /// Capacity in bytes after validation.
    pub fn capacity(&self) -> BufferResult<usize> {
        self.validate()?;
        if let Some(size) = self.size {
            return Ok(size);
        }
        let seconds = self.seconds.unwrap_or_default();
        let bytes = self.bitrate.saturating_mul(seconds) / 8;
        usize::try_from(bytes)
            .ok()
            .filter(|&bytes| bytes > 0)
            .ok_or_else(|| {
                BufferError::invalid_configuration(
                    "seconds",
                    seconds.to_string(),
                    "resulting capacity is empty or does not fit in memory",
                )
            })
    }
}
