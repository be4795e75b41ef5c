//! # Configuration Module
//!
//! This module provides sizing for the video ring buffer and the encoder timing
//! used by the split handshake.

pub mod config;
pub mod split;

pub use config::{DEFAULT_BITRATE, RingConfig};
pub use split::{MIN_SPLIT_TIMEOUT, SplitConfig};
