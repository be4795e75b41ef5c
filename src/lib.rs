//! # Frame Ring
//!
//! A bounded, chunked circular byte buffer that keeps an index of the video
//! frames written into it, so the most recent footage can be held in fixed
//! memory and a frame-aligned clip pulled out on demand.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `core`: the ring buffer stream, fixed buffer views, the frame index and
//!   the extraction engine
//! - `video_ring`: the composed buffer a recorder writes into
//! - `producer`: descriptor derivation, split handshake and output routing
//! - `config`: buffer sizing and split timing
//! - `error`: error types and classification
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use frame_ring::producer::{BufferFlags, EncodedBuffer, Recorder};
//! use frame_ring::{CopyOptions, SplitConfig, VideoRingBuffer};
//!
//! let ring = Arc::new(VideoRingBuffer::new(64 * 1024)?);
//! let mut recorder = Recorder::new(Arc::clone(&ring), SplitConfig::default());
//!
//! let header = BufferFlags { config: true, frame_end: true, ..Default::default() };
//! recorder.on_buffer(EncodedBuffer::new(vec![0u8; 16], header, Some(1)))?;
//! let frame = BufferFlags { key_frame: true, frame_end: true, ..Default::default() };
//! recorder.on_buffer(EncodedBuffer::new(vec![1u8; 512], frame, Some(1)))?;
//!
//! let mut clip = Vec::new();
//! let copied = ring.copy_to(&mut clip, CopyOptions::last_seconds(2.0))?;
//! assert_eq!(copied.written, 528);
//! # Ok::<(), frame_ring::BufferError>(())
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod producer;
pub mod video_ring;

/// Re-export error types for convenience
pub use error::{
    BufferError, BufferResult, ErrorContext, ErrorSeverity, HasRecoverySuggestion, HasSeverity,
    Retryable,
};

pub use crate::config::{RingConfig, SplitConfig};
pub use crate::core::{Criterion, FixedBufferView, FrameDescriptor, FrameType, Frames, RingBuffer};
pub use crate::video_ring::{CopiedRange, CopyOptions, VideoRingBuffer};
