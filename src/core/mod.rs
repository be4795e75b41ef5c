//! # Core Infrastructure Module
//!
//! The buffer engines and the frame-aware extraction built on top of them.

pub mod buffer_view;
pub mod extraction;
pub mod frame_index;
pub mod ring_buffer;

pub use buffer_view::FixedBufferView;
pub use extraction::Criterion;
pub use frame_index::{FrameDescriptor, FrameType, Frames};
pub use ring_buffer::{Chunk, RingBuffer, StreamLock};
