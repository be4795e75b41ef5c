//! # Producer Boundary
//!
//! Everything between an encoder and the buffers it records into:
//!
//! - [`tracker`]: derives a [`FrameDescriptor`](crate::FrameDescriptor) for
//!   each encoder buffer from its flags
//! - [`split`]: the request/acknowledge handshake for switching outputs at a
//!   split point
//! - [`recorder`]: routes buffers to the video and side-information sinks

pub mod recorder;
pub mod split;
pub mod tracker;

pub use recorder::{BoxedSink, FrameSink, Recorder, SplitTarget, WriterSink};
pub use split::{SplitController, SplitResolver, SplitTicket};
pub use tracker::{BufferFlags, EncodedBuffer, FrameTracker};
