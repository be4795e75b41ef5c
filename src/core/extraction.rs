//! # Extraction Engine
//!
//! Locates the frame-aligned byte range that answers a bounded query (the last
//! N bytes, seconds, or frames, or everything) and copies it to a sink.
//!
//! The search walks descriptors newest first. The newest descriptor is always
//! the end of the range. Walking back, a descriptor is part of the range only
//! while the distance from the newest one is still below the budget; the last
//! descriptor seen before the budget is reached is the boundary. Within that
//! range the oldest descriptor of the requested type becomes the start, and if
//! there is none the oldest descriptor in range is used instead.

use std::io::Write;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use super::frame_index::{FrameDescriptor, FrameType, Frames};
use super::ring_buffer::Chunk;
use crate::error::{BufferError, BufferResult};

/// What portion of the buffer to extract.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Criterion {
    /// Every frame still in the buffer
    All,
    /// Frames within this many stream bytes of the newest frame
    Bytes(usize),
    /// Frames within this much presentation time of the newest frame
    Duration(Duration),
    /// Frames within this many frame indices of the newest frame
    Frames(u64),
}

impl Criterion {
    /// Builds a criterion from optional budgets, at most one of which may be
    /// set. None set means [`Criterion::All`].
    ///
    /// # Errors
    ///
    /// `AmbiguousQuery` when more than one budget is given.
    pub fn from_budgets(
        size: Option<usize>,
        seconds: Option<f64>,
        frames: Option<u64>,
    ) -> BufferResult<Self> {
        let mut given = Vec::new();
        if size.is_some() {
            given.push("size");
        }
        if seconds.is_some() {
            given.push("seconds");
        }
        if frames.is_some() {
            given.push("frames");
        }
        if given.len() > 1 {
            return Err(BufferError::ambiguous_query(given));
        }

        if let Some(size) = size {
            return Ok(Self::Bytes(size));
        }
        if let Some(seconds) = seconds {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(BufferError::invalid_configuration(
                    "seconds",
                    seconds.to_string(),
                    "must be a non-negative number of seconds",
                ));
            }
            return Ok(Self::Duration(Duration::from_secs_f64(seconds)));
        }
        Ok(frames.map_or(Self::All, Self::Frames))
    }

    fn budget(&self) -> Option<u64> {
        match self {
            Self::All => None,
            Self::Bytes(size) => Some(*size as u64),
            Self::Duration(duration) => Some(duration.as_micros() as u64),
            Self::Frames(count) => Some(*count),
        }
    }

    fn metric(&self, frame: &FrameDescriptor) -> u64 {
        match self {
            Self::All => 0,
            Self::Bytes(_) => frame.stream_size as u64,
            Self::Duration(_) => frame.timestamp,
            Self::Frames(_) => frame.index,
        }
    }
}

fn matches(frame: &FrameDescriptor, first_frame_type: Option<FrameType>) -> bool {
    first_frame_type.is_none_or(|wanted| wanted == frame.frame_type)
}

/// Finds the `(first, last)` descriptors bounding the range for `criterion`.
///
/// Returns `(None, None)` when `frames` yields nothing.
pub fn find(
    frames: Frames,
    criterion: Criterion,
    first_frame_type: Option<FrameType>,
) -> (Option<FrameDescriptor>, Option<FrameDescriptor>) {
    let Some(budget) = criterion.budget() else {
        return find_all(frames, first_frame_type);
    };

    let mut last: Option<FrameDescriptor> = None;
    let mut first = None;
    let mut oldest = None;
    for frame in frames.rev() {
        match last {
            None => last = Some(frame),
            Some(newest) => {
                if criterion.metric(&newest).saturating_sub(criterion.metric(&frame)) >= budget {
                    break;
                }
            }
        }
        oldest = Some(frame);
        if matches(&frame, first_frame_type) {
            first = Some(frame);
        }
    }
    (first.or(oldest), last)
}

fn find_all(
    mut frames: Frames,
    first_frame_type: Option<FrameType>,
) -> (Option<FrameDescriptor>, Option<FrameDescriptor>) {
    let last = frames.clone().next_back();
    let oldest = frames.clone().next();
    let first = frames.find(|frame| matches(frame, first_frame_type));
    (first.or(oldest), last)
}

/// Slices of `chunks` covering exactly `[first.position(), last.end())`.
///
/// Every chunk is walked to keep the running offset; the slices share memory
/// with the chunks.
pub fn collect_range<M>(
    chunks: &[Chunk<M>],
    first: &FrameDescriptor,
    last: &FrameDescriptor,
) -> Vec<Bytes> {
    let start = first.position();
    let end = last.end();
    let mut slices = Vec::new();
    let mut pos = 0;
    for chunk in chunks {
        let chunk_start = pos;
        let chunk_end = pos + chunk.len();
        pos = chunk_end;

        let lo = start.max(chunk_start);
        let hi = end.min(chunk_end);
        if lo < hi {
            slices.push(chunk.data.slice(lo - chunk_start..hi - chunk_start));
        }
    }
    debug!(start, end, slices = slices.len(), "collected frame range");
    slices
}

/// Writes `slices` to `sink` in order and flushes it.
///
/// # Errors
///
/// `SinkRejected` on the first failed write, carrying the bytes already
/// written. Remaining slices are not attempted.
pub fn write_slices<W: Write + ?Sized>(sink: &mut W, slices: &[Bytes]) -> BufferResult<usize> {
    let mut written = 0;
    for slice in slices {
        sink.write_all(slice)
            .map_err(|e| BufferError::sink_rejected(written, e))?;
        written += slice.len();
    }
    sink.flush()
        .map_err(|e| BufferError::sink_rejected(written, e))?;
    Ok(written)
}
