//! # Frame Index
//!
//! Frame descriptors describe how the encoded byte stream breaks down into
//! frames. One descriptor is attached to each chunk appended to the video
//! buffer (or `None` for bytes with no frame activity, such as zero fill).
//!
//! Offsets stored by the producer are relative to the whole encoding history,
//! which is useless once old chunks have been evicted. [`Frames`] therefore
//! recomputes `stream_size`/`split_size` from the cumulative offsets of the
//! chunks that survive, and hides descriptors whose frame start has already
//! been evicted.

use std::collections::VecDeque;

use serde::Serialize;

use super::ring_buffer::Chunk;

/// Kind of encoder output a frame represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    /// Ordinary inter-coded frame data
    #[default]
    Data,
    /// Intra-coded frame that can be decoded on its own
    KeyFrame,
    /// Stream header (e.g. SPS/PPS); the natural place to start a clip
    Header,
    /// Side information such as motion vectors, not part of the video stream
    SideInfo,
}

/// Metadata for one frame (or the part of it written so far).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FrameDescriptor {
    /// Frame number; increases by one each time a frame completes
    pub index: u64,
    pub frame_type: FrameType,
    /// Bytes of this frame written so far
    pub frame_size: usize,
    /// Cumulative size of the encoded stream including this frame
    pub stream_size: usize,
    /// Bytes written since the last split point
    pub split_size: usize,
    /// Presentation time in microseconds; never decreases
    pub timestamp: u64,
    /// True when this write ended the frame
    pub complete: bool,
}

impl FrameDescriptor {
    /// Offset of the frame's first byte relative to the current segment.
    pub fn position(&self) -> usize {
        self.split_size.saturating_sub(self.frame_size)
    }

    /// Byte offset one past the frame's last byte.
    pub fn end(&self) -> usize {
        self.position() + self.frame_size
    }

    pub fn is_key_frame(&self) -> bool {
        self.frame_type == FrameType::KeyFrame
    }

    pub fn is_header(&self) -> bool {
        self.frame_type == FrameType::Header
    }

    fn rebased(&self, offset: usize) -> Self {
        Self {
            stream_size: offset,
            split_size: offset,
            ..*self
        }
    }
}

/// Lazy, double-ended sequence of frame descriptors over a buffer snapshot.
///
/// Each yielded descriptor has `stream_size == split_size ==` the end offset of
/// its chunk in the buffer, so `position()` is the frame's start offset in the
/// buffer. Descriptors whose start offset would be negative are skipped.
#[derive(Debug, Clone)]
pub struct Frames {
    entries: VecDeque<(usize, Option<FrameDescriptor>)>,
    front_offset: usize,
    back_offset: usize,
}

impl Frames {
    pub(crate) fn from_chunks(chunks: &[Chunk<Option<FrameDescriptor>>]) -> Self {
        let entries: VecDeque<_> = chunks.iter().map(|c| (c.len(), c.meta)).collect();
        let total = entries.iter().map(|(len, _)| len).sum();
        Self {
            entries,
            front_offset: 0,
            back_offset: total,
        }
    }

    /// Total byte length of the snapshot this sequence was taken from.
    pub fn byte_len(&self) -> usize {
        self.back_offset
    }
}

impl Iterator for Frames {
    type Item = FrameDescriptor;

    fn next(&mut self) -> Option<FrameDescriptor> {
        while let Some((len, frame)) = self.entries.pop_front() {
            self.front_offset += len;
            if let Some(frame) = frame {
                if self.front_offset >= frame.frame_size {
                    return Some(frame.rebased(self.front_offset));
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.entries.len()))
    }
}

impl DoubleEndedIterator for Frames {
    fn next_back(&mut self) -> Option<FrameDescriptor> {
        while let Some((len, frame)) = self.entries.pop_back() {
            let end = self.back_offset;
            self.back_offset -= len;
            if let Some(frame) = frame {
                if end >= frame.frame_size {
                    return Some(frame.rebased(end));
                }
            }
        }
        None
    }
}
