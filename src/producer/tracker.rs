//! Frame descriptor derivation from encoder buffer flags.
//!
//! Encoders hand over output in buffers that may hold a whole frame, part of
//! one, a stream header or side information. [`FrameTracker`] keeps the
//! running counters and turns each buffer into the [`FrameDescriptor`] that is
//! stored alongside its bytes.

use bytes::Bytes;

use crate::core::frame_index::{FrameDescriptor, FrameType};

/// Flags an encoder attaches to each output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferFlags {
    pub key_frame: bool,
    /// Codec configuration (stream header)
    pub config: bool,
    /// Side information such as motion vectors
    pub side_info: bool,
    /// The buffer ends the current frame
    pub frame_end: bool,
    pub end_of_stream: bool,
}

impl BufferFlags {
    pub fn frame_type(&self) -> FrameType {
        if self.key_frame {
            FrameType::KeyFrame
        } else if self.config {
            FrameType::Header
        } else if self.side_info {
            FrameType::SideInfo
        } else {
            FrameType::Data
        }
    }
}

/// One buffer of encoder output.
#[derive(Debug, Clone, Default)]
pub struct EncodedBuffer {
    pub data: Bytes,
    pub flags: BufferFlags,
    /// Presentation time in microseconds, if the encoder knows it
    pub pts: Option<u64>,
}

impl EncodedBuffer {
    pub fn new(data: impl Into<Bytes>, flags: BufferFlags, pts: Option<u64>) -> Self {
        Self {
            data: data.into(),
            flags,
            pts,
        }
    }
}

/// Running frame counters for one encoder.
#[derive(Debug, Clone, Default)]
pub struct FrameTracker {
    last: FrameDescriptor,
}

impl FrameTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives the descriptor for `buffer` and makes it the current one.
    ///
    /// Side information does not count towards the stream or split sizes, and
    /// a missing or zero timestamp repeats the previous one.
    pub fn observe(&mut self, buffer: &EncodedBuffer) -> FrameDescriptor {
        let last = self.last;
        let len = buffer.data.len();
        let flags = buffer.flags;
        let video_len = if flags.side_info { 0 } else { len };

        self.last = FrameDescriptor {
            index: if last.complete { last.index + 1 } else { last.index },
            frame_type: flags.frame_type(),
            frame_size: if last.complete {
                len
            } else {
                last.frame_size + len
            },
            stream_size: last.stream_size + video_len,
            split_size: last.split_size + video_len,
            timestamp: match buffer.pts {
                None | Some(0) => last.timestamp,
                Some(pts) => pts,
            },
            complete: flags.frame_end,
        };
        self.last
    }

    /// Starts a new segment at the current frame: its `position()` becomes 0.
    pub fn rebase_split(&mut self) -> FrameDescriptor {
        self.last.split_size = self.last.frame_size;
        self.last
    }

    pub fn last(&self) -> FrameDescriptor {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = FrameDescriptor::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(len: usize, flags: BufferFlags, pts: Option<u64>) -> EncodedBuffer {
        EncodedBuffer::new(vec![0u8; len], flags, pts)
    }

    fn frame_end() -> BufferFlags {
        BufferFlags {
            frame_end: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_partial_buffers_accumulate() {
        let mut tracker = FrameTracker::new();
        let a = tracker.observe(&buffer(10, BufferFlags::default(), Some(100)));
        let b = tracker.observe(&buffer(5, frame_end(), Some(100)));
        assert_eq!((a.index, a.frame_size, a.complete), (0, 10, false));
        assert_eq!((b.index, b.frame_size, b.complete), (0, 15, true));
        assert_eq!(b.position(), 0);

        let c = tracker.observe(&buffer(7, frame_end(), Some(200)));
        assert_eq!((c.index, c.frame_size), (1, 7));
        assert_eq!(c.stream_size, 22);
        assert_eq!(c.position(), 15);
    }

    #[test]
    fn test_frame_type_precedence() {
        let flags = BufferFlags {
            key_frame: true,
            config: true,
            ..Default::default()
        };
        assert_eq!(flags.frame_type(), FrameType::KeyFrame);
        let flags = BufferFlags {
            config: true,
            side_info: true,
            ..Default::default()
        };
        assert_eq!(flags.frame_type(), FrameType::Header);
        assert_eq!(BufferFlags::default().frame_type(), FrameType::Data);
    }

    #[test]
    fn test_side_info_does_not_grow_stream() {
        let mut tracker = FrameTracker::new();
        tracker.observe(&buffer(10, frame_end(), Some(1)));
        let side = tracker.observe(&buffer(
            4,
            BufferFlags {
                side_info: true,
                frame_end: true,
                ..Default::default()
            },
            Some(1),
        ));
        assert_eq!(side.frame_type, FrameType::SideInfo);
        assert_eq!(side.stream_size, 10);
        assert_eq!(side.split_size, 10);
    }

    #[test]
    fn test_unknown_timestamp_repeats_previous() {
        let mut tracker = FrameTracker::new();
        tracker.observe(&buffer(1, frame_end(), Some(500)));
        assert_eq!(tracker.observe(&buffer(1, frame_end(), None)).timestamp, 500);
        assert_eq!(tracker.observe(&buffer(1, frame_end(), Some(0))).timestamp, 500);
        assert_eq!(tracker.observe(&buffer(1, frame_end(), Some(900))).timestamp, 900);
    }

    #[test]
    fn test_rebase_split() {
        let mut tracker = FrameTracker::new();
        tracker.observe(&buffer(100, frame_end(), Some(1)));
        tracker.observe(&buffer(
            8,
            BufferFlags {
                config: true,
                ..Default::default()
            },
            Some(2),
        ));
        let split = tracker.rebase_split();
        assert_eq!(split.position(), 0);
        assert_eq!(split.stream_size, 108);

        let next = tracker.observe(&buffer(4, frame_end(), Some(2)));
        assert_eq!(next.split_size, 12);
        assert_eq!(next.position(), 0);
    }
}
