//! # Video Ring Buffer
//!
//! The circular buffer the encoder writes into while recording "the last N
//! seconds". Every chunk carries the descriptor of the frame it belongs to, so
//! a consumer can later pull out a frame-aligned clip.
//!
//! ## Example
//!
//! ```rust
//! use frame_ring::{CopyOptions, FrameDescriptor, FrameType, VideoRingBuffer};
//!
//! let ring = VideoRingBuffer::new(1024)?;
//! for (index, len) in [10usize, 20, 30].into_iter().enumerate() {
//!     let frame = FrameDescriptor {
//!         index: index as u64,
//!         frame_type: FrameType::Data,
//!         frame_size: len,
//!         complete: true,
//!         ..Default::default()
//!     };
//!     ring.append(vec![index as u8; len], Some(frame))?;
//! }
//!
//! let mut clip = Vec::new();
//! let copied = ring.copy_to(&mut clip, CopyOptions::last_frames(1))?;
//! assert_eq!(clip.len(), 30);
//! assert_eq!(copied.last.unwrap().index, 2);
//! # Ok::<(), frame_ring::BufferError>(())
//! ```

use std::fs::File;
use std::io::{SeekFrom, Write};
use std::ops::Deref;
use std::path::Path;

use bytes::Bytes;
use serde::Serialize;
use tracing::debug;

use crate::config::RingConfig;
use crate::core::extraction::{self, Criterion};
use crate::core::frame_index::{FrameDescriptor, FrameType, Frames};
use crate::core::ring_buffer::RingBuffer;
use crate::error::{BufferError, BufferResult};

/// Extraction query for [`VideoRingBuffer::copy_to`].
///
/// At most one of `size`, `seconds` and `frames` may be set; none set copies
/// everything. `first_frame_type` picks the kind of frame the clip should start
/// on (`None` accepts any) and defaults to [`FrameType::Header`] so the clip is
/// decodable on its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CopyOptions {
    pub size: Option<usize>,
    pub seconds: Option<f64>,
    pub frames: Option<u64>,
    pub first_frame_type: Option<FrameType>,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            size: None,
            seconds: None,
            frames: None,
            first_frame_type: Some(FrameType::Header),
        }
    }
}

impl CopyOptions {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn last_bytes(size: usize) -> Self {
        Self {
            size: Some(size),
            ..Self::default()
        }
    }

    pub fn last_seconds(seconds: f64) -> Self {
        Self {
            seconds: Some(seconds),
            ..Self::default()
        }
    }

    pub fn last_frames(frames: u64) -> Self {
        Self {
            frames: Some(frames),
            ..Self::default()
        }
    }

    pub fn starting_at(mut self, first_frame_type: Option<FrameType>) -> Self {
        self.first_frame_type = first_frame_type;
        self
    }

    pub fn criterion(&self) -> BufferResult<Criterion> {
        Criterion::from_budgets(self.size, self.seconds, self.frames)
    }
}

/// Outcome of a copy: the bounding descriptors and the bytes written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CopiedRange {
    pub first: Option<FrameDescriptor>,
    pub last: Option<FrameDescriptor>,
    pub written: usize,
}

/// Circular byte stream with a frame index over its chunks.
///
/// Derefs to the underlying [`RingBuffer`] for the byte-stream interface
/// (`read`, `seek`, `tell`, `truncate`, `getvalue`, `lock`, ...).
#[derive(Debug)]
pub struct VideoRingBuffer {
    stream: RingBuffer<Option<FrameDescriptor>>,
}

impl VideoRingBuffer {
    pub fn new(capacity: usize) -> BufferResult<Self> {
        Ok(Self {
            stream: RingBuffer::new(capacity)?,
        })
    }

    pub fn from_config(config: &RingConfig) -> BufferResult<Self> {
        Self::new(config.capacity()?)
    }

    /// Appends `data` at the cursor with the descriptor of the frame it belongs
    /// to. The pair is evicted together.
    pub fn append(
        &self,
        data: impl Into<Bytes>,
        frame: Option<FrameDescriptor>,
    ) -> BufferResult<usize> {
        self.stream.append_with(data.into(), frame)
    }

    /// Descriptors whose frames are still fully in the buffer, oldest first;
    /// `.rev()` walks newest first.
    pub fn frames(&self) -> BufferResult<Frames> {
        let chunks = self.stream.chunks()?;
        Ok(Frames::from_chunks(&chunks))
    }

    /// Bounding descriptors for `criterion`, without copying anything.
    pub fn find(
        &self,
        criterion: Criterion,
        first_frame_type: Option<FrameType>,
    ) -> BufferResult<(Option<FrameDescriptor>, Option<FrameDescriptor>)> {
        Ok(extraction::find(self.frames()?, criterion, first_frame_type))
    }

    /// Copies the range selected by `options` to `sink`.
    ///
    /// The range is resolved and its chunk slices gathered under the lock; the
    /// sink is written after the lock is released. The buffer is never
    /// modified.
    ///
    /// # Errors
    ///
    /// `AmbiguousQuery` if more than one budget is set, `SinkRejected` if the
    /// sink fails part way through.
    pub fn copy_to<W: Write + ?Sized>(
        &self,
        sink: &mut W,
        options: CopyOptions,
    ) -> BufferResult<CopiedRange> {
        let criterion = options.criterion()?;
        let (first, last, slices) = {
            let _lock = self.stream.lock();
            let chunks = self.stream.chunks()?;
            let (first, last) = extraction::find(
                Frames::from_chunks(&chunks),
                criterion,
                options.first_frame_type,
            );
            let slices = match (&first, &last) {
                (Some(first), Some(last)) => extraction::collect_range(&chunks, first, last),
                _ => Vec::new(),
            };
            (first, last, slices)
        };

        let written = extraction::write_slices(sink, &slices)?;
        debug!(
            ?criterion,
            first = first.map(|f| f.index),
            last = last.map(|f| f.index),
            written,
            "copied clip"
        );
        Ok(CopiedRange {
            first,
            last,
            written,
        })
    }

    /// Creates (or truncates) the file at `path` and copies into it.
    pub fn copy_to_path(
        &self,
        path: impl AsRef<Path>,
        options: CopyOptions,
    ) -> BufferResult<CopiedRange> {
        let mut file = File::create(path.as_ref()).map_err(|e| {
            BufferError::sink_rejected(0, e)
                .with_context(format!("opening {}", path.as_ref().display()))
        })?;
        self.copy_to(&mut file, options)
    }

    /// Empties the buffer.
    pub fn clear(&self) -> BufferResult<()> {
        let _lock = self.stream.lock();
        self.stream.seek(SeekFrom::Start(0))?;
        self.stream.truncate(None)?;
        Ok(())
    }

    /// The underlying byte stream.
    pub fn stream(&self) -> &RingBuffer<Option<FrameDescriptor>> {
        &self.stream
    }
}

impl Deref for VideoRingBuffer {
    type Target = RingBuffer<Option<FrameDescriptor>>;

    fn deref(&self) -> &Self::Target {
        &self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(
        index: u64,
        frame_type: FrameType,
        frame_size: usize,
        timestamp: u64,
    ) -> FrameDescriptor {
        FrameDescriptor {
            index,
            frame_type,
            frame_size,
            timestamp,
            complete: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_eviction_forgets_descriptors() {
        let ring = VideoRingBuffer::new(100).unwrap();
        ring.append(vec![1u8; 60], Some(complete(0, FrameType::Data, 60, 0)))
            .unwrap();
        ring.append(vec![2u8; 60], Some(complete(1, FrameType::Data, 60, 0)))
            .unwrap();

        assert_eq!(ring.len(), 60);
        let indices: Vec<_> = ring.frames().unwrap().map(|f| f.index).collect();
        assert_eq!(indices, vec![1]);
        assert_eq!(ring.getvalue().unwrap(), vec![2u8; 60]);
    }

    #[test]
    fn test_copy_last_frame() {
        let ring = VideoRingBuffer::new(1000).unwrap();
        for (index, len) in [10usize, 20, 30].into_iter().enumerate() {
            ring.append(
                vec![index as u8; len],
                Some(complete(index as u64, FrameType::Data, len, 0)),
            )
            .unwrap();
        }
        let mut out = Vec::new();
        let copied = ring.copy_to(&mut out, CopyOptions::last_frames(1)).unwrap();
        assert_eq!(out, vec![2u8; 30]);
        assert_eq!(copied.written, 30);
        assert_eq!(copied.first.unwrap().index, 2);
    }

    #[test]
    fn test_copy_starts_on_header() {
        let ring = VideoRingBuffer::new(1000).unwrap();
        ring.append(vec![0u8; 4], Some(complete(0, FrameType::Data, 4, 0))).unwrap();
        ring.append(vec![9u8; 2], Some(complete(1, FrameType::Header, 2, 10))).unwrap();
        ring.append(vec![1u8; 8], Some(complete(2, FrameType::KeyFrame, 8, 10))).unwrap();
        ring.append(vec![2u8; 3], Some(complete(3, FrameType::Data, 3, 20))).unwrap();

        let mut out = Vec::new();
        let copied = ring.copy_to(&mut out, CopyOptions::all()).unwrap();
        assert_eq!(copied.first.unwrap().frame_type, FrameType::Header);
        assert_eq!(out.len(), 13);
        assert_eq!(&out[..2], &[9, 9]);
    }

    #[test]
    fn test_ambiguous_copy_is_rejected() {
        let ring = VideoRingBuffer::new(10).unwrap();
        let options = CopyOptions {
            size: Some(1),
            seconds: Some(1.0),
            ..CopyOptions::default()
        };
        let err = ring.copy_to(&mut Vec::new(), options).unwrap_err();
        assert_eq!(err.category(), "query");
    }

    #[test]
    fn test_copy_from_empty_buffer() {
        let ring = VideoRingBuffer::new(10).unwrap();
        let mut out = Vec::new();
        let copied = ring.copy_to(&mut out, CopyOptions::last_seconds(5.0)).unwrap();
        assert_eq!(copied, CopiedRange::default());
        assert!(out.is_empty());
    }

    #[test]
    fn test_clear() {
        let ring = VideoRingBuffer::new(100).unwrap();
        ring.append(vec![1u8; 10], Some(complete(0, FrameType::Data, 10, 0))).unwrap();
        ring.clear().unwrap();
        assert!(ring.is_empty());
        assert_eq!(ring.frames().unwrap().count(), 0);
        assert_eq!(ring.tell().unwrap(), 0);
    }

    #[test]
    fn test_from_config() {
        let ring = VideoRingBuffer::from_config(&RingConfig::from_size(4096)).unwrap();
        assert_eq!(ring.size(), 4096);
        assert!(VideoRingBuffer::from_config(&RingConfig::new(None, None, 1)).is_err());
    }
}
