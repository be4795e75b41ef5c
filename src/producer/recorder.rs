//! # Recorder
//!
//! The producer side of a recording: takes encoder buffers, derives their
//! descriptors, honours split requests at split-eligible boundaries and writes
//! each buffer to the right output.
//!
//! Side information goes to its own output (if any) and is dropped otherwise;
//! everything else goes to the video output.

use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::split::SplitController;
use super::tracker::{EncodedBuffer, FrameTracker};
use crate::config::SplitConfig;
use crate::core::frame_index::FrameDescriptor;
use crate::error::{BufferError, BufferResult};
use crate::video_ring::VideoRingBuffer;

/// Destination for encoded output.
pub trait FrameSink {
    /// Writes one buffer of output described by `frame`.
    fn write_frame(&mut self, data: Bytes, frame: &FrameDescriptor) -> BufferResult<()>;

    /// Called when the sink is switched away from.
    fn finish(&mut self) -> BufferResult<()> {
        Ok(())
    }
}

impl FrameSink for Arc<VideoRingBuffer> {
    fn write_frame(&mut self, data: Bytes, frame: &FrameDescriptor) -> BufferResult<()> {
        self.append(data, Some(*frame))?;
        Ok(())
    }
}

/// Adapts any [`Write`] into a [`FrameSink`] that stores raw bytes only.
#[derive(Debug)]
pub struct WriterSink<W> {
    inner: W,
    written: usize,
}

impl<W: Write> WriterSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> FrameSink for WriterSink<W> {
    fn write_frame(&mut self, data: Bytes, _frame: &FrameDescriptor) -> BufferResult<()> {
        self.inner
            .write_all(&data)
            .map_err(|e| BufferError::sink_rejected(self.written, e))?;
        self.written += data.len();
        Ok(())
    }

    fn finish(&mut self) -> BufferResult<()> {
        self.inner
            .flush()
            .map_err(|e| BufferError::sink_rejected(self.written, e))
    }
}

pub type BoxedSink = Box<dyn FrameSink + Send>;

/// Outputs to switch to at a split. A `None` output is left unchanged.
#[derive(Default)]
pub struct SplitTarget {
    pub video: Option<BoxedSink>,
    pub side_info: Option<BoxedSink>,
}

impl SplitTarget {
    pub fn video(sink: impl FrameSink + Send + 'static) -> Self {
        Self {
            video: Some(Box::new(sink)),
            side_info: None,
        }
    }

    pub fn with_side_info(mut self, sink: impl FrameSink + Send + 'static) -> Self {
        self.side_info = Some(Box::new(sink));
        self
    }
}

/// Routes encoder output to its sinks.
pub struct Recorder {
    tracker: FrameTracker,
    video: BoxedSink,
    side_info: Option<BoxedSink>,
    splits: Arc<SplitController<SplitTarget>>,
}

impl Recorder {
    pub fn new(video: impl FrameSink + Send + 'static, config: SplitConfig) -> Self {
        Self {
            tracker: FrameTracker::new(),
            video: Box::new(video),
            side_info: None,
            splits: Arc::new(SplitController::new(config)),
        }
    }

    pub fn with_side_info(mut self, sink: impl FrameSink + Send + 'static) -> Self {
        self.side_info = Some(Box::new(sink));
        self
    }

    /// Handle for consumers to request splits.
    pub fn splits(&self) -> Arc<SplitController<SplitTarget>> {
        Arc::clone(&self.splits)
    }

    /// Descriptor of the last buffer handled.
    pub fn last_frame(&self) -> FrameDescriptor {
        self.tracker.last()
    }

    /// Whether the encoder should emit a key frame (and header) next. Clears
    /// the request, so only the first caller after a split request sees true.
    pub fn take_key_frame_request(&self) -> bool {
        self.splits.take_key_frame_request()
    }

    /// Handles one encoder buffer. Returns true at end of stream.
    pub fn on_buffer(&mut self, buffer: EncodedBuffer) -> BufferResult<bool> {
        let mut frame = self.tracker.observe(&buffer);

        if self.splits.config().intra_period == 1 || buffer.flags.config {
            if let Some((target, resolver)) = self.splits.take_next() {
                // a failed finish leaves both outputs live and drops the resolver
                if target.video.is_some() {
                    self.video.finish()?;
                }
                if target.side_info.is_some() {
                    if let Some(previous) = self.side_info.as_mut() {
                        previous.finish()?;
                    }
                }
                if let Some(video) = target.video {
                    self.video = video;
                    frame = self.tracker.rebase_split();
                }
                if let Some(side_info) = target.side_info {
                    self.side_info = Some(side_info);
                }
                debug!(
                    index = frame.index,
                    stream_size = frame.stream_size,
                    "split output"
                );
                resolver.resolve(frame);
            }
        }

        if !buffer.data.is_empty() {
            if buffer.flags.side_info {
                if let Some(side_info) = self.side_info.as_mut() {
                    side_info.write_frame(buffer.data, &frame)?;
                }
            } else {
                self.video.write_frame(buffer.data, &frame)?;
            }
        }
        Ok(buffer.flags.end_of_stream)
    }

    /// Flushes the current outputs.
    pub fn finish(&mut self) -> BufferResult<()> {
        self.video.finish()?;
        if let Some(side_info) = self.side_info.as_mut() {
            side_info.finish()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame_index::FrameType;
    use crate::producer::tracker::BufferFlags;
    use parking_lot::Mutex;

    #[derive(Clone, Default)]
    struct Collect(Arc<Mutex<Vec<(usize, FrameDescriptor)>>>);

    impl FrameSink for Collect {
        fn write_frame(&mut self, data: Bytes, frame: &FrameDescriptor) -> BufferResult<()> {
            self.0.lock().push((data.len(), *frame));
            Ok(())
        }
    }

    /// Records like [`Collect`] but cannot be flushed.
    #[derive(Clone, Default)]
    struct Unflushable(Collect);

    impl FrameSink for Unflushable {
        fn write_frame(&mut self, data: Bytes, frame: &FrameDescriptor) -> BufferResult<()> {
            self.0.write_frame(data, frame)
        }

        fn finish(&mut self) -> BufferResult<()> {
            Err(BufferError::sink_rejected(
                0,
                std::io::Error::other("flush failed"),
            ))
        }
    }

    fn flags(config: bool, side_info: bool) -> BufferFlags {
        BufferFlags {
            config,
            side_info,
            frame_end: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_routes_side_info() {
        let video = Collect::default();
        let side = Collect::default();
        let mut recorder =
            Recorder::new(video.clone(), SplitConfig::default()).with_side_info(side.clone());

        recorder
            .on_buffer(EncodedBuffer::new(vec![0u8; 10], flags(false, false), Some(1)))
            .unwrap();
        recorder
            .on_buffer(EncodedBuffer::new(vec![0u8; 3], flags(false, true), Some(1)))
            .unwrap();

        assert_eq!(video.0.lock().len(), 1);
        let side = side.0.lock();
        assert_eq!(side.len(), 1);
        assert_eq!(side[0].1.frame_type, FrameType::SideInfo);
    }

    #[test]
    fn test_split_on_header() {
        let first = Collect::default();
        let second = Collect::default();
        let mut recorder = Recorder::new(first.clone(), SplitConfig::new(30, 30.0));
        recorder
            .on_buffer(EncodedBuffer::new(vec![0u8; 10], flags(false, false), Some(1)))
            .unwrap();

        let ticket = recorder.splits().request(SplitTarget::video(second.clone()));
        assert!(recorder.take_key_frame_request());

        // not a split point
        recorder
            .on_buffer(EncodedBuffer::new(vec![0u8; 10], flags(false, false), Some(2)))
            .unwrap();
        assert!(ticket.try_get().is_none());

        recorder
            .on_buffer(EncodedBuffer::new(vec![0u8; 4], flags(true, false), Some(3)))
            .unwrap();
        let split = ticket.wait(std::time::Duration::from_secs(1)).unwrap();
        assert_eq!(split.frame_type, FrameType::Header);
        assert_eq!(split.position(), 0);

        assert_eq!(first.0.lock().len(), 2);
        let second = second.0.lock();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].1.split_size, 4);
    }

    #[test]
    fn test_every_frame_splits_with_unit_intra_period() {
        let first = Collect::default();
        let second = Collect::default();
        let mut recorder = Recorder::new(first.clone(), SplitConfig::new(1, 30.0));
        let ticket = recorder.splits().request(SplitTarget::video(second.clone()));
        recorder
            .on_buffer(EncodedBuffer::new(vec![0u8; 5], flags(false, false), Some(1)))
            .unwrap();
        assert!(ticket.try_get().is_some());
        assert!(first.0.lock().is_empty());
        assert_eq!(second.0.lock().len(), 1);
    }

    #[test]
    fn test_records_into_ring() {
        let ring = Arc::new(VideoRingBuffer::new(1024).unwrap());
        let mut recorder = Recorder::new(Arc::clone(&ring), SplitConfig::default());
        for pts in 1..=3u64 {
            let buffer = EncodedBuffer::new(vec![pts as u8; 8], flags(pts == 1, false), Some(pts));
            let done = recorder.on_buffer(buffer).unwrap();
            assert!(!done);
        }
        let frames: Vec<_> = ring.frames().unwrap().collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].frame_type, FrameType::Header);
        assert_eq!(frames[2].position(), 16);
    }

    #[test]
    fn test_failed_finish_keeps_previous_output() {
        let old = Unflushable::default();
        let ring = Arc::new(VideoRingBuffer::new(1024).unwrap());
        let mut recorder = Recorder::new(old.clone(), SplitConfig::new(30, 30.0));
        recorder
            .on_buffer(EncodedBuffer::new(vec![0u8; 10], flags(false, false), Some(1)))
            .unwrap();

        let ticket = recorder.splits().request(SplitTarget::video(Arc::clone(&ring)));
        let err = recorder
            .on_buffer(EncodedBuffer::new(vec![0u8; 4], flags(true, false), Some(2)))
            .unwrap_err();
        assert_eq!(err.category(), "sink");
        assert_eq!(
            ticket.wait(std::time::Duration::from_secs(1)).unwrap_err().category(),
            "closed"
        );
        assert_eq!(recorder.last_frame().split_size, 14);

        recorder
            .on_buffer(EncodedBuffer::new(vec![0u8; 6], flags(false, false), Some(3)))
            .unwrap();
        assert!(ring.is_empty());
        let written: Vec<_> = old.0.0.lock().iter().map(|(len, _)| *len).collect();
        assert_eq!(written, vec![10, 6]);
        assert_eq!(recorder.last_frame().position(), 14);
    }

    #[test]
    fn test_writer_sink_counts_bytes() {
        let mut sink = WriterSink::new(Vec::new());
        sink.write_frame(Bytes::from_static(b"abc"), &FrameDescriptor::default())
            .unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.written(), 3);
        assert_eq!(sink.into_inner(), b"abc");
    }
}
