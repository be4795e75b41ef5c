//! Switching the live stream to a new output while recording.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use frame_ring::producer::{BufferFlags, EncodedBuffer, Recorder, SplitTarget, WriterSink};
use frame_ring::{CopyOptions, FrameType, SplitConfig, VideoRingBuffer};

const HEADER: u8 = 0xff;

fn encode(recorder: &mut Recorder, frames: u64, gop: u64) {
    for n in 0..frames {
        let pts = Some((n + 1) * 10_000);
        if n % gop == 0 || recorder.take_key_frame_request() {
            let header = BufferFlags {
                config: true,
                frame_end: true,
                ..Default::default()
            };
            recorder
                .on_buffer(EncodedBuffer::new(vec![HEADER; 4], header, pts))
                .unwrap();
        }
        let flags = BufferFlags {
            frame_end: true,
            ..Default::default()
        };
        recorder
            .on_buffer(EncodedBuffer::new(vec![(n % 200) as u8; 32], flags, pts))
            .unwrap();
        thread::sleep(Duration::from_millis(1));
    }
    recorder.finish().unwrap();
}

#[test]
fn test_split_moves_stream_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("segment.bin");

    let ring = Arc::new(VideoRingBuffer::new(1 << 20).unwrap());
    let mut recorder = Recorder::new(Arc::clone(&ring), SplitConfig::new(25, 1000.0));
    let splits = recorder.splits();

    let producer = thread::spawn(move || encode(&mut recorder, 300, 25));

    thread::sleep(Duration::from_millis(30));
    let file = std::fs::File::create(&path).unwrap();
    let split = splits
        .request(SplitTarget::video(WriterSink::new(file)))
        .wait(Duration::from_secs(10))
        .unwrap();
    producer.join().unwrap();

    assert_eq!(split.frame_type, FrameType::Header);
    assert_eq!(split.position(), 0);

    let segment = std::fs::read(&path).unwrap();
    assert_eq!(&segment[..4], &[HEADER; 4]);

    // everything before the split stayed in the ring
    let newest = ring.frames().unwrap().next_back().unwrap();
    assert_eq!(newest.index + 1, split.index);
    assert_eq!(ring.len(), split.stream_size - split.frame_size);

    let mut clip = Vec::new();
    let copied = ring.copy_to(&mut clip, CopyOptions::all()).unwrap();
    assert_eq!(copied.first.unwrap().frame_type, FrameType::Header);
    assert_eq!(clip.len(), ring.len());
}

#[test]
fn test_split_times_out_without_split_point() {
    let ring = Arc::new(VideoRingBuffer::new(1024).unwrap());
    let mut recorder = Recorder::new(ring, SplitConfig::new(30, 30.0));
    let err = recorder
        .splits()
        .request(SplitTarget::default())
        .wait(Duration::from_millis(20))
        .unwrap_err();
    assert_eq!(err.category(), "timeout");
    assert_eq!(recorder.splits().pending(), 0);

    let ticket = recorder.splits().request(SplitTarget::default());
    assert_eq!(recorder.splits().pending(), 1);
    let header = BufferFlags {
        config: true,
        frame_end: true,
        ..Default::default()
    };
    recorder
        .on_buffer(EncodedBuffer::new(vec![HEADER; 4], header, Some(1)))
        .unwrap();
    assert_eq!(ticket.try_get().unwrap().frame_type, FrameType::Header);
    assert_eq!(recorder.splits().pending(), 0);
}

#[test]
fn test_queued_splits_are_served_in_order() {
    let ring = Arc::new(VideoRingBuffer::new(1 << 16).unwrap());
    let mut recorder = Recorder::new(Arc::clone(&ring), SplitConfig::new(1, 30.0));
    let splits = recorder.splits();

    let first = splits.request(SplitTarget::video(WriterSink::new(Vec::new())));
    let second = splits.request(SplitTarget::video(WriterSink::new(Vec::new())));

    let flags = BufferFlags {
        frame_end: true,
        ..Default::default()
    };
    recorder
        .on_buffer(EncodedBuffer::new(vec![1u8; 8], flags, Some(1)))
        .unwrap();
    recorder
        .on_buffer(EncodedBuffer::new(vec![2u8; 8], flags, Some(2)))
        .unwrap();

    assert_eq!(first.wait(Duration::from_secs(1)).unwrap().index, 0);
    assert_eq!(second.wait(Duration::from_secs(1)).unwrap().index, 1);
    assert!(ring.is_empty());
}
