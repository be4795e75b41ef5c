//! Common test utilities shared by the frame-ring integration tests.

#![allow(dead_code)]

use frame_ring::{FrameDescriptor, FrameType, VideoRingBuffer};

/// Builds a complete descriptor for a frame written in one chunk.
pub fn frame(
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

/// Appends one single-chunk frame filled with its index (mod 256).
pub fn push(ring: &VideoRingBuffer, index: u64, frame_type: FrameType, len: usize, timestamp: u64) {
    ring.append(vec![index as u8; len], Some(frame(index, frame_type, len, timestamp)))
        .expect("append");
}

/// Records a group of pictures: one header, one key frame, then `inter`
/// data frames, all `frame_us` apart starting at `start_us`.
pub fn push_gop(
    ring: &VideoRingBuffer,
    first_index: u64,
    start_us: u64,
    frame_us: u64,
    inter: u64,
) -> u64 {
    let mut index = first_index;
    push(ring, index, FrameType::Header, 8, start_us);
    index += 1;
    push(ring, index, FrameType::KeyFrame, 64, start_us);
    index += 1;
    for n in 0..inter {
        push(ring, index, FrameType::Data, 16, start_us + (n + 1) * frame_us);
        index += 1;
    }
    index
}
