//! # Ring Buffer Module
//!
//! A chunked, size-bounded circular byte stream for holding the most recent
//! encoder output in fixed memory.
//!
//! ## Overview
//!
//! The buffer keeps an ordered queue of immutable chunks (oldest first). Each
//! write appends one chunk; once the total length exceeds the configured
//! capacity, whole chunks are dropped from the front until it fits again. A
//! single shared cursor supports `read`/`seek`/`truncate` over the retained
//! bytes, with file-like semantics:
//!
//! - seeking past the end is legal, and a later write zero-fills the gap;
//! - writing before the end overwrites bytes in place without changing length;
//! - truncation may slice the chunk that straddles the cut.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐ write ┌──────────────────────────────────────┐
//! │ Producer │──────▶│ [c0][c1][c2] ... [cN]                │─▶ evict c0 when len > capacity
//! └──────────┘       │   ▲ cursor = (chunk index, offset)   │
//!                    └──────────────────────────────────────┘
//! ```
//!
//! Every chunk carries a metadata value `M` alongside its bytes. The plain
//! byte stream uses `M = ()`; the video buffer attaches a frame descriptor, so
//! the descriptor is evicted in the same step as its bytes.
//!
//! ## Thread Safety
//!
//! All state sits behind one re-entrant lock. [`RingBuffer::lock`] hands that
//! lock to callers who need to run several operations as one atomic group.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, SeekFrom};

use bytes::Bytes;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use tracing::trace;

use crate::error::{BufferError, BufferResult};

/// One immutable block of stream data and the metadata attached at append time.
#[derive(Debug, Clone)]
pub struct Chunk<M> {
    pub data: Bytes,
    pub meta: M,
}

impl<M> Chunk<M> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug)]
struct RingState<M> {
    capacity: usize,
    chunks: VecDeque<Chunk<M>>,
    length: usize,
    pos: usize,
    pos_index: usize,
    pos_offset: usize,
    closed: bool,
}

impl<M: Clone + Default> RingState<M> {
    fn check_open(&self, operation: &str) -> BufferResult<()> {
        if self.closed {
            return Err(BufferError::closed(operation));
        }
        Ok(())
    }

    /// Moves the cursor and recomputes its chunk coordinates by scanning chunk
    /// boundaries. A cursor at or past the end points one past the last chunk.
    fn set_pos(&mut self, value: usize) {
        self.pos = value;
        let mut chunk_pos = 0;
        for (index, chunk) in self.chunks.iter().enumerate() {
            if chunk_pos + chunk.len() > value {
                self.pos_index = index;
                self.pos_offset = value - chunk_pos;
                return;
            }
            chunk_pos += chunk.len();
        }
        self.pos_index = self.chunks.len();
        self.pos_offset = value - chunk_pos;
    }

    fn read(&mut self, n: Option<usize>) -> Vec<u8> {
        if self.pos >= self.length {
            return Vec::new();
        }
        let want = n.unwrap_or(usize::MAX).min(self.length - self.pos);
        let mut out = Vec::with_capacity(want);
        let mut index = self.pos_index;
        let mut offset = self.pos_offset;
        while out.len() < want {
            let chunk = &self.chunks[index].data;
            let take = (chunk.len() - offset).min(want - out.len());
            out.extend_from_slice(&chunk[offset..offset + take]);
            index += 1;
            offset = 0;
        }
        self.set_pos(self.pos + want);
        out
    }

    fn read1(&mut self, n: Option<usize>) -> Bytes {
        if self.pos >= self.length {
            return Bytes::new();
        }
        let chunk = &self.chunks[self.pos_index].data;
        let available = chunk.len() - self.pos_offset;
        let take = n.map_or(available, |n| n.min(available));
        let result = chunk.slice(self.pos_offset..self.pos_offset + take);
        let chunk_len = chunk.len();
        self.pos += take;
        self.pos_offset += take;
        if self.pos_offset >= chunk_len {
            self.pos_index += 1;
            self.pos_offset = 0;
        }
        result
    }

    /// Core write path. Returns the number of bytes evicted from the front.
    fn append(&mut self, data: Bytes, meta: M) -> usize {
        let mut evicted = 0;
        if self.pos > self.length {
            let target = self.pos;
            evicted += self.grow_to(target);
        }

        let mut consumed = 0;
        while consumed < data.len() && self.pos < self.length {
            let chunk = &mut self.chunks[self.pos_index];
            let chunk_len = chunk.len();
            let head = (chunk_len - self.pos_offset).min(data.len() - consumed);
            let mut rewritten = Vec::with_capacity(chunk_len);
            rewritten.extend_from_slice(&chunk.data[..self.pos_offset]);
            rewritten.extend_from_slice(&data[consumed..consumed + head]);
            rewritten.extend_from_slice(&chunk.data[self.pos_offset + head..]);
            chunk.data = Bytes::from(rewritten);

            consumed += head;
            self.pos += head;
            if self.pos_offset + head >= chunk_len {
                self.pos_index += 1;
                self.pos_offset = 0;
            } else {
                self.pos_offset += head;
            }
        }

        if consumed < data.len() {
            let rest = data.slice(consumed..);
            self.length += rest.len();
            self.chunks.push_back(Chunk { data: rest, meta });
            self.pos = self.length;
            self.pos_index = self.chunks.len();
            self.pos_offset = 0;
        }

        evicted + self.evict()
    }

    /// Zero-fills from the current end up to `size` through the write path.
    ///
    /// A gap wider than the capacity would evict the fill and every chunk
    /// before it, so the buffer is emptied without materialising the zeros.
    fn grow_to(&mut self, size: usize) -> usize {
        let gap = size - self.length;
        if gap > self.capacity {
            let evicted_chunks = self.chunks.len();
            self.chunks.clear();
            self.length = 0;
            self.set_pos(0);
            trace!(
                evicted_chunks,
                skipped_fill = gap,
                "sparse write past capacity emptied the buffer"
            );
            return size;
        }
        let fill = Bytes::from(vec![0u8; gap]);
        self.set_pos(self.length);
        self.append(fill, M::default())
    }

    /// Drops whole chunks from the front until the length fits the capacity.
    fn evict(&mut self) -> usize {
        let mut evicted_bytes = 0;
        let mut evicted_chunks = 0;
        while self.length > self.capacity {
            let Some(chunk) = self.chunks.pop_front() else {
                break;
            };
            self.length -= chunk.len();
            evicted_bytes += chunk.len();
            evicted_chunks += 1;
        }
        if evicted_chunks > 0 {
            self.set_pos(self.pos.saturating_sub(evicted_bytes));
            trace!(
                evicted_chunks,
                evicted_bytes,
                length = self.length,
                "evicted oldest chunks"
            );
        }
        evicted_bytes
    }

    fn truncate(&mut self, size: Option<usize>) -> usize {
        let size = size.unwrap_or(self.pos);
        let save_pos = self.pos;
        if size > self.length {
            let evicted = self.grow_to(size);
            self.set_pos(save_pos.saturating_sub(evicted).min(self.length));
        } else if size < self.length {
            self.set_pos(size);
            self.chunks.truncate(self.pos_index + 1);
            if self.pos_offset > 0 {
                let last = &mut self.chunks[self.pos_index];
                last.data = last.data.slice(..self.pos_offset);
            } else {
                self.chunks.pop_back();
            }
            self.length = size;
            self.set_pos(save_pos.min(self.length));
        }
        self.length
    }

    fn getvalue(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.length);
        for chunk in &self.chunks {
            out.extend_from_slice(&chunk.data);
        }
        out
    }
}

/// Guard over a buffer's re-entrant lock.
///
/// While held, no other thread can touch the buffer, and the holder may keep
/// calling buffer methods on the same thread.
pub struct StreamLock<'a, M> {
    _guard: ReentrantMutexGuard<'a, RefCell<RingState<M>>>,
}

/// A chunked, bounded circular byte stream.
///
/// `M` is the per-chunk metadata type; plain byte streams use the default `()`.
#[derive(Debug)]
pub struct RingBuffer<M = ()> {
    inner: ReentrantMutex<RefCell<RingState<M>>>,
    capacity: usize,
}

impl<M: Clone + Default> RingBuffer<M> {
    /// Creates an empty buffer holding at most `capacity` bytes.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` if `capacity` is zero.
    pub fn new(capacity: usize) -> BufferResult<Self> {
        if capacity == 0 {
            return Err(BufferError::invalid_configuration(
                "capacity",
                capacity.to_string(),
                "size must be a positive integer",
            ));
        }
        Ok(Self {
            inner: ReentrantMutex::new(RefCell::new(RingState {
                capacity,
                chunks: VecDeque::new(),
                length: 0,
                pos: 0,
                pos_index: 0,
                pos_offset: 0,
                closed: false,
            })),
            capacity,
        })
    }

    fn with_state<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut RingState<M>) -> T,
    ) -> BufferResult<T> {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();
        state.check_open(operation)?;
        Ok(f(&mut state))
    }

    /// Acquires the buffer's re-entrant lock for a group of operations.
    pub fn lock(&self) -> StreamLock<'_, M> {
        StreamLock {
            _guard: self.inner.lock(),
        }
    }

    /// Maximum number of bytes retained.
    pub fn size(&self) -> usize {
        self.capacity
    }

    /// Current number of bytes retained.
    pub fn len(&self) -> usize {
        self.inner.lock().borrow().length
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn chunk_count(&self) -> usize {
        self.inner.lock().borrow().chunks.len()
    }

    pub fn close(&self) {
        self.inner.lock().borrow_mut().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().borrow().closed
    }

    pub fn tell(&self) -> BufferResult<u64> {
        self.with_state("tell", |state| state.pos as u64)
    }

    /// Moves the cursor; there is no upper bound.
    ///
    /// # Errors
    ///
    /// `InvalidSeek` if the resulting offset would be negative.
    pub fn seek(&self, pos: SeekFrom) -> BufferResult<u64> {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();
        state.check_open("seek")?;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(delta) => state.pos as i128 + delta as i128,
            SeekFrom::End(delta) => state.length as i128 + delta as i128,
        };
        if target < 0 {
            return Err(BufferError::invalid_seek(target));
        }
        state.set_pos(usize::try_from(target).unwrap_or(usize::MAX));
        Ok(state.pos as u64)
    }

    /// Reads up to `n` bytes from the cursor (`None` reads to the end).
    pub fn read(&self, n: Option<usize>) -> BufferResult<Vec<u8>> {
        self.with_state("read", |state| state.read(n))
    }

    pub fn read_all(&self) -> BufferResult<Vec<u8>> {
        self.read(None)
    }

    /// Reads from the chunk under the cursor only, without concatenating
    /// across chunk boundaries. The result shares the chunk's memory.
    pub fn read1(&self, n: Option<usize>) -> BufferResult<Bytes> {
        self.with_state("read1", |state| state.read1(n))
    }

    /// Copies as many bytes as fit into `out`, advancing the cursor.
    pub fn readinto(&self, out: &mut [u8]) -> BufferResult<usize> {
        self.with_state("readinto", |state| {
            let data = state.read(Some(out.len()));
            out[..data.len()].copy_from_slice(&data);
            data.len()
        })
    }

    /// Writes `data` at the cursor and returns its full length.
    pub fn write(&self, data: &[u8]) -> BufferResult<usize> {
        self.append_with(Bytes::copy_from_slice(data), M::default())
    }

    /// Writes `data` at the cursor, attaching `meta` to the chunk appended at
    /// the end. Bytes that overwrite existing data keep the metadata of the
    /// chunk they land in.
    pub fn append_with(&self, data: Bytes, meta: M) -> BufferResult<usize> {
        self.with_state("write", |state| {
            let written = data.len();
            if written > 0 {
                state.append(data, meta);
            }
            written
        })
    }

    /// Resizes the stream to `size` (default: the cursor position).
    ///
    /// Growing zero-fills through the write path; shrinking cuts the straddling
    /// chunk exactly. The cursor is kept where it was, clamped to the new end.
    pub fn truncate(&self, size: Option<usize>) -> BufferResult<usize> {
        self.with_state("truncate", |state| state.truncate(size))
    }

    /// Entire retained contents as one contiguous vector.
    pub fn getvalue(&self) -> BufferResult<Vec<u8>> {
        self.with_state("getvalue", |state| state.getvalue())
    }

    /// Cheap copy of the chunk queue, oldest first.
    pub fn chunks(&self) -> BufferResult<Vec<Chunk<M>>> {
        self.with_state("chunks", |state| state.chunks.iter().cloned().collect())
    }
}

impl<M: Clone + Default> io::Read for &RingBuffer<M> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        Ok(RingBuffer::<M>::readinto(*self, out)?)
    }
}

impl<M: Clone + Default> io::Write for &RingBuffer<M> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        Ok(RingBuffer::<M>::write(*self, data)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<M: Clone + Default> io::Seek for &RingBuffer<M> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(RingBuffer::<M>::seek(*self, pos)?)
    }
}
