//! # Fixed Buffer View
//!
//! A stream view over a single pre-allocated byte region. The region never grows
//! and nothing is ever evicted: writes that run past the end are cut short and
//! report how many bytes actually landed. This is the target for single-shot
//! captures whose size is known up front.
//!
//! The backing store is anything that derefs to a byte slice. A writable view
//! needs `AsMut<[u8]>` as well; [`FixedBufferView::mapped`] builds one over a
//! memory-mapped temporary file.
//!
//! ```rust
//! use frame_ring::core::buffer_view::FixedBufferView;
//! use std::io::SeekFrom;
//!
//! let mut view = FixedBufferView::new(vec![0u8; 4]);
//! assert_eq!(view.write(b"abcdef").unwrap(), 4);
//! view.seek(SeekFrom::Start(1)).unwrap();
//! assert_eq!(view.read(Some(2)).unwrap(), b"bc");
//! ```

use std::io::{self, SeekFrom};

use memmap2::{MmapMut, MmapOptions};

use crate::error::{BufferError, BufferResult};

/// Read/write view over one fixed-length byte region.
#[derive(Debug)]
pub struct FixedBufferView<B> {
    buf: B,
    pos: usize,
    read_only: bool,
    closed: bool,
}

impl FixedBufferView<MmapMut> {
    /// Creates a writable view of `len` zeroed bytes backed by a memory-mapped
    /// temporary file.
    pub fn mapped(len: usize) -> io::Result<Self> {
        let file = tempfile::tempfile()?;
        file.set_len(len as u64)?;

        let buffer = unsafe { MmapOptions::new().len(len).map_mut(&file)? };

        Ok(Self::new(buffer))
    }
}

impl<B: AsRef<[u8]>> FixedBufferView<B> {
    /// Wraps `buf`; the view is writable when `B` also implements `AsMut<[u8]>`.
    pub fn new(buf: B) -> Self {
        Self {
            buf,
            pos: 0,
            read_only: false,
            closed: false,
        }
    }

    /// Wraps `buf` and refuses every write.
    pub fn read_only(buf: B) -> Self {
        Self {
            read_only: true,
            ..Self::new(buf)
        }
    }

    fn check_open(&self, operation: &str) -> BufferResult<()> {
        if self.closed {
            return Err(BufferError::closed(operation));
        }
        Ok(())
    }

    /// Length of the underlying region in bytes.
    pub fn size(&self) -> usize {
        self.buf.as_ref().len()
    }

    pub fn writable(&self) -> BufferResult<bool> {
        self.check_open("writable")?;
        Ok(!self.read_only)
    }

    pub fn tell(&self) -> BufferResult<u64> {
        self.check_open("tell")?;
        Ok(self.pos as u64)
    }

    /// Moves the cursor. Seeking beyond the end is allowed; reads from there
    /// return nothing and writes store nothing.
    pub fn seek(&mut self, pos: SeekFrom) -> BufferResult<u64> {
        self.check_open("seek")?;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(delta) => self.pos as i128 + delta as i128,
            SeekFrom::End(delta) => self.size() as i128 + delta as i128,
        };
        if target < 0 {
            return Err(BufferError::invalid_seek(target));
        }
        self.pos = usize::try_from(target).unwrap_or(usize::MAX);
        Ok(self.pos as u64)
    }

    /// Reads up to `n` bytes (or everything remaining for `None`).
    pub fn read(&mut self, n: Option<usize>) -> BufferResult<Vec<u8>> {
        self.check_open("read")?;
        let data = self.buf.as_ref();
        let start = self.pos.min(data.len());
        let end = match n {
            Some(n) => start.saturating_add(n).min(data.len()),
            None => data.len(),
        };
        let result = data[start..end].to_vec();
        self.pos += result.len();
        Ok(result)
    }

    pub fn read_all(&mut self) -> BufferResult<Vec<u8>> {
        self.read(None)
    }

    /// Copies as many bytes as fit into `out`, returning the count.
    pub fn readinto(&mut self, out: &mut [u8]) -> BufferResult<usize> {
        self.check_open("readinto")?;
        let data = self.buf.as_ref();
        let available = data.len().saturating_sub(self.pos);
        let count = available.min(out.len());
        if count > 0 {
            out[..count].copy_from_slice(&data[self.pos..self.pos + count]);
            self.pos += count;
        }
        Ok(count)
    }

    /// Entire region as one contiguous vector.
    pub fn getvalue(&self) -> BufferResult<Vec<u8>> {
        self.check_open("getvalue")?;
        Ok(self.buf.as_ref().to_vec())
    }

    /// A fixed view can never change size.
    pub fn truncate(&mut self, _size: Option<usize>) -> BufferResult<u64> {
        self.check_open("truncate")?;
        Err(BufferError::unsupported(
            "truncate",
            "a fixed buffer view cannot be resized",
        ))
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Releases the view and hands back the backing store.
    pub fn into_inner(self) -> B {
        self.buf
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> FixedBufferView<B> {
    /// Writes as much of `data` as fits before the end of the region.
    pub fn write(&mut self, data: &[u8]) -> BufferResult<usize> {
        self.check_open("write")?;
        if self.read_only {
            return Err(BufferError::unsupported(
                "write",
                "buffer object is not writeable",
            ));
        }
        let size = self.size();
        let room = size.saturating_sub(self.pos);
        let count = room.min(data.len());
        if count > 0 {
            self.buf.as_mut()[self.pos..self.pos + count].copy_from_slice(&data[..count]);
        }
        self.pos += count;
        Ok(count)
    }
}

impl<B: AsRef<[u8]>> io::Read for FixedBufferView<B> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        Ok(self.readinto(out)?)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> io::Write for FixedBufferView<B> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        Ok(FixedBufferView::write(self, data)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<B: AsRef<[u8]>> io::Seek for FixedBufferView<B> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(FixedBufferView::seek(self, pos)?)
    }
}
