//! Chunked binary buffer reader for data fed in arbitrary pieces.

use std::collections::VecDeque;

use crate::BufferError;

/// A saved cursor position. See [`ReadBuffer::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    chunk: usize,
    offset: usize,
}

/// A streaming reader over chunks of bytes fed in arbitrary sizes.
///
/// Chunks are never merged; reads cross chunk boundaries as needed. All
/// `try_*` reads are bounds-checked and leave the cursor untouched on
/// failure, so a failed read can simply be retried after more data is fed.
///
/// Tentative multi-byte reads can be rolled back via [`save`](ReadBuffer::save)
/// and [`restore`](ReadBuffer::restore). Consumed chunks are reclaimed only by
/// [`compact`](ReadBuffer::compact), which invalidates saved positions; callers
/// compact at points where no position is held.
pub struct ReadBuffer {
    chunks: VecDeque<Vec<u8>>,
    /// Cursor: index into `chunks` and byte offset within that chunk.
    chunk: usize,
    offset: usize,
    /// Bytes between the cursor and the end of the last chunk.
    available: usize,
}

impl Default for ReadBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadBuffer {
    /// Creates an empty reader.
    pub fn new() -> Self {
        Self {
            chunks: VecDeque::new(),
            chunk: 0,
            offset: 0,
            available: 0,
        }
    }

    /// Appends a chunk of data to be read. Empty chunks are ignored.
    pub fn feed(&mut self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        self.available += chunk.len();
        self.chunks.push_back(chunk);
    }

    /// Number of unread bytes.
    pub fn size(&self) -> usize {
        self.available
    }

    /// Discards all chunks and resets the cursor.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.chunk = 0;
        self.offset = 0;
        self.available = 0;
    }

    /// Snapshots the cursor so a tentative read can be rolled back.
    pub fn save(&self) -> Pos {
        Pos {
            chunk: self.chunk,
            offset: self.offset,
        }
    }

    /// Rewinds the cursor to a previously saved position. Chunks fed since
    /// the snapshot stay readable.
    ///
    /// The position must have been taken since the last [`compact`] call.
    ///
    /// [`compact`]: ReadBuffer::compact
    pub fn restore(&mut self, pos: Pos) {
        self.chunk = pos.chunk;
        self.offset = pos.offset;
        self.available = self
            .chunks
            .iter()
            .skip(pos.chunk)
            .map(Vec::len)
            .sum::<usize>()
            - pos.offset;
    }

    /// Releases chunks that lie entirely behind the cursor.
    ///
    /// Invalidates any [`Pos`] taken earlier.
    pub fn compact(&mut self) {
        while self.chunk > 0 {
            self.chunks.pop_front();
            self.chunk -= 1;
        }
        if self.offset > 0 && self.chunks.front().is_some_and(|c| c.len() == self.offset) {
            self.chunks.pop_front();
            self.offset = 0;
        }
    }

    #[inline]
    fn check(&self, n: usize) -> Result<(), BufferError> {
        if n > self.available {
            Err(BufferError::EndOfBuffer)
        } else {
            Ok(())
        }
    }

    /// Moves the cursor forward by `n` bytes that are known to be available.
    fn advance_unchecked(&mut self, mut n: usize) {
        self.available -= n;
        while n > 0 {
            let len = self.chunks[self.chunk].len();
            let remaining = len - self.offset;
            if remaining > n {
                self.offset += n;
                return;
            }
            n -= remaining;
            self.chunk += 1;
            self.offset = 0;
        }
    }

    /// Copies `dst.len()` available bytes at the cursor into `dst` and
    /// advances.
    fn fill_unchecked(&mut self, dst: &mut [u8]) {
        let mut copied = 0;
        let mut chunk = self.chunk;
        let mut offset = self.offset;
        while copied < dst.len() {
            let src = &self.chunks[chunk];
            let take = (src.len() - offset).min(dst.len() - copied);
            dst[copied..copied + take].copy_from_slice(&src[offset..offset + take]);
            copied += take;
            offset += take;
            if offset == src.len() {
                chunk += 1;
                offset = 0;
            }
        }
        self.available -= dst.len();
        self.chunk = chunk;
        self.offset = offset;
    }

    /// Peeks at the byte under the cursor without advancing.
    pub fn peek(&self) -> Result<u8, BufferError> {
        self.check(1)?;
        Ok(self.chunks[self.chunk][self.offset])
    }

    /// Advances the cursor by `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<(), BufferError> {
        self.check(n)?;
        self.advance_unchecked(n);
        Ok(())
    }

    /// Reads an unsigned 8-bit integer.
    #[inline]
    pub fn try_u8(&mut self) -> Result<u8, BufferError> {
        let val = self.peek()?;
        self.advance_unchecked(1);
        Ok(val)
    }

    /// Reads a signed 8-bit integer.
    #[inline]
    pub fn try_i8(&mut self) -> Result<i8, BufferError> {
        Ok(self.try_u8()? as i8)
    }

    /// Reads an unsigned 16-bit integer (big-endian).
    #[inline]
    pub fn try_u16(&mut self) -> Result<u16, BufferError> {
        self.check(2)?;
        let mut b = [0u8; 2];
        self.fill_unchecked(&mut b);
        Ok(u16::from_be_bytes(b))
    }

    /// Reads a signed 16-bit integer (big-endian).
    #[inline]
    pub fn try_i16(&mut self) -> Result<i16, BufferError> {
        Ok(self.try_u16()? as i16)
    }

    /// Reads an unsigned 32-bit integer (big-endian).
    #[inline]
    pub fn try_u32(&mut self) -> Result<u32, BufferError> {
        self.check(4)?;
        let mut b = [0u8; 4];
        self.fill_unchecked(&mut b);
        Ok(u32::from_be_bytes(b))
    }

    /// Reads a signed 32-bit integer (big-endian).
    #[inline]
    pub fn try_i32(&mut self) -> Result<i32, BufferError> {
        Ok(self.try_u32()? as i32)
    }

    /// Reads an unsigned 64-bit integer (big-endian).
    #[inline]
    pub fn try_u64(&mut self) -> Result<u64, BufferError> {
        self.check(8)?;
        let mut b = [0u8; 8];
        self.fill_unchecked(&mut b);
        Ok(u64::from_be_bytes(b))
    }

    /// Reads a signed 64-bit integer (big-endian).
    #[inline]
    pub fn try_i64(&mut self) -> Result<i64, BufferError> {
        Ok(self.try_u64()? as i64)
    }

    /// Reads a 32-bit floating point number (big-endian).
    #[inline]
    pub fn try_f32(&mut self) -> Result<f32, BufferError> {
        Ok(f32::from_bits(self.try_u32()?))
    }

    /// Reads a 64-bit floating point number (big-endian).
    #[inline]
    pub fn try_f64(&mut self) -> Result<f64, BufferError> {
        Ok(f64::from_bits(self.try_u64()?))
    }

    /// Reads `size` raw bytes into a new vector.
    pub fn try_buf(&mut self, size: usize) -> Result<Vec<u8>, BufferError> {
        self.check(size)?;
        let mut out = vec![0u8; size];
        self.fill_unchecked(&mut out);
        Ok(out)
    }

    /// Reads a UTF-8 string of `size` bytes.
    pub fn try_utf8(&mut self, size: usize) -> Result<String, BufferError> {
        let bytes = self.try_buf(size)?;
        String::from_utf8(bytes).map_err(|_| BufferError::InvalidUtf8)
    }

    /// Drains up to `size` bytes, returning however many are available.
    pub fn take_up_to(&mut self, size: usize) -> Vec<u8> {
        let take = size.min(self.available);
        let mut out = vec![0u8; take];
        self.fill_unchecked(&mut out);
        out
    }
}
