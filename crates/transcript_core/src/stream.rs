//! Buffered sequential reads over a storage backend.

use crate::error::{StoreError, StoreResult};
use transcript_storage::StorageBackend;

/// Read buffer size for streaming iteration.
/// Reads happen in chunks to minimize I/O syscalls while keeping memory bounded.
const READ_BUFFER_SIZE: usize = 64 * 1024; // 64 KB

/// A forward-only buffered reader over a [`StorageBackend`].
///
/// Both the chunk cursor and the transcript reader parse length-prefixed
/// frames out of a byte store. `ByteStream` gives them a shared refillable
/// window: callers `ensure` a number of bytes, `peek` at them, and
/// `advance` past what they consumed. Memory stays constant regardless of
/// file size; the buffer grows only for a frame larger than the default
/// window and never shrinks below what that frame needed.
pub(crate) struct ByteStream {
    /// The backing byte store.
    backend: Box<dyn StorageBackend>,
    /// Total size of the backing store.
    total_size: u64,
    /// Absolute offset of the next unconsumed byte.
    position: u64,
    /// Refillable read window.
    buffer: Vec<u8>,
    /// Position of the next unconsumed byte within the buffer.
    buffer_pos: usize,
    /// Number of valid bytes in the buffer.
    buffer_len: usize,
}

impl ByteStream {
    /// Creates a stream positioned at `start`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be determined.
    pub(crate) fn new(backend: Box<dyn StorageBackend>, start: u64) -> StoreResult<Self> {
        let total_size = backend.size()?;
        Ok(Self {
            backend,
            total_size,
            position: start,
            buffer: vec![0u8; READ_BUFFER_SIZE],
            buffer_pos: 0,
            buffer_len: 0,
        })
    }

    /// Absolute offset of the next unconsumed byte.
    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    /// Bytes left between the current position and the end of the store.
    pub(crate) fn remaining(&self) -> u64 {
        self.total_size - self.position
    }

    /// Ensures at least `min_bytes` are buffered from the current position.
    ///
    /// Returns `false` if the backing store ends before `min_bytes` more
    /// bytes - the caller decides whether that is a clean end or a
    /// truncation.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the backend fails.
    pub(crate) fn ensure(&mut self, min_bytes: usize) -> StoreResult<bool> {
        let available = self.buffer_len - self.buffer_pos;
        if available >= min_bytes {
            return Ok(true);
        }

        let unread_in_store = self.total_size - self.position - available as u64;
        if unread_in_store < (min_bytes - available) as u64 {
            return Ok(false);
        }

        // Move the unconsumed tail to the front of the buffer
        if self.buffer_pos > 0 && available > 0 {
            self.buffer.copy_within(self.buffer_pos..self.buffer_len, 0);
        }
        self.buffer_len = available;
        self.buffer_pos = 0;

        // A frame larger than the window forces the buffer to grow
        if min_bytes > self.buffer.len() {
            let new_size = min_bytes.next_power_of_two();
            self.buffer.resize(new_size, 0);
        }

        let bytes_to_read = std::cmp::min(
            self.buffer.len() - self.buffer_len,
            unread_in_store as usize,
        );

        if bytes_to_read > 0 {
            let read_offset = self.position + self.buffer_len as u64;
            let data = self.backend.read_at(read_offset, bytes_to_read)?;
            self.buffer[self.buffer_len..self.buffer_len + data.len()].copy_from_slice(&data);
            self.buffer_len += data.len();
        }

        Ok(self.buffer_len - self.buffer_pos >= min_bytes)
    }

    /// Returns a view of the next `len` buffered bytes.
    ///
    /// Callers must have obtained `true` from [`Self::ensure`] for at
    /// least `len` bytes first.
    pub(crate) fn peek(&self, len: usize) -> &[u8] {
        &self.buffer[self.buffer_pos..self.buffer_pos + len]
    }

    /// Consumes `len` buffered bytes.
    pub(crate) fn advance(&mut self, len: usize) {
        debug_assert!(len <= self.buffer_len - self.buffer_pos);
        self.buffer_pos += len;
        self.position += len as u64;
    }

    /// Reads a little-endian `u16`, failing on end of data.
    pub(crate) fn read_u16(&mut self) -> StoreResult<u16> {
        if !self.ensure(2)? {
            return Err(self.truncated());
        }
        let b = self.peek(2);
        let value = u16::from_le_bytes([b[0], b[1]]);
        self.advance(2);
        Ok(value)
    }

    /// Reads a little-endian `u32`, failing on end of data.
    pub(crate) fn read_u32(&mut self) -> StoreResult<u32> {
        if !self.ensure(4)? {
            return Err(self.truncated());
        }
        let b = self.peek(4);
        let value = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        self.advance(4);
        Ok(value)
    }

    /// Reads a little-endian `u64`, failing on end of data.
    pub(crate) fn read_u64(&mut self) -> StoreResult<u64> {
        if !self.ensure(8)? {
            return Err(self.truncated());
        }
        let b = self.peek(8);
        let value = u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]);
        self.advance(8);
        Ok(value)
    }

    /// Reads `len` bytes into an owned vector, failing on end of data.
    pub(crate) fn read_bytes(&mut self, len: usize) -> StoreResult<Vec<u8>> {
        if !self.ensure(len)? {
            return Err(self.truncated());
        }
        let bytes = self.peek(len).to_vec();
        self.advance(len);
        Ok(bytes)
    }

    fn truncated(&self) -> StoreError {
        StoreError::bad_format(format!(
            "unexpected end of data at offset {}",
            self.position
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transcript_storage::InMemoryBackend;

    fn stream_over(data: Vec<u8>) -> ByteStream {
        ByteStream::new(Box::new(InMemoryBackend::with_data(data)), 0).unwrap()
    }

    #[test]
    fn reads_primitives_in_order() {
        let mut data = Vec::new();
        data.extend_from_slice(&7u16.to_le_bytes());
        data.extend_from_slice(&42u32.to_le_bytes());
        data.extend_from_slice(&u64::MAX.to_le_bytes());
        data.extend_from_slice(b"tail");

        let mut stream = stream_over(data);
        assert_eq!(stream.read_u16().unwrap(), 7);
        assert_eq!(stream.read_u32().unwrap(), 42);
        assert_eq!(stream.read_u64().unwrap(), u64::MAX);
        assert_eq!(stream.read_bytes(4).unwrap(), b"tail");
        assert_eq!(stream.remaining(), 0);
    }

    #[test]
    fn ensure_reports_end_of_data() {
        let mut stream = stream_over(vec![1, 2, 3]);
        assert!(stream.ensure(3).unwrap());
        assert!(!stream.ensure(4).unwrap());
    }

    #[test]
    fn read_past_end_is_format_error() {
        let mut stream = stream_over(vec![1, 2, 3]);
        let result = stream.read_u32();
        assert!(matches!(result, Err(StoreError::Format { .. })));
    }

    #[test]
    fn position_tracks_consumption() {
        let mut stream = stream_over(vec![0u8; 32]);
        assert_eq!(stream.position(), 0);
        stream.read_u64().unwrap();
        assert_eq!(stream.position(), 8);
        stream.read_bytes(10).unwrap();
        assert_eq!(stream.position(), 18);
        assert_eq!(stream.remaining(), 14);
    }

    #[test]
    fn grows_for_oversized_frame() {
        // A single read larger than the default window
        let big = vec![0xABu8; READ_BUFFER_SIZE * 2];
        let mut stream = stream_over(big.clone());
        let bytes = stream.read_bytes(big.len()).unwrap();
        assert_eq!(bytes, big);
    }

    #[test]
    fn refills_across_window_boundaries() {
        let data: Vec<u8> = (0..(READ_BUFFER_SIZE * 3))
            .map(|i| (i % 251) as u8)
            .collect();
        let mut stream = stream_over(data.clone());

        let mut out = Vec::new();
        // Uneven read sizes force compaction and refills
        for chunk_len in [1000usize, 64 * 1024, 13, 70_000].iter().cycle() {
            let n = (*chunk_len).min(stream.remaining() as usize);
            if n == 0 {
                break;
            }
            out.extend_from_slice(&stream.read_bytes(n).unwrap());
        }
        assert_eq!(out, data);
    }

    #[test]
    fn starts_at_offset() {
        let mut stream =
            ByteStream::new(Box::new(InMemoryBackend::with_data(b"skipme!!rest".to_vec())), 8)
                .unwrap();
        assert_eq!(stream.read_bytes(4).unwrap(), b"rest");
    }
}
