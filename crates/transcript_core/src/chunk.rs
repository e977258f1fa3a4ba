//! Chunk spilling and streaming chunk reads.
//!
//! A chunk is one spilled buffer batch: sorted by `(timestamp, arrival
//! seq)` and written to a scratch file that is self-contained and
//! independently readable. Chunks are transient - the merge consumes them
//! and the writer deletes them once the artifact is published.
//!
//! Chunk file layout:
//! `magic(4) version(2) record_count(8)` followed by chunk frames.

use crate::error::{StoreError, StoreResult};
use crate::record::{EventRecord, CHUNK_MAGIC, CHUNK_VERSION};
use crate::stream::ByteStream;
use std::path::Path;
use tracing::debug;
use transcript_storage::{FileBackend, StorageBackend};

/// Chunk file header size: magic (4) + version (2) + record count (8).
const CHUNK_HEADER_SIZE: usize = 14;

/// Write accumulator size before flushing to the backend.
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Sorts a batch by `(timestamp, seq)` and writes it as a chunk file.
///
/// # Errors
///
/// Returns an error if the chunk cannot be written; per the recording
/// contract this aborts the whole session, partial chunks are not
/// recoverable.
pub(crate) fn spill_chunk(path: &Path, mut records: Vec<EventRecord>) -> StoreResult<()> {
    // Sequence numbers are unique, so the key has no equal elements and
    // an unstable sort is safe
    records.sort_unstable_by_key(EventRecord::sort_key);

    let mut backend = FileBackend::create(path)?;

    let mut buf = Vec::with_capacity(WRITE_BUFFER_SIZE + CHUNK_HEADER_SIZE);
    buf.extend_from_slice(&CHUNK_MAGIC);
    buf.extend_from_slice(&CHUNK_VERSION.to_le_bytes());
    buf.extend_from_slice(&(records.len() as u64).to_le_bytes());

    for record in &records {
        record.encode_chunk_frame(&mut buf)?;
        if buf.len() >= WRITE_BUFFER_SIZE {
            backend.append(&buf)?;
            buf.clear();
        }
    }
    if !buf.is_empty() {
        backend.append(&buf)?;
    }
    backend.flush()?;

    debug!(
        path = %path.display(),
        records = records.len(),
        "spilled chunk"
    );
    Ok(())
}

/// A streaming cursor over one sorted chunk.
///
/// Reads records one-by-one through a fixed-size refillable buffer, so
/// the merge holds O(1) memory per chunk regardless of chunk size.
pub(crate) struct ChunkCursor {
    stream: ByteStream,
    /// Records left to read.
    remaining: u64,
}

impl ChunkCursor {
    /// Opens a chunk file and validates its header.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its header is not
    /// a recognized chunk header.
    pub(crate) fn open(path: &Path) -> StoreResult<Self> {
        let backend = FileBackend::open_read_only(path)?;
        Self::from_backend(Box::new(backend))
    }

    /// Creates a cursor over an already-open backend.
    pub(crate) fn from_backend(backend: Box<dyn StorageBackend>) -> StoreResult<Self> {
        let mut stream = ByteStream::new(backend, 0)?;

        let magic = stream.read_bytes(4)?;
        if magic != CHUNK_MAGIC {
            return Err(StoreError::bad_format("not a chunk file: bad magic"));
        }
        let version = stream.read_u16()?;
        if version > CHUNK_VERSION {
            return Err(StoreError::bad_format(format!(
                "unsupported chunk version {version}"
            )));
        }
        let remaining = stream.read_u64()?;

        Ok(Self { stream, remaining })
    }

    /// Reads the next record, or `None` once the chunk is exhausted.
    ///
    /// # Errors
    ///
    /// Returns a format error if the chunk ends before its declared
    /// record count.
    pub(crate) fn next(&mut self) -> StoreResult<Option<EventRecord>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let record = EventRecord::decode_chunk_frame(&mut self.stream)?;
        self.remaining -= 1;
        Ok(Some(record))
    }

    /// Records left to read.
    pub(crate) fn remaining(&self) -> u64 {
        self.remaining
    }
}
