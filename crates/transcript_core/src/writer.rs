//! Transcript writer: concurrent recording and finalize.

use crate::config::WriterConfig;
use crate::error::{StoreError, StoreResult};
use crate::event::TranscriptEvent;
use crate::ingest::ShardedBuffer;
use crate::merge::ChunkMerger;
use crate::record::{
    EventRecord, HeaderEntry, MAX_TAG_LEN, TRANSCRIPT_MAGIC, TRANSCRIPT_VERSION,
};
use crate::workdir::Workdir;
use crate::{chunk, chunk::ChunkCursor};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};
use transcript_storage::{FileBackend, StorageBackend};

/// Write accumulator size before flushing merged records to the artifact.
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Records timestamped events from concurrent producers and finalizes
/// them into a single time-ordered transcript artifact.
///
/// A writer owns a working directory used as scratch space: in-memory
/// buffers spill to sorted chunk files there, bounding peak memory
/// independent of total event count. [`TranscriptWriter::write`] k-way
/// merges the chunks into one artifact and removes the scratch files.
///
/// # Concurrency
///
/// `add` and `add_header` take `&self` and are safe from any number of
/// threads; share the writer behind an [`std::sync::Arc`]. No ordering is
/// promised between concurrent `add` calls - the finalized artifact is
/// globally ordered by timestamp, with ties broken by arrival order.
///
/// # Lifecycle
///
/// The writer is *open* from construction until `write` begins; `add` and
/// `add_header` fail with an invalid state error afterward. `write` may
/// be called exactly once.
pub struct TranscriptWriter {
    workdir: Workdir,
    config: WriterConfig,
    buffer: ShardedBuffer,
    headers: Mutex<Vec<HeaderEntry>>,
    /// Ids of chunks spilled so far.
    chunks: Mutex<Vec<u64>>,
    next_chunk_id: AtomicU64,
}

impl TranscriptWriter {
    /// Creates a writer with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the working directory cannot be created or is
    /// already owned by another writer.
    pub fn new(workdir: impl AsRef<Path>) -> StoreResult<Self> {
        Self::with_config(workdir, WriterConfig::default())
    }

    /// Creates a writer with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the working directory cannot be created or is
    /// already owned by another writer.
    pub fn with_config(workdir: impl AsRef<Path>, config: WriterConfig) -> StoreResult<Self> {
        let workdir = Workdir::open(workdir.as_ref())?;
        let buffer = ShardedBuffer::new(config.shard_count, config.spill_threshold);
        Ok(Self {
            workdir,
            config,
            buffer,
            headers: Mutex::new(Vec::new()),
            chunks: Mutex::new(Vec::new()),
            next_chunk_id: AtomicU64::new(0),
        })
    }

    /// Stores a named metadata blob in the artifact header section.
    ///
    /// Keys are unique within the artifact; adding the same key again
    /// replaces the earlier value.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error once `write` has begun, or if the
    /// value cannot be serialized.
    pub fn add_header<T: serde::Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        if key.len() > MAX_TAG_LEN {
            return Err(StoreError::invalid_state(format!(
                "header key too long: {} bytes exceeds maximum of {} bytes",
                key.len(),
                MAX_TAG_LEN
            )));
        }
        let payload = transcript_codec::to_cbor(value)?;

        let mut headers = self.headers.lock();
        // Checked under the lock so write() cannot race a header in
        if self.buffer.is_sealed() {
            return Err(StoreError::invalid_state(
                "cannot add headers after write() has begun",
            ));
        }
        if let Some(existing) = headers.iter_mut().find(|h| h.key == key) {
            existing.payload = payload;
        } else {
            headers.push(HeaderEntry {
                key: key.to_owned(),
                payload,
            });
        }
        Ok(())
    }

    /// Records one typed event.
    ///
    /// Safe to call from any number of threads. The call never touches
    /// disk except when its shard reaches the spill threshold; the spill
    /// completes before the shard accepts further records.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error once `write` has begun, a codec
    /// error if the event cannot be serialized, or an I/O error if a
    /// triggered spill fails (which aborts the recording session).
    pub fn add<E: TranscriptEvent>(&self, timestamp: DateTime<Utc>, event: &E) -> StoreResult<()> {
        let payload = transcript_codec::to_cbor(event)?;
        self.add_raw(timestamp, E::TYPE_TAG, payload)
    }

    /// Records one event with an explicit type tag and pre-serialized
    /// payload.
    ///
    /// For producers that construct payloads dynamically (for example, a
    /// log-line parser emitting tag/bytes pairs).
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::add`].
    pub fn add_raw(
        &self,
        timestamp: DateTime<Utc>,
        type_tag: &str,
        payload: Vec<u8>,
    ) -> StoreResult<()> {
        // The spill runs while the buffer still holds the shard lock, so
        // a concurrent write() cannot seal and snapshot the chunk list
        // between this add being accepted and its chunk being registered
        self.buffer
            .add(timestamp.timestamp_micros(), type_tag.to_owned(), payload, |batch| {
                self.spill(batch)
            })
    }

    /// Number of events accepted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.buffer.accepted()
    }

    /// Finalizes the transcript into a single artifact at `output`.
    ///
    /// Blocking and proportional to total event count: flushes residual
    /// buffers, k-way merges all chunks, streams the result to a
    /// temporary file and renames it into place, so a reader never
    /// observes a half-written artifact. Scratch chunks are removed on
    /// success (best effort).
    ///
    /// # Errors
    ///
    /// Returns an invalid state error on a second call, or an I/O error
    /// on storage failure - in which case no artifact is left at
    /// `output`.
    pub fn write(&self, output: impl AsRef<Path>) -> StoreResult<()> {
        let output = output.as_ref();

        // Seal first: from here on add/add_header fail, and the residual
        // batches below are complete
        let residual = self.buffer.seal()?;
        for batch in residual {
            self.spill(batch)?;
        }

        let event_count = self.buffer.accepted();
        let headers = self.headers.lock().clone();
        let chunk_ids = self.chunks.lock().clone();

        let tmp_path = temp_output_path(output)?;
        let result = self.write_artifact(&tmp_path, output, event_count, &headers, &chunk_ids);
        if result.is_err() {
            // Never leave a half-written temp file behind
            let _ = std::fs::remove_file(&tmp_path);
            return result;
        }

        self.workdir.remove_chunks(&chunk_ids);
        info!(
            path = %output.display(),
            events = event_count,
            chunks = chunk_ids.len(),
            "transcript finalized"
        );
        Ok(())
    }

    /// Sorts and writes one batch as a new chunk file.
    fn spill(&self, batch: Vec<EventRecord>) -> StoreResult<()> {
        let id = self.next_chunk_id.fetch_add(1, Ordering::Relaxed);
        let path = self.workdir.chunk_path(id);
        let records = batch.len();
        chunk::spill_chunk(&path, batch)?;
        self.chunks.lock().push(id);
        debug!(chunk = id, records, "ingest shard spilled");
        Ok(())
    }

    fn write_artifact(
        &self,
        tmp_path: &Path,
        output: &Path,
        event_count: u64,
        headers: &[HeaderEntry],
        chunk_ids: &[u64],
    ) -> StoreResult<()> {
        let mut backend = FileBackend::create_with_dirs(tmp_path)?;

        // Preamble: marker, count, then the full header table - a reader
        // sees every header before the first event record
        let mut buf = Vec::with_capacity(WRITE_BUFFER_SIZE);
        buf.extend_from_slice(&TRANSCRIPT_MAGIC);
        buf.extend_from_slice(&TRANSCRIPT_VERSION.to_le_bytes());
        buf.extend_from_slice(&event_count.to_le_bytes());
        buf.extend_from_slice(&(headers.len() as u32).to_le_bytes());
        for header in headers {
            header.encode(&mut buf)?;
        }
        backend.append(&buf)?;
        buf.clear();

        let mut cursors = Vec::with_capacity(chunk_ids.len());
        for &id in chunk_ids {
            cursors.push(ChunkCursor::open(&self.workdir.chunk_path(id))?);
        }
        let mut merger = ChunkMerger::new(cursors)?;

        let mut merged = 0u64;
        while let Some(record) = merger.next()? {
            record.encode_artifact_frame(&mut buf)?;
            merged += 1;
            if buf.len() >= WRITE_BUFFER_SIZE {
                backend.append(&buf)?;
                buf.clear();
            }
        }
        if !buf.is_empty() {
            backend.append(&buf)?;
        }

        // A mismatch means a chunk was lost or corrupted; surfacing it
        // here is the no-silent-data-loss guarantee
        if merged != event_count {
            return Err(StoreError::bad_format(format!(
                "merged {merged} events but {event_count} were recorded"
            )));
        }

        backend.flush()?;
        if self.config.sync_artifact {
            backend.sync()?;
        }
        drop(backend);

        std::fs::rename(tmp_path, output)?;
        Ok(())
    }
}

impl std::fmt::Debug for TranscriptWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptWriter")
            .field("workdir", &self.workdir.path())
            .field("events", &self.buffer.accepted())
            .field("sealed", &self.buffer.is_sealed())
            .finish_non_exhaustive()
    }
}

/// Temp path next to the output, so the final rename stays on one
/// filesystem.
fn temp_output_path(output: &Path) -> StoreResult<PathBuf> {
    let file_name = output
        .file_name()
        .ok_or_else(|| StoreError::invalid_state("output path has no file name"))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    Ok(output.with_file_name(tmp_name))
}
