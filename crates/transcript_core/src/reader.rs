//! Transcript reader: ordered, type-dispatched replay.

use crate::error::{StoreError, StoreResult};
use crate::event::TranscriptEvent;
use crate::record::{decode_artifact_frame, TRANSCRIPT_MAGIC, TRANSCRIPT_VERSION};
use crate::record::HeaderEntry;
use crate::stream::ByteStream;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use transcript_storage::FileBackend;

/// Deserializes a payload and invokes the registered callback.
type Handler = Box<dyn FnMut(DateTime<Utc>, &[u8]) -> StoreResult<()>>;

/// Replays a finalized transcript artifact in timestamp order.
///
/// Opening a reader parses the header section eagerly; event records are
/// then consumed one at a time by driving [`TranscriptReader::next`].
/// Handlers registered per type tag receive the events they match;
/// records with no matching handler are consumed silently.
///
/// The reader is a single-pass, forward-only iterator. It is independent
/// of the writer's lifetime, and any number of readers may open the same
/// artifact concurrently - each holds its own file handle and position.
/// One reader instance must not be shared between threads without
/// external synchronization (all consuming methods take `&mut self`).
///
/// # Example
///
/// ```no_run
/// use transcript_core::TranscriptReader;
/// # use serde::{Deserialize, Serialize};
/// # use transcript_core::TranscriptEvent;
/// # #[derive(Serialize, Deserialize)]
/// # struct PeerDialed { peer: String }
/// # impl TranscriptEvent for PeerDialed {
/// #     const TYPE_TAG: &'static str = "net.peer_dialed";
/// # }
///
/// # fn main() -> Result<(), transcript_core::StoreError> {
/// let mut reader = TranscriptReader::open("run.transcript")?;
/// println!("{} events", reader.number_of_events());
///
/// let mut dials = 0u64;
/// reader.on_event::<PeerDialed, _>(move |_ts, _event| {
///     dials += 1;
/// });
/// while reader.next()? {}
/// reader.close();
/// # Ok(())
/// # }
/// ```
pub struct TranscriptReader {
    stream: ByteStream,
    headers: HashMap<String, Vec<u8>>,
    event_count: u64,
    consumed: u64,
    handlers: HashMap<String, Handler>,
}

impl TranscriptReader {
    /// Opens a finalized artifact and parses its header section.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened, or a format
    /// error if it is truncated, carries an unrecognized version, or is
    /// otherwise unparsable.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let backend = FileBackend::open_read_only(path.as_ref())?;
        let mut stream = ByteStream::new(Box::new(backend), 0)?;

        let magic = stream.read_bytes(4)?;
        if magic != TRANSCRIPT_MAGIC {
            return Err(StoreError::bad_format(
                "not a transcript artifact: bad magic",
            ));
        }
        let version = stream.read_u16()?;
        if version > TRANSCRIPT_VERSION {
            return Err(StoreError::bad_format(format!(
                "unsupported transcript version {version}"
            )));
        }

        let event_count = stream.read_u64()?;
        let header_count = stream.read_u32()?;
        let mut headers = HashMap::with_capacity(header_count as usize);
        for _ in 0..header_count {
            let entry = HeaderEntry::decode(&mut stream)?;
            headers.insert(entry.key, entry.payload);
        }

        Ok(Self {
            stream,
            headers,
            event_count,
            consumed: 0,
            handlers: HashMap::new(),
        })
    }

    /// Total number of event records in the artifact.
    #[must_use]
    pub fn number_of_events(&self) -> u64 {
        self.event_count
    }

    /// Deserializes and returns the named header entry.
    ///
    /// # Errors
    ///
    /// Returns a header not found error if the key is absent, or a type
    /// mismatch error if the stored payload cannot be decoded as `T`.
    pub fn header<T: serde::de::DeserializeOwned>(&self, key: &str) -> StoreResult<T> {
        let payload = self
            .headers
            .get(key)
            .ok_or_else(|| StoreError::header_not_found(key))?;
        transcript_codec::from_cbor(payload)
            .map_err(|e| StoreError::type_mismatch(key, e.to_string()))
    }

    /// Registers a callback for events whose type tag matches
    /// `E::TYPE_TAG`.
    ///
    /// Handlers for distinct types coexist; registering the same type
    /// again replaces its earlier handler. Events with no registered
    /// handler are skipped without error.
    pub fn on_event<E, F>(&mut self, mut callback: F)
    where
        E: TranscriptEvent + 'static,
        F: FnMut(DateTime<Utc>, E) + 'static,
    {
        self.handlers.insert(
            E::TYPE_TAG.to_owned(),
            Box::new(move |timestamp, payload| {
                let event: E = transcript_codec::from_cbor(payload)
                    .map_err(|e| StoreError::type_mismatch(E::TYPE_TAG, e.to_string()))?;
                callback(timestamp, event);
                Ok(())
            }),
        );
    }

    /// Consumes exactly one event record in artifact order.
    ///
    /// Invokes at most one matching handler. Returns `false` at end of
    /// stream; repeated calls after the end keep returning `false`.
    ///
    /// # Errors
    ///
    /// Returns a format error on a truncated or corrupted record, or a
    /// type mismatch error if a matching handler cannot decode the
    /// payload. The reader should not be used after an error, except to
    /// close it.
    pub fn next(&mut self) -> StoreResult<bool> {
        if self.consumed >= self.event_count {
            return Ok(false);
        }

        let (timestamp_micros, type_tag, payload) = decode_artifact_frame(&mut self.stream)?;
        self.consumed += 1;

        let timestamp = DateTime::from_timestamp_micros(timestamp_micros).ok_or_else(|| {
            StoreError::bad_format(format!(
                "event timestamp out of range: {timestamp_micros} microseconds"
            ))
        })?;

        if let Some(handler) = self.handlers.get_mut(&type_tag) {
            handler(timestamp, &payload)?;
        }
        Ok(true)
    }

    /// Closes the reader, releasing its file handle.
    ///
    /// Consuming `self` makes use-after-close unrepresentable; dropping
    /// the reader releases the handle the same way.
    pub fn close(self) {}
}

impl std::fmt::Debug for TranscriptReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptReader")
            .field("events", &self.event_count)
            .field("consumed", &self.consumed)
            .field("headers", &self.headers.len())
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}
