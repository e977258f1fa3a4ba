//! Record types and binary framing.
//!
//! Two frame layouts share the same field encoding (little-endian, length
//! prefixes for variable parts):
//!
//! - **Chunk frame** (scratch files, transient):
//!   `timestamp(8) seq(8) tag_len(2) tag payload_len(4) payload`.
//!   The arrival sequence number rides along so the merge can break ties
//!   between equal timestamps deterministically.
//! - **Artifact frame** (finalized transcript, durable):
//!   `timestamp(8) tag_len(2) tag payload_len(4) payload crc32(4)`.
//!   The sequence number is not persisted; the CRC covers the whole frame
//!   before it.

use crate::error::{StoreError, StoreResult};
use crate::stream::ByteStream;

/// Magic bytes identifying a chunk scratch file.
pub(crate) const CHUNK_MAGIC: [u8; 4] = *b"TCHK";

/// Magic bytes identifying a finalized transcript artifact.
pub(crate) const TRANSCRIPT_MAGIC: [u8; 4] = *b"TSCR";

/// Current chunk file format version.
pub(crate) const CHUNK_VERSION: u16 = 1;

/// Current transcript artifact format version.
pub(crate) const TRANSCRIPT_VERSION: u16 = 1;

/// Maximum payload size, limited by the 4-byte length field.
pub(crate) const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

/// Maximum type tag length, limited by the 2-byte length field.
pub(crate) const MAX_TAG_LEN: usize = u16::MAX as usize;

/// A buffered event record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EventRecord {
    /// UTC timestamp as microseconds since the Unix epoch.
    pub timestamp_micros: i64,
    /// Global arrival sequence number, assigned at `add` time.
    ///
    /// Unique per writer session; orders records with equal timestamps.
    pub seq: u64,
    /// Caller-defined type tag for replay dispatch.
    pub type_tag: String,
    /// Opaque serialized payload.
    pub payload: Vec<u8>,
}

impl EventRecord {
    /// The key chunks are sorted by and the merge orders on.
    pub(crate) fn sort_key(&self) -> (i64, u64) {
        (self.timestamp_micros, self.seq)
    }

    /// Validates field sizes against the frame length prefixes.
    fn check_limits(&self) -> StoreResult<()> {
        if self.type_tag.len() > MAX_TAG_LEN {
            return Err(StoreError::invalid_state(format!(
                "type tag too long: {} bytes exceeds maximum of {} bytes",
                self.type_tag.len(),
                MAX_TAG_LEN
            )));
        }
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(StoreError::invalid_state(format!(
                "event payload too large: {} bytes exceeds maximum of {} bytes",
                self.payload.len(),
                MAX_PAYLOAD_SIZE
            )));
        }
        Ok(())
    }

    /// Appends this record to `buf` in chunk frame layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag or payload exceeds its length prefix.
    pub(crate) fn encode_chunk_frame(&self, buf: &mut Vec<u8>) -> StoreResult<()> {
        self.check_limits()?;
        buf.extend_from_slice(&self.timestamp_micros.to_le_bytes());
        buf.extend_from_slice(&self.seq.to_le_bytes());
        buf.extend_from_slice(&(self.type_tag.len() as u16).to_le_bytes());
        buf.extend_from_slice(self.type_tag.as_bytes());
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        Ok(())
    }

    /// Reads one chunk frame from `stream`.
    ///
    /// # Errors
    ///
    /// Returns a format error if the frame is truncated or the tag is not
    /// valid UTF-8.
    pub(crate) fn decode_chunk_frame(stream: &mut ByteStream) -> StoreResult<Self> {
        let timestamp_micros = stream.read_u64()? as i64;
        let seq = stream.read_u64()?;
        let tag_len = stream.read_u16()? as usize;
        let tag_bytes = stream.read_bytes(tag_len)?;
        let type_tag = String::from_utf8(tag_bytes)
            .map_err(|_| StoreError::bad_format("chunk record tag is not valid UTF-8"))?;
        let payload_len = stream.read_u32()? as usize;
        let payload = stream.read_bytes(payload_len)?;

        Ok(Self {
            timestamp_micros,
            seq,
            type_tag,
            payload,
        })
    }

    /// Appends this record to `buf` in artifact frame layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag or payload exceeds its length prefix.
    pub(crate) fn encode_artifact_frame(&self, buf: &mut Vec<u8>) -> StoreResult<()> {
        self.check_limits()?;
        let frame_start = buf.len();
        buf.extend_from_slice(&self.timestamp_micros.to_le_bytes());
        buf.extend_from_slice(&(self.type_tag.len() as u16).to_le_bytes());
        buf.extend_from_slice(self.type_tag.as_bytes());
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        let crc = compute_crc32(&buf[frame_start..]);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(())
    }
}

/// Reads one artifact frame from `stream`, verifying its CRC.
///
/// Returns `(timestamp_micros, type_tag, payload)`.
///
/// # Errors
///
/// Returns a format error if the frame is truncated, the tag is not valid
/// UTF-8, or the checksum does not match.
pub(crate) fn decode_artifact_frame(
    stream: &mut ByteStream,
) -> StoreResult<(i64, String, Vec<u8>)> {
    let frame_offset = stream.position();

    // Fixed prefix: timestamp + tag length
    if !stream.ensure(10)? {
        return Err(StoreError::bad_format(format!(
            "transcript truncated at offset {frame_offset}"
        )));
    }
    let prefix = stream.peek(10);
    let tag_len = u16::from_le_bytes([prefix[8], prefix[9]]) as usize;

    // Extend to the payload length field
    let len_field_at = 10 + tag_len;
    if !stream.ensure(len_field_at + 4)? {
        return Err(StoreError::bad_format(format!(
            "transcript truncated at offset {frame_offset}"
        )));
    }
    let head = stream.peek(len_field_at + 4);
    let payload_len = u32::from_le_bytes([
        head[len_field_at],
        head[len_field_at + 1],
        head[len_field_at + 2],
        head[len_field_at + 3],
    ]) as usize;

    // Full frame including trailing CRC
    let total_len = len_field_at + 4 + payload_len + 4;
    if !stream.ensure(total_len)? {
        return Err(StoreError::bad_format(format!(
            "transcript truncated at offset {frame_offset}"
        )));
    }

    let frame = stream.peek(total_len);
    let crc_start = total_len - 4;
    let stored_crc = u32::from_le_bytes([
        frame[crc_start],
        frame[crc_start + 1],
        frame[crc_start + 2],
        frame[crc_start + 3],
    ]);
    let computed_crc = compute_crc32(&frame[..crc_start]);
    if stored_crc != computed_crc {
        return Err(StoreError::bad_format(format!(
            "event record checksum mismatch at offset {frame_offset}: \
             expected {stored_crc:08x}, got {computed_crc:08x}"
        )));
    }

    let timestamp_micros = i64::from_le_bytes([
        frame[0], frame[1], frame[2], frame[3], frame[4], frame[5], frame[6], frame[7],
    ]);
    let type_tag = std::str::from_utf8(&frame[10..10 + tag_len])
        .map_err(|_| StoreError::bad_format("event record tag is not valid UTF-8"))?
        .to_owned();
    let payload = frame[len_field_at + 4..crc_start].to_vec();

    stream.advance(total_len);
    Ok((timestamp_micros, type_tag, payload))
}

/// A named header blob written once per artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HeaderEntry {
    /// Unique key within the artifact.
    pub key: String,
    /// Opaque serialized payload.
    pub payload: Vec<u8>,
}

impl HeaderEntry {
    /// Appends this entry to `buf`: `key_len(2) key payload_len(4) payload`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or payload exceeds its length prefix.
    pub(crate) fn encode(&self, buf: &mut Vec<u8>) -> StoreResult<()> {
        if self.key.len() > MAX_TAG_LEN {
            return Err(StoreError::invalid_state(format!(
                "header key too long: {} bytes exceeds maximum of {} bytes",
                self.key.len(),
                MAX_TAG_LEN
            )));
        }
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(StoreError::invalid_state(format!(
                "header payload too large: {} bytes exceeds maximum of {} bytes",
                self.payload.len(),
                MAX_PAYLOAD_SIZE
            )));
        }
        buf.extend_from_slice(&(self.key.len() as u16).to_le_bytes());
        buf.extend_from_slice(self.key.as_bytes());
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        Ok(())
    }

    /// Reads one header entry from `stream`.
    ///
    /// # Errors
    ///
    /// Returns a format error if the entry is truncated or the key is not
    /// valid UTF-8.
    pub(crate) fn decode(stream: &mut ByteStream) -> StoreResult<Self> {
        let key_len = stream.read_u16()? as usize;
        let key_bytes = stream.read_bytes(key_len)?;
        let key = String::from_utf8(key_bytes)
            .map_err(|_| StoreError::bad_format("header key is not valid UTF-8"))?;
        let payload_len = stream.read_u32()? as usize;
        let payload = stream.read_bytes(payload_len)?;
        Ok(Self { key, payload })
    }
}

/// Computes a CRC32 checksum (IEEE polynomial).
pub(crate) fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
