//! # Transcript Codec
//!
//! CBOR encoding/decoding for transcript payloads.
//!
//! Event and header payloads cross the transcript boundary as opaque CBOR
//! blobs: the writer serializes whatever the producer hands it, and the
//! reader deserializes a blob only when a handler (or header query) names
//! a concrete type for it. This keeps the writer decoupled from every
//! consumer's type set.
//!
//! ## Usage
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use transcript_codec::{from_cbor, to_cbor};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct PeerDialed {
//!     peer: String,
//! }
//!
//! let event = PeerDialed { peer: "node-3".into() };
//! let bytes = to_cbor(&event).unwrap();
//! let decoded: PeerDialed = from_cbor(&bytes).unwrap();
//! assert_eq!(event, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;

pub use error::{CodecError, CodecResult};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a value to CBOR bytes.
///
/// # Errors
///
/// Returns [`CodecError::EncodingFailed`] if the value cannot be
/// represented in CBOR (for example, a map with non-string keys when the
/// serde data model forbids it).
pub fn to_cbor<T: Serialize>(value: &T) -> CodecResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(bytes)
}

/// Decodes CBOR bytes into a value of type `T`.
///
/// # Errors
///
/// Returns [`CodecError::DecodingFailed`] if the bytes are not valid CBOR
/// or do not match the shape of `T`.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}
