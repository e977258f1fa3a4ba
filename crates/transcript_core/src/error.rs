//! Error types for the transcript store.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in transcript store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] transcript_storage::StorageError),

    /// CBOR codec error.
    #[error("codec error: {0}")]
    Codec(#[from] transcript_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Operation not permitted in the current writer or reader state.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Artifact or chunk file is unreadable: truncated, wrong version,
    /// or otherwise malformed.
    #[error("format error: {message}")]
    Format {
        /// Description of the format problem.
        message: String,
    },

    /// Requested header key is absent from the artifact.
    #[error("header not found: {key}")]
    HeaderNotFound {
        /// The key that was looked up.
        key: String,
    },

    /// Stored payload cannot be decoded as the requested type.
    #[error("payload for {name} cannot be decoded: {message}")]
    TypeMismatch {
        /// The event type tag or header key whose payload failed to decode.
        name: String,
        /// Description of the decode failure.
        message: String,
    },

    /// Another writer holds the working directory lock.
    #[error("working directory locked: another writer has exclusive access")]
    WorkdirLocked,
}

impl StoreError {
    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates a format error.
    pub fn bad_format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Creates a header not found error.
    pub fn header_not_found(key: impl Into<String>) -> Self {
        Self::HeaderNotFound { key: key.into() }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            name: name.into(),
            message: message.into(),
        }
    }
}
