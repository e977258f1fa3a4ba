//! Event payload contract.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A typed event payload that can be recorded in a transcript.
///
/// The type tag is a caller-defined string written alongside every record.
/// During replay the reader dispatches on the tag alone, so producers and
/// consumers only need to agree on the tag and the CBOR shape - never on a
/// shared compile-time type registry.
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use transcript_core::TranscriptEvent;
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct PeerDialed {
///     peer: String,
/// }
///
/// impl TranscriptEvent for PeerDialed {
///     const TYPE_TAG: &'static str = "net.peer_dialed";
/// }
/// ```
pub trait TranscriptEvent: Serialize + DeserializeOwned {
    /// Tag identifying this payload type in the artifact.
    ///
    /// Tags must be stable across producer and consumer builds; a
    /// namespaced name (`"net.peer_dialed"`) avoids collisions between
    /// independent event sources.
    const TYPE_TAG: &'static str;
}
