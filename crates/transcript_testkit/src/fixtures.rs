//! Test fixtures and transcript helpers.
//!
//! Provides sample event types modeled on a distributed-network test
//! run, plus convenience helpers for recording and replaying a
//! transcript inside a temporary directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tempfile::TempDir;
use transcript_core::{
    StoreResult, TranscriptEvent, TranscriptReader, TranscriptWriter, WriterConfig,
};

/// A node dialed another peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDialed {
    /// Node that initiated the dial.
    pub node: String,
    /// Peer address that was dialed.
    pub peer: String,
}

impl TranscriptEvent for PeerDialed {
    const TYPE_TAG: &'static str = "net.peer_dialed";
}

/// A node received a block from a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReceived {
    /// Receiving node.
    pub node: String,
    /// Block height.
    pub height: u64,
    /// Block hash, hex-encoded.
    pub hash: String,
}

impl TranscriptEvent for BlockReceived {
    const TYPE_TAG: &'static str = "chain.block_received";
}

/// A bootstrap peer was added to a node's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapPeerConfigured {
    /// Node being configured.
    pub node: String,
    /// Bootstrap peer address.
    pub peer: String,
}

impl TranscriptEvent for BootstrapPeerConfigured {
    const TYPE_TAG: &'static str = "config.bootstrap_peer";
}

/// A node dropped a peer connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDropped {
    /// Node that dropped the connection.
    pub node: String,
    /// Dropped peer address.
    pub peer: String,
    /// Human-readable reason.
    pub reason: String,
}

impl TranscriptEvent for PeerDropped {
    const TYPE_TAG: &'static str = "net.peer_dropped";
}

/// Run-level metadata stored as a transcript header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Unique run identifier.
    pub run_id: String,
    /// Number of nodes in the test topology.
    pub node_count: u32,
    /// RNG seed the run was driven with.
    pub seed: u64,
}

/// Header key under which [`RunMetadata`] is conventionally stored.
pub const RUN_METADATA_KEY: &str = "runMetadata";

/// Returns a timestamp at the given microsecond offset from the epoch.
///
/// # Panics
///
/// Panics if the offset is outside chrono's representable range.
pub fn micros(offset: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(offset).expect("timestamp in range")
}

/// A writer rooted in a temporary directory with automatic cleanup.
pub struct TestTranscript {
    /// The writer instance.
    pub writer: TranscriptWriter,
    /// The temporary directory (kept alive until the fixture drops).
    temp_dir: TempDir,
}

impl TestTranscript {
    /// Creates a fixture with default writer configuration.
    ///
    /// # Panics
    ///
    /// Panics on I/O failure; fixtures are test-only code.
    pub fn new() -> Self {
        Self::with_config(WriterConfig::default())
    }

    /// Creates a fixture with the given writer configuration.
    ///
    /// A small `spill_threshold` forces chunk spilling even in small
    /// tests, exercising the external-sort path.
    ///
    /// # Panics
    ///
    /// Panics on I/O failure; fixtures are test-only code.
    pub fn with_config(config: WriterConfig) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let writer = TranscriptWriter::with_config(temp_dir.path().join("work"), config)
            .expect("failed to create transcript writer");
        Self { writer, temp_dir }
    }

    /// Path the artifact will be finalized to.
    pub fn artifact_path(&self) -> PathBuf {
        self.temp_dir.path().join("run.transcript")
    }

    /// Finalizes the transcript and returns the artifact path.
    ///
    /// # Errors
    ///
    /// Propagates the writer's finalize error.
    pub fn finalize(&self) -> StoreResult<PathBuf> {
        let path = self.artifact_path();
        self.writer.write(&path)?;
        Ok(path)
    }

    /// Finalizes the transcript and opens a reader over the artifact.
    ///
    /// # Errors
    ///
    /// Propagates finalize and open errors.
    pub fn finalize_and_open(&self) -> StoreResult<TranscriptReader> {
        let path = self.finalize()?;
        TranscriptReader::open(path)
    }
}

impl Default for TestTranscript {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test against a fresh temporary transcript writer.
///
/// # Example
///
/// ```rust,ignore
/// use transcript_testkit::with_test_transcript;
///
/// #[test]
/// fn my_test() {
///     with_test_transcript(|t| {
///         t.writer.add(micros(1), &some_event).unwrap();
///         let reader = t.finalize_and_open().unwrap();
///         // ... assertions
///     });
/// }
/// ```
pub fn with_test_transcript<F, R>(f: F) -> R
where
    F: FnOnce(&TestTranscript) -> R,
{
    let fixture = TestTranscript::new();
    f(&fixture)
}
