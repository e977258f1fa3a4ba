//! Writer configuration.

/// Configuration for a [`crate::TranscriptWriter`].
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Number of ingest buffer shards.
    ///
    /// Producers are spread across shards by calling thread, so unrelated
    /// producers rarely contend on the same lock.
    pub shard_count: usize,

    /// Number of buffered records per shard before it is spilled to a
    /// chunk file. Peak memory is roughly
    /// `shard_count * spill_threshold * mean record size`, independent of
    /// the total number of events recorded.
    pub spill_threshold: usize,

    /// Whether to fsync the artifact before the final rename.
    pub sync_artifact: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            shard_count: 16,
            spill_threshold: 100_000,
            sync_artifact: true,
        }
    }
}

impl WriterConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of ingest buffer shards (minimum 1).
    #[must_use]
    pub fn shard_count(mut self, count: usize) -> Self {
        self.shard_count = count.max(1);
        self
    }

    /// Sets the per-shard spill threshold (minimum 1).
    #[must_use]
    pub fn spill_threshold(mut self, records: usize) -> Self {
        self.spill_threshold = records.max(1);
        self
    }

    /// Sets whether to fsync the artifact before publishing it.
    #[must_use]
    pub const fn sync_artifact(mut self, value: bool) -> Self {
        self.sync_artifact = value;
        self
    }
}
