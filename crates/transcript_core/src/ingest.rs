//! Sharded ingest buffer.
//!
//! Absorbs concurrent `add` calls from arbitrarily many producer threads.
//! Each calling thread hashes to one of a fixed pool of shards, so
//! unrelated producers rarely touch the same lock. A shard that reaches
//! the spill threshold drains into the caller's spill closure while the
//! shard lock is still held.
//!
//! The sealed flag is always checked under the shard lock, so once
//! [`ShardedBuffer::seal`] has visited a shard no later `add` can slip a
//! record into it. Spilling under the same lock gives `seal` a second
//! guarantee: it cannot acquire a shard until any in-flight spill from
//! that shard has finished registering its chunk, so a finalize that
//! follows `seal` always sees every chunk produced by a successful
//! `add`.

use crate::error::{StoreError, StoreResult};
use crate::record::EventRecord;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A fixed pool of independently locked record buffers.
pub(crate) struct ShardedBuffer {
    shards: Vec<Mutex<Vec<EventRecord>>>,
    /// Records per shard before a batch is drained into the spill closure.
    spill_threshold: usize,
    /// Next global arrival sequence number.
    next_seq: AtomicU64,
    /// Number of events accepted so far.
    accepted: AtomicU64,
    /// Set once `seal` has been called; no further adds are accepted.
    sealed: AtomicBool,
}

impl ShardedBuffer {
    /// Creates a buffer with `shard_count` shards.
    pub(crate) fn new(shard_count: usize, spill_threshold: usize) -> Self {
        let shard_count = shard_count.max(1);
        let mut shards = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            shards.push(Mutex::new(Vec::new()));
        }
        Self {
            shards,
            spill_threshold: spill_threshold.max(1),
            next_seq: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            sealed: AtomicBool::new(false),
        }
    }

    /// Buffers one event, assigning its arrival sequence number.
    ///
    /// When the calling thread's shard reaches the spill threshold, the
    /// drained batch is handed to `spill` with the shard lock still
    /// held. A concurrent [`Self::seal`] therefore either drains the
    /// shard itself or waits until the spill has completed; a batch can
    /// never fall between the two.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error after [`Self::seal`], or the
    /// spill closure's error.
    pub(crate) fn add<F>(
        &self,
        timestamp_micros: i64,
        type_tag: String,
        payload: Vec<u8>,
        spill: F,
    ) -> StoreResult<()>
    where
        F: FnOnce(Vec<EventRecord>) -> StoreResult<()>,
    {
        let shard_index = self.shard_for_current_thread();
        let mut shard = self.shards[shard_index].lock();

        if self.sealed.load(Ordering::Acquire) {
            return Err(StoreError::invalid_state(
                "cannot add events after write() has begun",
            ));
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        shard.push(EventRecord {
            timestamp_micros,
            seq,
            type_tag,
            payload,
        });
        self.accepted.fetch_add(1, Ordering::Relaxed);

        if shard.len() >= self.spill_threshold {
            let batch = std::mem::take(&mut *shard);
            spill(batch)?;
        }
        Ok(())
    }

    /// Seals the buffer and drains every shard.
    ///
    /// Returns the non-empty residual batches in shard order. After this
    /// returns, any concurrent or later `add` fails.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error if the buffer was already sealed.
    pub(crate) fn seal(&self) -> StoreResult<Vec<Vec<EventRecord>>> {
        if self.sealed.swap(true, Ordering::AcqRel) {
            return Err(StoreError::invalid_state("write() may only be called once"));
        }

        let mut batches = Vec::new();
        for shard in &self.shards {
            // Taking each lock after setting the flag fences out
            // in-flight adds, including any spill still running under a
            // shard lock
            let batch = std::mem::take(&mut *shard.lock());
            if !batch.is_empty() {
                batches.push(batch);
            }
        }
        Ok(batches)
    }

    /// Number of events accepted so far.
    pub(crate) fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Acquire)
    }

    /// Whether the buffer has been sealed.
    pub(crate) fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    fn shard_for_current_thread(&self) -> usize {
        let mut hasher = DefaultHasher::new();
        std::thread::current().id().hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }
}
