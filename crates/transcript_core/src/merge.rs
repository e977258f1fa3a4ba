//! K-way merge of sorted chunks.
//!
//! Finalize combines N sorted chunks into one globally ordered stream by
//! holding exactly one buffered head record per chunk in a min-heap.
//! Memory is bounded by N, never by total event count - the property that
//! lets the store handle event volumes far larger than RAM.

use crate::chunk::ChunkCursor;
use crate::error::StoreResult;
use crate::record::EventRecord;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// One chunk's current head record.
struct Head {
    record: EventRecord,
    /// Index of the cursor this head came from; the final ordering key,
    /// so heads with identical `(timestamp, seq)` still compare totally.
    source: usize,
}

impl Head {
    fn key(&self) -> (i64, u64, usize) {
        let (ts, seq) = self.record.sort_key();
        (ts, seq, self.source)
    }
}

impl PartialEq for Head {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Head {}

impl PartialOrd for Head {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Head {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Merges N sorted chunk cursors into one sorted stream.
pub(crate) struct ChunkMerger {
    cursors: Vec<ChunkCursor>,
    heap: BinaryHeap<Reverse<Head>>,
}

impl ChunkMerger {
    /// Primes the merge with the head record of every non-empty cursor.
    ///
    /// N = 0 is valid and yields an immediately exhausted merge.
    ///
    /// # Errors
    ///
    /// Returns an error if reading any chunk head fails.
    pub(crate) fn new(mut cursors: Vec<ChunkCursor>) -> StoreResult<Self> {
        let mut heap = BinaryHeap::with_capacity(cursors.len());
        for (source, cursor) in cursors.iter_mut().enumerate() {
            if let Some(record) = cursor.next()? {
                heap.push(Reverse(Head { record, source }));
            }
        }
        Ok(Self { cursors, heap })
    }

    /// Emits the globally smallest head record and refills from its chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if advancing the source chunk fails.
    pub(crate) fn next(&mut self) -> StoreResult<Option<EventRecord>> {
        let Some(Reverse(head)) = self.heap.pop() else {
            return Ok(None);
        };
        if let Some(record) = self.cursors[head.source].next()? {
            self.heap.push(Reverse(Head {
                record,
                source: head.source,
            }));
        }
        Ok(Some(head.record))
    }
}
