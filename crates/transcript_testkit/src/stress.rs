//! Stress utilities for the transcript store.
//!
//! These harnesses verify behavior under heavy concurrent recording:
//! many producer threads, forced chunk spilling, and full
//! record-finalize-replay cycles at volume.

use crate::fixtures::{micros, PeerDialed};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use transcript_core::{StoreResult, TranscriptWriter};

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Events successfully recorded.
    pub recorded: u64,
    /// Recording failures.
    pub failed: u64,
    /// Wall-clock duration of the recording phase.
    pub duration: Duration,
    /// Events per second.
    pub events_per_second: f64,
}

impl StressResult {
    /// Creates a new result.
    pub fn new(recorded: u64, failed: u64, duration: Duration) -> Self {
        let events_per_second = if duration.as_secs_f64() > 0.0 {
            recorded as f64 / duration.as_secs_f64()
        } else {
            0.0
        };
        Self {
            recorded,
            failed,
            duration,
            events_per_second,
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Recorded: {}", self.recorded);
        println!("Failed: {}", self.failed);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} events/sec", self.events_per_second);
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of producer threads.
    pub threads: usize,
    /// Events recorded per thread.
    pub events_per_thread: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 8,
            events_per_thread: 10_000,
        }
    }
}

/// Deterministic timestamp for producer `thread_id`'s `i`-th event.
///
/// Interleaves timestamps across threads so no single chunk is already
/// globally ordered, forcing real merge work at finalize.
pub fn interleaved_timestamp(thread_id: u64, i: u64) -> DateTime<Utc> {
    micros((i * 1_000 + thread_id * 7) as i64)
}

/// Records events from `config.threads` concurrent producers.
///
/// Every producer shares the writer through an `Arc` and records
/// `events_per_thread` dial events with interleaved timestamps.
///
/// # Panics
///
/// Panics if a producer thread panics.
pub fn stress_concurrent_producers(
    writer: &Arc<TranscriptWriter>,
    config: &StressConfig,
) -> StressResult {
    let start = Instant::now();
    let mut handles = Vec::with_capacity(config.threads);

    for thread_id in 0..config.threads as u64 {
        let writer = Arc::clone(writer);
        let events = config.events_per_thread;
        handles.push(thread::spawn(move || {
            let mut recorded = 0u64;
            let mut failed = 0u64;
            for i in 0..events {
                let event = PeerDialed {
                    node: format!("node-{thread_id}"),
                    peer: format!("10.0.0.{}:9000", i % 256),
                };
                match writer.add(interleaved_timestamp(thread_id, i), &event) {
                    Ok(()) => recorded += 1,
                    Err(_) => failed += 1,
                }
            }
            (recorded, failed)
        }));
    }

    let mut recorded = 0u64;
    let mut failed = 0u64;
    for handle in handles {
        let (r, f) = handle.join().expect("producer thread panicked");
        recorded += r;
        failed += f;
    }

    StressResult::new(recorded, failed, start.elapsed())
}

/// Records a fixed volume sequentially, for spill-path measurements.
///
/// # Errors
///
/// Propagates the first recording failure.
pub fn stress_sequential_volume(writer: &TranscriptWriter, events: u64) -> StoreResult<StressResult> {
    let start = Instant::now();
    for i in 0..events {
        let event = PeerDialed {
            node: "node-0".into(),
            peer: format!("10.0.0.{}:9000", i % 256),
        };
        // Reverse timestamps so every chunk boundary needs sorting
        writer.add(micros((events - i) as i64), &event)?;
    }
    Ok(StressResult::new(events, 0, start.elapsed()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestTranscript;
    use transcript_core::{TranscriptReader, WriterConfig};

    #[test]
    fn concurrent_producers_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let writer = Arc::new(
            TranscriptWriter::with_config(
                dir.path().join("work"),
                WriterConfig::new().spill_threshold(500),
            )
            .unwrap(),
        );

        let config = StressConfig {
            threads: 4,
            events_per_thread: 2_000,
        };
        let result = stress_concurrent_producers(&writer, &config);
        assert_eq!(result.recorded, 8_000);
        assert_eq!(result.failed, 0);
        assert_eq!(writer.event_count(), 8_000);

        let output = dir.path().join("stress.transcript");
        writer.write(&output).unwrap();
        let reader = TranscriptReader::open(&output).unwrap();
        assert_eq!(reader.number_of_events(), 8_000);
    }

    #[test]
    fn sequential_volume_spills_and_finalizes() {
        let t = TestTranscript::with_config(WriterConfig::new().spill_threshold(100));
        let result = stress_sequential_volume(&t.writer, 1_000).unwrap();
        assert_eq!(result.recorded, 1_000);

        let reader = t.finalize_and_open().unwrap();
        assert_eq!(reader.number_of_events(), 1_000);
    }
}
