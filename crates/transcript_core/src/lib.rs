//! # Transcript Core
//!
//! Telemetry store for distributed-system test runs: record timestamped
//! events from many concurrent producers, then finalize them into a
//! single immutable, time-ordered transcript artifact for replay.
//!
//! This crate provides:
//! - [`TranscriptWriter`] - concurrent event recording with bounded
//!   memory (in-memory shards spill to sorted chunk files)
//! - [`TranscriptReader`] - ordered single-pass replay with per-type
//!   callback dispatch
//! - Named header blobs for run-level metadata (topology, seeds,
//!   configuration)
//!
//! Events are any `serde`-serializable type implementing
//! [`TranscriptEvent`], which assigns each type a stable tag used for
//! dispatch on replay.
//!
//! ## Example
//!
//! ```no_run
//! use chrono::Utc;
//! use serde::{Deserialize, Serialize};
//! use transcript_core::{TranscriptEvent, TranscriptReader, TranscriptWriter};
//!
//! #[derive(Serialize, Deserialize)]
//! struct PeerDialed {
//!     peer: String,
//! }
//!
//! impl TranscriptEvent for PeerDialed {
//!     const TYPE_TAG: &'static str = "net.peer_dialed";
//! }
//!
//! # fn main() -> Result<(), transcript_core::StoreError> {
//! let writer = TranscriptWriter::new("scratch/run-17")?;
//! writer.add_header("runId", &"run-17")?;
//! writer.add(Utc::now(), &PeerDialed { peer: "node-3".into() })?;
//! writer.write("run-17.transcript")?;
//!
//! let mut reader = TranscriptReader::open("run-17.transcript")?;
//! reader.on_event::<PeerDialed, _>(|ts, event| {
//!     println!("{ts} dialed {}", event.peer);
//! });
//! while reader.next()? {}
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod chunk;
mod config;
mod error;
mod event;
mod ingest;
mod merge;
mod reader;
mod record;
mod stream;
mod workdir;
mod writer;

pub use config::WriterConfig;
pub use error::{StoreError, StoreResult};
pub use event::TranscriptEvent;
pub use reader::TranscriptReader;
pub use writer::TranscriptWriter;
