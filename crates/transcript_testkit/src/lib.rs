//! # Transcript Testkit
//!
//! Test utilities for the transcript telemetry store.
//!
//! This crate provides:
//! - Test fixtures: sample event types and temporary-transcript helpers
//! - Property-based test generators using proptest
//! - Stress harnesses for concurrent recording
//!
//! ## Usage
//!
//! ```rust,ignore
//! use transcript_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_transcript() {
//!     with_test_transcript(|t| {
//!         t.writer.add(micros(1), &event).unwrap();
//!         // ... finalize and replay
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
