//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random events, timestamps, and
//! header values for transcript round-trip properties.

use crate::fixtures::{BlockReceived, PeerDialed, PeerDropped};
use proptest::prelude::*;

/// Strategy for node names of the form `node-N`.
pub fn node_name_strategy() -> impl Strategy<Value = String> {
    (0u32..64).prop_map(|n| format!("node-{n}"))
}

/// Strategy for peer addresses.
pub fn peer_addr_strategy() -> impl Strategy<Value = String> {
    (0u8..=255u8, 1024u16..=u16::MAX).prop_map(|(host, port)| format!("10.0.0.{host}:{port}"))
}

/// Strategy for timestamps within a plausible test-run window,
/// expressed as microseconds since the epoch.
pub fn timestamp_micros_strategy() -> impl Strategy<Value = i64> {
    // Roughly the year 2024 plus up to an hour of run time
    1_700_000_000_000_000i64..1_700_000_003_600_000_000i64
}

/// Strategy for dial events.
pub fn peer_dialed_strategy() -> impl Strategy<Value = PeerDialed> {
    (node_name_strategy(), peer_addr_strategy())
        .prop_map(|(node, peer)| PeerDialed { node, peer })
}

/// Strategy for block receipt events.
pub fn block_received_strategy() -> impl Strategy<Value = BlockReceived> {
    (node_name_strategy(), 0u64..1_000_000, "[0-9a-f]{64}")
        .prop_map(|(node, height, hash)| BlockReceived { node, height, hash })
}

/// Strategy for peer drop events.
pub fn peer_dropped_strategy() -> impl Strategy<Value = PeerDropped> {
    (
        node_name_strategy(),
        peer_addr_strategy(),
        prop::sample::select(vec!["timeout", "handshake failure", "peer shutdown"]),
    )
        .prop_map(|(node, peer, reason)| PeerDropped {
            node,
            peer,
            reason: reason.to_owned(),
        })
}

/// Strategy for arbitrary header payload values.
pub fn header_value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}
