// Path: crates/types/src/events.rs

//! Observation events produced by node probes.
//!
//! Every event is a tagged observation about one node at one round timestamp.
//! The timestamp is assigned by the polling engine at the start of the round
//! and is identical for every event of that round; it is the canonical
//! ordering key throughout the event store and the analysis pipeline.

use serde::{Deserialize, Serialize};

/// The discriminant of an [`Event`] variant.
///
/// Used as part of the event store key, which makes `put` idempotent on
/// `(node, ts, kind)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The node did not answer a probe.
    Unreachable,
    /// The node reported its software version.
    Version,
    /// The node reported its current height.
    Height,
    /// The node reported a height below the minimum meaningful value.
    InvalidHeight,
    /// The node reported a state hash (terminal event of a fully successful probe).
    StateHash,
    /// The node reported the base target of its current block.
    BaseTarget,
}

impl EventKind {
    /// Stable numeric tag of the kind, used in store keys.
    pub fn tag(self) -> u8 {
        match self {
            EventKind::Unreachable => 1,
            EventKind::Version => 2,
            EventKind::Height => 3,
            EventKind::InvalidHeight => 4,
            EventKind::StateHash => 5,
            EventKind::BaseTarget => 6,
        }
    }
}

/// A tagged observation about one node at one round timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// The node did not answer, or a probe failed in transport.
    Unreachable {
        /// Node URL.
        url: String,
        /// Round timestamp, unix seconds.
        ts: i64,
    },
    /// The node answered the version probe.
    Version {
        /// Node URL.
        url: String,
        /// Round timestamp, unix seconds.
        ts: i64,
        /// Reported software version.
        version: String,
    },
    /// The node answered the height probe.
    Height {
        /// Node URL.
        url: String,
        /// Round timestamp, unix seconds.
        ts: i64,
        /// Reported software version.
        version: String,
        /// Reported chain height.
        height: u64,
    },
    /// The node reported a height below 2, which cannot be analyzed.
    InvalidHeight {
        /// Node URL.
        url: String,
        /// Round timestamp, unix seconds.
        ts: i64,
        /// Reported software version.
        version: String,
        /// The offending height.
        height: u64,
    },
    /// The node reported its state hash; terminal event of a successful probe.
    StateHash {
        /// Node URL.
        url: String,
        /// Round timestamp, unix seconds.
        ts: i64,
        /// Reported software version.
        version: String,
        /// Height the state hash was taken at (one below the reported tip).
        height: u64,
        /// The state hash at `height`.
        state_hash: String,
        /// Base target of the block at the reported tip.
        base_target: u64,
    },
    /// The node reported the base target of its current block.
    BaseTarget {
        /// Node URL.
        url: String,
        /// Round timestamp, unix seconds.
        ts: i64,
        /// Reported software version.
        version: String,
        /// Reported chain height.
        height: u64,
        /// Base target of the block at `height`.
        base_target: u64,
    },
}

impl Event {
    /// URL of the node this observation is about.
    pub fn node(&self) -> &str {
        match self {
            Event::Unreachable { url, .. }
            | Event::Version { url, .. }
            | Event::Height { url, .. }
            | Event::InvalidHeight { url, .. }
            | Event::StateHash { url, .. }
            | Event::BaseTarget { url, .. } => url,
        }
    }

    /// Round timestamp of the observation, unix seconds.
    pub fn ts(&self) -> i64 {
        match self {
            Event::Unreachable { ts, .. }
            | Event::Version { ts, .. }
            | Event::Height { ts, .. }
            | Event::InvalidHeight { ts, .. }
            | Event::StateHash { ts, .. }
            | Event::BaseTarget { ts, .. } => *ts,
        }
    }

    /// The variant discriminant.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Unreachable { .. } => EventKind::Unreachable,
            Event::Version { .. } => EventKind::Version,
            Event::Height { .. } => EventKind::Height,
            Event::InvalidHeight { .. } => EventKind::InvalidHeight,
            Event::StateHash { .. } => EventKind::StateHash,
            Event::BaseTarget { .. } => EventKind::BaseTarget,
        }
    }

    /// Whether this event terminates a probe sequence. Every probe ends in
    /// exactly one terminal event.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::Unreachable { .. } | Event::InvalidHeight { .. } | Event::StateHash { .. }
        )
    }

    /// Returns a copy of this event re-stamped with a different round
    /// timestamp. Used when merging externally supplied observations into
    /// the round they were delivered in.
    pub fn with_ts(&self, ts: i64) -> Event {
        let mut event = self.clone();
        match &mut event {
            Event::Unreachable { ts: t, .. }
            | Event::Version { ts: t, .. }
            | Event::Height { ts: t, .. }
            | Event::InvalidHeight { ts: t, .. }
            | Event::StateHash { ts: t, .. }
            | Event::BaseTarget { ts: t, .. } => *t = ts,
        }
        event
    }
}
