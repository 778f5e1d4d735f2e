// Path: crates/poller/src/lib.rs
#![forbid(unsafe_code)]

//! # Chainwatch Poller
//!
//! The round engine of the fleet monitor. On every tick the poller fans out
//! one probe task per enabled node, streams the resulting events through a
//! single collector into the event store, and only then publishes the round's
//! `PollingComplete`, the fence every downstream stage relies on.
//!
//! The private-node overlay rides on the same fence: observations pushed from
//! nodes the poller cannot reach are merged into the store under the round
//! timestamp before the notification is forwarded.

/// The round-based polling engine.
pub mod poller;
/// The private-node overlay.
pub mod private;

pub use poller::Poller;
pub use private::{ObservationsWriter, PrivateNodesHandler};
