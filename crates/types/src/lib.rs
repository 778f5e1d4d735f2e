// Path: crates/types/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Chainwatch Types
//!
//! This crate is the foundational library for the Chainwatch fleet monitor,
//! containing all core data structures shared across the workspace.
//!
//! ## Architectural Role
//!
//! As the base crate, `chainwatch-types` has minimal dependencies and is itself
//! a dependency for almost every other crate in the workspace. This structure
//! prevents circular dependencies and provides a stable, canonical definition
//! for shared types like `Event`, `NodeStatement` and `Alert`, and the error
//! enums every layer reports through.

/// A top-level, crate-wide `Result` type alias with a default error type.
pub type Result<T, E = crate::error::InternalError> = std::result::Result<T, E>;

/// Alert variants, alert types and semantic alert identity.
pub mod alerts;
/// A unified set of all error types used across the workspace.
pub mod error;
/// Observation events produced by node probes.
pub mod events;
/// Monitored node records.
pub mod node;
/// Round-completion notifications emitted by the polling engine.
pub mod round;
/// Per-round node statements and their fold rules.
pub mod statements;

pub use alerts::{
    Alert, AlertType, BaseTargetAlert, BaseTargetValue, HeightAlert, HeightGroup,
    IncompleteAlert, InternalErrorAlert, InvalidHeightAlert, StateHashAlert, StateHashGroup,
    UnreachableAlert,
};
pub use events::{Event, EventKind};
pub use node::Node;
pub use round::PollingComplete;
pub use statements::{NodeStatement, NodeStatus};
