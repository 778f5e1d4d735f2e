// Path: crates/telemetry/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # Chainwatch Telemetry
//!
//! Observability for the fleet monitor: structured logging initialization, a
//! small HTTP server exposing `/metrics`, `/healthz` and `/readyz`, and the
//! Prometheus counters the polling and analysis stages report into.

/// A lightweight HTTP server for the `/metrics`, `/healthz` and `/readyz` endpoints.
pub mod http;
/// The initialization routine for global structured logging.
pub mod init;
/// Prometheus counters for rounds, events and alerts.
pub mod metrics;

pub use init::init_tracing;
pub use metrics::{inc_alerts_sent, inc_events_collected, inc_rounds_completed};
