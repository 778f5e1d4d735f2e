// Path: crates/types/src/error/mod.rs
//! Core error types for the Chainwatch fleet monitor.

use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors produced by a single HTTP probe against a node.
///
/// Probes never retry; the polling engine maps every probe failure to an
/// `Unreachable` observation, so these kinds exist for logging and tests
/// rather than for propagation.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The request failed below HTTP (connect, DNS, TLS, broken transfer).
    #[error("Transport error: {0}")]
    Transport(String),
    /// The node answered with a non-2xx status.
    #[error("Unexpected status code {code}")]
    Status {
        /// The HTTP status code received.
        code: u16,
    },
    /// The response body did not decode into the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),
    /// The per-request deadline elapsed.
    #[error("Request timed out")]
    Timeout,
}

impl ErrorCode for ProbeError {
    fn code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "PROBE_TRANSPORT",
            Self::Status { .. } => "PROBE_BAD_STATUS",
            Self::Decode(_) => "PROBE_DECODE",
            Self::Timeout => "PROBE_TIMEOUT",
        }
    }
}

/// Errors produced by the event store and the node registry.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The referenced node is not registered.
    #[error("Node {0} is not registered")]
    NotFound(String),
    /// The supplied value cannot be stored (e.g. a malformed URL).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The operation conflicts with existing state.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The persistence backend failed.
    #[error("Storage I/O error: {0}")]
    Io(String),
    /// Persisted state failed to encode or decode.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ErrorCode for StorageError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "STORAGE_NOT_FOUND",
            Self::InvalidArgument(_) => "STORAGE_INVALID_ARGUMENT",
            Self::Conflict(_) => "STORAGE_CONFLICT",
            Self::Io(_) => "STORAGE_IO",
            Self::Serialization(_) => "STORAGE_SERIALIZATION",
        }
    }
}

/// Errors produced by the message bus and the pair request/response channel.
#[derive(Error, Debug)]
pub enum MessagingError {
    /// An outbound message could not be encoded.
    #[error("Frame encode error: {0}")]
    Encode(String),
    /// An inbound frame could not be decoded.
    #[error("Frame decode error: {0}")]
    Decode(String),
    /// An inbound frame carried an unknown request tag.
    #[error("Unknown request tag {0}")]
    UnknownRequest(u8),
    /// A request missed its reply deadline.
    #[error("Request deadline elapsed")]
    Deadline,
    /// The peer or a pipeline stage went away.
    #[error("Channel closed")]
    ChannelClosed,
}

impl ErrorCode for MessagingError {
    fn code(&self) -> &'static str {
        match self {
            Self::Encode(_) => "MSG_ENCODE",
            Self::Decode(_) => "MSG_DECODE",
            Self::UnknownRequest(_) => "MSG_UNKNOWN_REQUEST",
            Self::Deadline => "MSG_DEADLINE",
            Self::ChannelClosed => "MSG_CHANNEL_CLOSED",
        }
    }
}

/// Catch-all error for failures that cross subsystem boundaries.
#[derive(Error, Debug)]
pub enum InternalError {
    /// A storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// A probe failure.
    #[error(transparent)]
    Probe(#[from] ProbeError),
    /// A messaging failure.
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    /// The surrounding task was cancelled.
    #[error("Cancelled")]
    Cancelled,
    /// Anything else.
    #[error("Internal error: {0}")]
    Other(String),
}

impl ErrorCode for InternalError {
    fn code(&self) -> &'static str {
        match self {
            Self::Storage(e) => e.code(),
            Self::Probe(e) => e.code(),
            Self::Messaging(e) => e.code(),
            Self::Cancelled => "CANCELLED",
            Self::Other(_) => "INTERNAL",
        }
    }
}
