// Path: crates/types/src/round.rs

//! Round-completion notifications emitted by the polling engine.

use serde::{Deserialize, Serialize};

/// The round fence. When this notification is delivered, every event of the
/// round identified by `ts` is already visible in the event store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingComplete {
    /// Round timestamp, unix seconds; identifies the round.
    pub ts: i64,
    /// URLs of the nodes polled in this round.
    pub urls: Vec<String>,
}

impl PollingComplete {
    /// Builds a notification for the round `ts` over `urls`.
    pub fn new(urls: Vec<String>, ts: i64) -> Self {
        Self { ts, urls }
    }

    /// Returns a copy whose URL set is extended with `extra`, preserving the
    /// round timestamp. Used by the private-node overlay.
    pub fn with_additional_urls(&self, extra: impl IntoIterator<Item = String>) -> Self {
        let mut urls = self.urls.clone();
        urls.extend(extra);
        Self { ts: self.ts, urls }
    }
}
