// Path: crates/poller/src/private.rs

//! The private-node overlay.
//!
//! Some nodes cannot be probed directly and push their observations
//! out-of-band instead. The overlay buffers those observations per URL and,
//! on every round boundary, re-stamps them with the round timestamp and
//! merges them into the event store before forwarding an augmented
//! `PollingComplete`. A private node that stayed silent for a whole round is
//! reported unreachable, so silence is indistinguishable from failure
//! downstream.

use crate::poller::unix_now;
use chainwatch_storage::{EventsStorage, NodesStorage};
use chainwatch_types::{Event, PollingComplete};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

type ObservationsBuffer = Arc<Mutex<HashMap<String, Vec<Event>>>>;

/// Handle for pushing out-of-band observations into the overlay. Cheap to
/// clone; writers never block on the round pipeline.
#[derive(Clone)]
pub struct ObservationsWriter {
    buffer: ObservationsBuffer,
}

impl ObservationsWriter {
    /// Buffers an observation until the next round boundary.
    pub fn write(&self, event: Event) {
        let mut buffer = self.buffer.lock().unwrap_or_else(|p| p.into_inner());
        buffer.entry(event.node().to_string()).or_default().push(event);
    }
}

/// Merges buffered private-node observations into each polling round.
pub struct PrivateNodesHandler {
    nodes: Arc<NodesStorage>,
    events: Arc<EventsStorage>,
    buffer: ObservationsBuffer,
}

impl PrivateNodesHandler {
    /// Creates the overlay and seeds an `Unreachable` observation for every
    /// known private node, so a node that never reports is visible from the
    /// first round onward.
    pub fn with_unreachable_initial_state(
        events: Arc<EventsStorage>,
        nodes: Arc<NodesStorage>,
    ) -> Result<Self, chainwatch_types::error::StorageError> {
        let handler = Self {
            nodes,
            events,
            buffer: Arc::new(Mutex::new(HashMap::new())),
        };
        let ts = unix_now();
        for node in handler.nodes.specific() {
            handler.events.put(Event::Unreachable { url: node.url, ts })?;
        }
        Ok(handler)
    }

    /// Returns a writer handle for out-of-band observation producers.
    pub fn writer(&self) -> ObservationsWriter {
        ObservationsWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }

    /// Wraps the polling notifications stream: every incoming round is
    /// augmented with the private-node URLs after their buffered
    /// observations are merged into the store under the round timestamp.
    pub fn run(self, mut input: mpsc::Receiver<PollingComplete>) -> mpsc::Receiver<PollingComplete> {
        let (sender, receiver) = mpsc::channel(1);
        tokio::spawn(async move {
            while let Some(notification) = input.recv().await {
                let augmented = self.merge(notification);
                if sender.send(augmented).await.is_err() {
                    return;
                }
            }
        });
        receiver
    }

    fn merge(&self, notification: PollingComplete) -> PollingComplete {
        let ts = notification.ts;
        let mut drained: HashMap<String, Vec<Event>> = {
            let mut buffer = self.buffer.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::take(&mut *buffer)
        };

        let mut private_urls = Vec::new();
        for node in self.nodes.specific() {
            let observations = drained.remove(&node.url).unwrap_or_default();
            if observations.is_empty() {
                // Silent since the previous round.
                self.store(Event::Unreachable {
                    url: node.url.clone(),
                    ts,
                });
            } else {
                for observation in observations {
                    self.store(observation.with_ts(ts));
                }
            }
            private_urls.push(node.url);
        }

        for url in drained.keys() {
            tracing::warn!(
                target = "poller",
                url = url.as_str(),
                "dropping observations for an unregistered private node"
            );
        }

        notification.with_additional_urls(private_urls)
    }

    fn store(&self, event: Event) {
        if let Err(error) = self.events.put(event) {
            tracing::warn!(target = "poller", %error, "failed to store private observation");
        }
    }
}
