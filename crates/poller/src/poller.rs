// Path: crates/poller/src/poller.rs

//! The round-based polling engine.

use chainwatch_client::NodeClient;
use chainwatch_storage::{EventsStorage, NodesStorage};
use chainwatch_types::{Event, PollingComplete};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

/// Periodically probes every enabled node and publishes one
/// [`PollingComplete`] per finished round.
///
/// Rounds never overlap: ticks that fire while a round is still running are
/// dropped. The notifications channel has capacity one, so a slow consumer
/// stalls the engine rather than letting analysis fall behind.
pub struct Poller {
    nodes: Arc<NodesStorage>,
    events: Arc<EventsStorage>,
    interval: Duration,
    timeout: Duration,
}

impl Poller {
    /// Creates an engine polling every `interval` with a per-request
    /// `timeout`.
    pub fn new(
        nodes: Arc<NodesStorage>,
        events: Arc<EventsStorage>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            nodes,
            events,
            interval,
            timeout,
        }
    }

    /// Spawns the tick loop. The loop stops when `shutdown` flips or the
    /// returned receiver is dropped; a round aborted by shutdown emits no
    /// notification.
    pub fn start(self, shutdown: watch::Receiver<bool>) -> mpsc::Receiver<PollingComplete> {
        let (notifications, receiver) = mpsc::channel(1);
        tokio::spawn(self.run(notifications, shutdown));
        receiver
    }

    async fn run(
        self,
        notifications: mpsc::Sender<PollingComplete>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let ts = unix_now();
                    let round = tokio::select! {
                        round = self.poll_round(ts) => round,
                        _ = shutdown.changed() => {
                            tracing::info!(target = "poller", ts, "round aborted by shutdown");
                            return;
                        }
                    };
                    if notifications.send(round).await.is_err() {
                        return;
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!(target = "poller", "polling stopped");
                    return;
                }
            }
        }
    }

    /// Runs one round: fans out probes, funnels every event through a single
    /// writer into the store, and returns the round notification only after
    /// the writer has drained. That ordering is the fence guarantee.
    async fn poll_round(&self, ts: i64) -> PollingComplete {
        let enabled = self.nodes.enabled();
        let urls: Vec<String> = enabled.into_iter().map(|n| n.url).collect();

        let (event_sink, mut event_source) = mpsc::channel::<Event>(64);
        let store = Arc::clone(&self.events);
        let collector = tokio::spawn(async move {
            let mut collected = 0usize;
            while let Some(event) = event_source.recv().await {
                if let Err(error) = store.put(event) {
                    tracing::warn!(target = "poller", %error, "failed to store event");
                }
                collected += 1;
            }
            collected
        });

        let mut probes = JoinSet::new();
        for url in &urls {
            let url = url.clone();
            let sink = event_sink.clone();
            let timeout = self.timeout;
            probes.spawn(async move {
                probe_node(&url, ts, timeout, sink).await;
            });
        }
        drop(event_sink);

        while probes.join_next().await.is_some() {}
        let collected = collector.await.unwrap_or(0);
        chainwatch_telemetry::inc_rounds_completed();
        chainwatch_telemetry::inc_events_collected(collected as u64);
        tracing::info!(
            target = "poller",
            ts,
            nodes = urls.len(),
            events = collected,
            "polling round completed"
        );
        PollingComplete::new(urls, ts)
    }
}

/// Probes one node. The sequence is version → height → base target → state
/// hash (at one below the tip); a failure at any step short-circuits the
/// sequence, and every sequence terminates in exactly one of `StateHash`,
/// `Unreachable` or `InvalidHeight`.
async fn probe_node(url: &str, ts: i64, timeout: Duration, sink: mpsc::Sender<Event>) {
    let unreachable = Event::Unreachable {
        url: url.to_string(),
        ts,
    };
    let client = match NodeClient::new(url, timeout) {
        Ok(client) => client,
        Err(error) => {
            tracing::debug!(target = "poller", url, %error, "failed to build probe client");
            let _ = sink.send(unreachable).await;
            return;
        }
    };

    let version = match client.version().await {
        Ok(version) => version,
        Err(error) => {
            tracing::debug!(target = "poller", url, %error, "version probe failed");
            let _ = sink.send(unreachable).await;
            return;
        }
    };
    let _ = sink
        .send(Event::Version {
            url: url.to_string(),
            ts,
            version: version.clone(),
        })
        .await;

    let height = match client.height().await {
        Ok(height) => height,
        Err(error) => {
            tracing::debug!(target = "poller", url, %error, "height probe failed");
            let _ = sink.send(unreachable).await;
            return;
        }
    };
    if height < 2 {
        let _ = sink
            .send(Event::InvalidHeight {
                url: url.to_string(),
                ts,
                version,
                height,
            })
            .await;
        return;
    }
    let _ = sink
        .send(Event::Height {
            url: url.to_string(),
            ts,
            version: version.clone(),
            height,
        })
        .await;

    let base_target = match client.base_target(height).await {
        Ok(base_target) => base_target,
        Err(error) => {
            tracing::debug!(target = "poller", url, %error, "base target probe failed");
            let _ = sink.send(unreachable).await;
            return;
        }
    };
    let _ = sink
        .send(Event::BaseTarget {
            url: url.to_string(),
            ts,
            version: version.clone(),
            height,
            base_target,
        })
        .await;

    // The state hash is requested one height below the tip, where the chain
    // has settled.
    let state_height = height - 1;
    let state_hash = match client.state_hash(state_height).await {
        Ok(state_hash) => state_hash,
        Err(error) => {
            tracing::debug!(target = "poller", url, %error, "state hash probe failed");
            let _ = sink.send(unreachable).await;
            return;
        }
    };
    let _ = sink
        .send(Event::StateHash {
            url: url.to_string(),
            ts,
            version,
            height: state_height,
            state_hash,
            base_target,
        })
        .await;
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
