// Path: crates/storage/src/events.rs

//! The time-indexed, retention-bounded event log.
//!
//! Logically the store is a mapping `(node, ts, kind) -> Event`, physically a
//! per-node ordered map keyed by `(ts, kind tag)`. Range scans by node with
//! descending timestamps are a first-class operation; the analysis criteria
//! walk history that way every round.

use chainwatch_types::error::StorageError;
use chainwatch_types::{Event, NodeStatement};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Key of one event within a node's log: round timestamp, then variant tag.
type EventKey = (i64, u8);

/// Append-only, time-bucketed store of per-node observations.
///
/// Retention is enforced opportunistically after every `put`: entries older
/// than the retention window are reclaimed no later than one round after they
/// age out.
pub struct EventsStorage {
    retention: Duration,
    inner: RwLock<HashMap<String, BTreeMap<EventKey, Event>>>,
}

impl EventsStorage {
    /// Creates an empty store with the given retention window.
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Appends an observation. Idempotent on `(node, ts, kind)`: a later put
    /// of the same key replaces the earlier event. A `put` that returns is
    /// durable to subsequent reads in this process.
    pub fn put(&self, event: Event) -> Result<(), StorageError> {
        let key = (event.ts(), event.kind().tag());
        let node = event.node().to_string();
        let mut inner = self.write_lock();
        inner.entry(node).or_default().insert(key, event);
        let cutoff = self.retention_cutoff();
        Self::vacuum_locked(&mut inner, cutoff);
        Ok(())
    }

    /// Returns the newest event for `node` by round timestamp, if any.
    pub fn latest(&self, node: &str) -> Option<Event> {
        let inner = self.read_lock();
        inner
            .get(node)
            .and_then(|log| log.values().next_back().cloned())
    }

    /// Enumerates `node`'s events newest-first. Stops early when `visit`
    /// returns `false`.
    pub fn scan_descending<F>(&self, node: &str, mut visit: F) -> Result<(), StorageError>
    where
        F: FnMut(&Event) -> bool,
    {
        let inner = self.read_lock();
        if let Some(log) = inner.get(node) {
            for event in log.values().rev() {
                if !visit(event) {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Enumerates `node`'s per-round statements newest-round-first, folding
    /// each round's events on the fly. Stops early when `visit` returns
    /// `false`.
    pub fn statements_descending<F>(&self, node: &str, mut visit: F) -> Result<(), StorageError>
    where
        F: FnMut(&NodeStatement) -> bool,
    {
        let inner = self.read_lock();
        let Some(log) = inner.get(node) else {
            return Ok(());
        };
        let mut round: Vec<&Event> = Vec::new();
        let mut round_ts: Option<i64> = None;
        for event in log.values().rev() {
            if round_ts != Some(event.ts()) {
                if let Some(ts) = round_ts {
                    let statement = NodeStatement::from_events(node, ts, round.iter().copied());
                    if !visit(&statement) {
                        return Ok(());
                    }
                }
                round.clear();
                round_ts = Some(event.ts());
            }
            round.push(event);
        }
        if let Some(ts) = round_ts {
            let statement = NodeStatement::from_events(node, ts, round.iter().copied());
            visit(&statement);
        }
        Ok(())
    }

    /// Returns all events recorded for `node` in the round `ts`.
    pub fn events_at(&self, node: &str, ts: i64) -> Vec<Event> {
        let inner = self.read_lock();
        inner
            .get(node)
            .map(|log| {
                log.range((ts, u8::MIN)..=(ts, u8::MAX))
                    .map(|(_, event)| event.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Folds every node's events for exactly the round `ts` into statements,
    /// ordered by node URL. Nodes without events in that round are absent.
    pub fn statements_at(&self, ts: i64) -> Vec<NodeStatement> {
        let inner = self.read_lock();
        let mut statements: Vec<NodeStatement> = inner
            .iter()
            .filter_map(|(node, log)| {
                let events: Vec<&Event> =
                    log.range((ts, u8::MIN)..=(ts, u8::MAX)).map(|(_, e)| e).collect();
                if events.is_empty() {
                    None
                } else {
                    Some(NodeStatement::from_events(node, ts, events))
                }
            })
            .collect();
        statements.sort_by(|a, b| a.node.cmp(&b.node));
        statements
    }

    /// Returns the newest statement of `node` observed at `height`, if any
    /// round within retention saw it.
    pub fn statement_at(&self, node: &str, height: u64) -> Result<Option<NodeStatement>, StorageError> {
        let mut found = None;
        self.statements_descending(node, |statement| {
            if statement.height == Some(height) {
                found = Some(statement.clone());
                false
            } else {
                true
            }
        })?;
        Ok(found)
    }

    /// Removes every entry with `ts < cutoff`. Returns the number of events
    /// reclaimed.
    pub fn vacuum(&self, cutoff: i64) -> usize {
        let mut inner = self.write_lock();
        Self::vacuum_locked(&mut inner, cutoff)
    }

    /// Total number of events currently held.
    pub fn len(&self) -> usize {
        self.read_lock().values().map(BTreeMap::len).sum()
    }

    /// Whether the store holds no events.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn retention_cutoff(&self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        now - self.retention.as_secs() as i64
    }

    fn vacuum_locked(inner: &mut HashMap<String, BTreeMap<EventKey, Event>>, cutoff: i64) -> usize {
        let mut removed = 0;
        inner.retain(|node, log| {
            let keep = log.split_off(&(cutoff, u8::MIN));
            if !log.is_empty() {
                tracing::debug!(
                    target = "storage",
                    node = node.as_str(),
                    reclaimed = log.len(),
                    "vacuumed aged-out events"
                );
            }
            removed += log.len();
            *log = keep;
            !log.is_empty()
        });
        removed
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, BTreeMap<EventKey, Event>>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, BTreeMap<EventKey, Event>>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainwatch_types::NodeStatus;

    const URL: &str = "https://n1.example.com";

    fn storage() -> EventsStorage {
        EventsStorage::new(Duration::from_secs(12 * 60 * 60))
    }

    fn version(ts: i64) -> Event {
        Event::Version {
            url: URL.to_string(),
            ts,
            version: "1.4.7".to_string(),
        }
    }

    fn height(ts: i64, h: u64) -> Event {
        Event::Height {
            url: URL.to_string(),
            ts,
            version: "1.4.7".to_string(),
            height: h,
        }
    }

    fn state_hash(ts: i64, h: u64, sh: &str) -> Event {
        Event::StateHash {
            url: URL.to_string(),
            ts,
            version: "1.4.7".to_string(),
            height: h,
            state_hash: sh.to_string(),
            base_target: 120,
        }
    }

    fn unreachable(ts: i64) -> Event {
        Event::Unreachable {
            url: URL.to_string(),
            ts,
        }
    }

    #[test]
    fn test_put_and_latest() {
        let es = storage();
        let now = now_ts();
        es.put(version(now - 60)).unwrap();
        es.put(version(now)).unwrap();
        let latest = es.latest(URL).unwrap();
        assert_eq!(latest.ts(), now);
        assert_eq!(es.latest("https://other.example.com"), None);
    }

    #[test]
    fn test_put_is_idempotent_per_key() {
        let es = storage();
        let now = now_ts();
        es.put(height(now, 100)).unwrap();
        es.put(height(now, 101)).unwrap();
        assert_eq!(es.len(), 1);
        match es.latest(URL).unwrap() {
            Event::Height { height, .. } => assert_eq!(height, 101),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_scan_descending_orders_and_stops() {
        let es = storage();
        let now = now_ts();
        for i in 0..5 {
            es.put(version(now - i * 60)).unwrap();
        }
        let mut seen = Vec::new();
        es.scan_descending(URL, |event| {
            seen.push(event.ts());
            seen.len() < 3
        })
        .unwrap();
        assert_eq!(seen, vec![now, now - 60, now - 120]);
    }

    #[test]
    fn test_statements_descending_folds_rounds() {
        let es = storage();
        let now = now_ts();
        // Older round: complete.
        es.put(version(now - 60)).unwrap();
        es.put(height(now - 60, 100)).unwrap();
        es.put(state_hash(now - 60, 99, "aa")).unwrap();
        // Newer round: unreachable.
        es.put(unreachable(now)).unwrap();

        let mut statuses = Vec::new();
        es.statements_descending(URL, |statement| {
            statuses.push((statement.ts, statement.status));
            true
        })
        .unwrap();
        assert_eq!(
            statuses,
            vec![(now, NodeStatus::Unreachable), (now - 60, NodeStatus::Ok)]
        );
    }

    #[test]
    fn test_statements_at_single_round() {
        let es = storage();
        let now = now_ts();
        es.put(version(now)).unwrap();
        es.put(height(now, 100)).unwrap();
        es.put(state_hash(now, 99, "aa")).unwrap();
        es.put(Event::Unreachable {
            url: "https://n2.example.com".to_string(),
            ts: now,
        })
        .unwrap();
        // A different round must not leak in.
        es.put(version(now - 60)).unwrap();

        let statements = es.statements_at(now);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].node, URL);
        assert_eq!(statements[0].status, NodeStatus::Ok);
        assert_eq!(statements[1].status, NodeStatus::Unreachable);
    }

    #[test]
    fn test_statement_at_height() {
        let es = storage();
        let now = now_ts();
        es.put(state_hash(now - 60, 99, "aa")).unwrap();
        es.put(state_hash(now, 100, "bb")).unwrap();

        let found = es.statement_at(URL, 99).unwrap().unwrap();
        assert_eq!(found.ts, now - 60);
        assert_eq!(found.state_hash.as_deref(), Some("aa"));
        assert!(es.statement_at(URL, 42).unwrap().is_none());
    }

    #[test]
    fn test_vacuum_reclaims_old_rounds() {
        let es = storage();
        let now = now_ts();
        es.put(version(now - 600)).unwrap();
        es.put(version(now)).unwrap();
        let removed = es.vacuum(now - 60);
        assert_eq!(removed, 1);
        assert_eq!(es.len(), 1);
        assert_eq!(es.latest(URL).unwrap().ts(), now);
    }

    #[test]
    fn test_retention_is_enforced_on_put() {
        let es = EventsStorage::new(Duration::from_secs(60));
        let now = now_ts();
        es.put(version(now - 3600)).unwrap();
        // The next put vacuums everything older than the window.
        es.put(version(now)).unwrap();
        assert_eq!(es.len(), 1);
    }

    fn now_ts() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }
}
