// Path: crates/analysis/tests/scenarios.rs

//! End-to-end pipeline scenarios: events go into the store, rounds are
//! analyzed in sequence, and the emitted alert stream is asserted literally.

use chainwatch_analysis::{Analyzer, AnalyzerOptions};
use chainwatch_storage::EventsStorage;
use chainwatch_types::{Alert, AlertType, Event, PollingComplete};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

const A: &str = "https://a.example.com";
const B: &str = "https://b.example.com";
const C: &str = "https://c.example.com";

struct Fleet {
    events: Arc<EventsStorage>,
    analyzer: Analyzer,
    round: i64,
    base: i64,
}

impl Fleet {
    fn new(options: AnalyzerOptions) -> Self {
        let events = Arc::new(EventsStorage::new(Duration::from_secs(12 * 60 * 60)));
        let analyzer = Analyzer::new(Arc::clone(&events), options);
        let base = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        Self {
            events,
            analyzer,
            round: 0,
            base,
        }
    }

    fn ts(&self) -> i64 {
        self.base + self.round * 60
    }

    fn ok(&self, node: &str, height: u64, state_hash: &str, base_target: u64) {
        self.events
            .put(Event::StateHash {
                url: node.to_string(),
                ts: self.ts(),
                version: "1.4.7".to_string(),
                height,
                state_hash: state_hash.to_string(),
                base_target,
            })
            .unwrap();
    }

    fn unreachable(&self, node: &str) {
        self.events
            .put(Event::Unreachable {
                url: node.to_string(),
                ts: self.ts(),
            })
            .unwrap();
    }

    /// Closes the round over `urls` and returns what the pipeline emitted.
    fn complete(&mut self, urls: &[&str]) -> Vec<Alert> {
        let notification =
            PollingComplete::new(urls.iter().map(|u| u.to_string()).collect(), self.ts());
        let emitted = self.analyzer.analyze(&notification);
        self.round += 1;
        emitted
    }
}

fn healthy_round(fleet: &mut Fleet) -> Vec<Alert> {
    fleet.ok(A, 100, "aa", 120);
    fleet.ok(B, 100, "aa", 120);
    fleet.ok(C, 100, "aa", 120);
    fleet.complete(&[A, B, C])
}

/// S1: a healthy, agreeing fleet over two rounds emits nothing.
#[test]
fn test_s1_healthy_fleet_is_silent() {
    let mut fleet = Fleet::new(AnalyzerOptions::new(200));
    assert!(healthy_round(&mut fleet).is_empty());
    assert!(healthy_round(&mut fleet).is_empty());
}

/// S2: a height split beyond the delta needs two confirmations, then emits
/// exactly one alert with the group fingerprint.
#[test]
fn test_s2_height_divergence_confirms_then_emits() {
    let mut fleet = Fleet::new(AnalyzerOptions::new(200));

    let split = |fleet: &mut Fleet| {
        fleet.ok(A, 100, "aa", 120);
        fleet.ok(B, 100, "aa", 120);
        fleet.ok(C, 90, "cc", 120);
        fleet.complete(&[A, B, C])
    };

    let first = split(&mut fleet);
    assert!(first.is_empty(), "height alerts need two confirmations");

    let second = split(&mut fleet);
    assert_eq!(second.len(), 1);
    match &second[0] {
        Alert::Height(alert) => {
            assert_eq!(alert.groups.len(), 2);
            assert_eq!(alert.groups[0].height, 100);
            assert_eq!(alert.groups[0].nodes, vec![A.to_string(), B.to_string()]);
            assert_eq!(alert.groups[1].height, 90);
            assert_eq!(alert.groups[1].nodes, vec![C.to_string()]);
        }
        other => panic!("unexpected alert {other:?}"),
    }
}

/// S3: a node unreachable for three rounds trips the incomplete streak; once
/// it recovers, the stored identities are vacuumed and emitted as fixed.
#[test]
fn test_s3_incomplete_streak_then_fixed() {
    let mut fleet = Fleet::new(AnalyzerOptions::new(200));

    let degraded_round = |fleet: &mut Fleet| {
        fleet.ok(A, 100, "aa", 120);
        fleet.ok(B, 100, "aa", 120);
        fleet.unreachable(C);
        fleet.complete(&[A, B, C])
    };

    // Round 1: the unreachable alert confirms immediately, no streak yet.
    let round1 = degraded_round(&mut fleet);
    assert_eq!(round1.len(), 1);
    assert_eq!(round1[0].alert_type(), AlertType::Unreachable);

    // Round 2: held back (streak not reached, unreachable backing off).
    assert!(degraded_round(&mut fleet).is_empty());

    // Round 3: the incomplete streak of three trips; the unreachable alert
    // re-emits as its backoff window of two rounds is exceeded.
    let round3 = degraded_round(&mut fleet);
    let types: Vec<AlertType> = round3.iter().map(Alert::alert_type).collect();
    assert!(types.contains(&AlertType::Incomplete), "streak of 3 must alert");
    assert!(types.contains(&AlertType::Unreachable));
    let incomplete_count = types
        .iter()
        .filter(|t| **t == AlertType::Incomplete)
        .count();
    assert_eq!(incomplete_count, 1, "exactly one incomplete alert");

    // The node recovers; the stored identities age out after the vacuum
    // quota is exhausted and come back as fixed notifications.
    let mut fixed_rounds = Vec::new();
    for _ in 0..6 {
        let emitted = healthy_round(&mut fleet);
        let fixed: Vec<&Alert> = emitted
            .iter()
            .filter(|a| a.alert_type() == AlertType::Fixed)
            .collect();
        fixed_rounds.push(fixed.len());
        for alert in fixed {
            match alert {
                Alert::Fixed(inner) => {
                    let inner_type = inner.alert_type();
                    assert!(
                        inner_type == AlertType::Incomplete
                            || inner_type == AlertType::Unreachable,
                        "unexpected fixed inner type {inner_type:?}"
                    );
                }
                other => panic!("unexpected alert {other:?}"),
            }
        }
    }
    // Both identities were last put in round 3; the fifth vacuum pass after
    // that (during the fourth healthy round) deletes and fixes them together.
    assert_eq!(fixed_rounds, vec![0, 0, 0, 2, 0, 0]);
}

/// S4: the base target alert emits as soon as the modal value crosses the
/// threshold and re-emits per the backoff schedule while it persists.
#[test]
fn test_s4_base_target_threshold() {
    let mut fleet = Fleet::new(AnalyzerOptions::new(200));

    let mut emissions = Vec::new();
    for (round, mode) in [150u64, 150, 250, 250, 250].into_iter().enumerate() {
        fleet.ok(A, 100, "aa", mode);
        fleet.ok(B, 100, "aa", mode);
        fleet.ok(C, 100, "aa", mode);
        let emitted = fleet.complete(&[A, B, C]);
        if emitted
            .iter()
            .any(|a| a.alert_type() == AlertType::BaseTarget)
        {
            emissions.push(round + 1);
        }
    }
    // First emission at round 3; round 4 is held, round 5 exceeds the
    // backoff window of two repeats.
    assert_eq!(emissions, vec![3, 5]);
}

/// S5: a lone diverging state hash at the common height emits on the first
/// round with the default single confirmation.
#[test]
fn test_s5_state_hash_divergence_emits_first_round() {
    let mut fleet = Fleet::new(AnalyzerOptions::new(200));
    fleet.ok(A, 100, "aa", 120);
    fleet.ok(B, 100, "aa", 120);
    fleet.ok(C, 100, "zz", 120);
    let emitted = fleet.complete(&[A, B, C]);

    assert_eq!(emitted.len(), 1);
    match &emitted[0] {
        Alert::StateHash(alert) => {
            assert_eq!(alert.height, 100);
            assert_eq!(alert.groups.len(), 2);
        }
        other => panic!("unexpected alert {other:?}"),
    }
}

/// The pipeline task mirrors the synchronous behavior over channels and
/// closes its alert stream when the notification stream ends.
#[tokio::test]
async fn test_pipeline_over_channels() {
    let events = Arc::new(EventsStorage::new(Duration::from_secs(3600)));
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    events
        .put(Event::Unreachable {
            url: A.to_string(),
            ts,
        })
        .unwrap();

    let analyzer = Analyzer::new(Arc::clone(&events), AnalyzerOptions::new(200));
    let (notifications_tx, notifications_rx) = mpsc::channel(1);
    let mut alerts = analyzer.start(notifications_rx);

    notifications_tx
        .send(PollingComplete::new(vec![A.to_string()], ts))
        .await
        .unwrap();
    drop(notifications_tx);

    let mut received = Vec::new();
    while let Some(alert) = alerts.recv().await {
        received.push(alert);
    }
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].alert_type(), AlertType::Unreachable);
}
