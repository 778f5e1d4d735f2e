// Path: crates/analysis/src/analyzer.rs

//! The round-driven analysis pipeline.
//!
//! One task consumes `PollingComplete` notifications, assembles the round's
//! statements, runs the criteria in declaration order, pushes every candidate
//! through the alert storage and vacuums once per round, in that order, so
//! alert emission is totally ordered within a round.

use crate::alerts_storage::{
    default_confirmations, AlertConfirmations, AlertsStorage, DEFAULT_BACKOFF,
    DEFAULT_VACUUM_QUOTA,
};
use crate::criteria::{self, Criterion, CriterionContext};
use crate::criteria::incomplete::IncompleteCriterionOptions;
use chainwatch_storage::EventsStorage;
use chainwatch_types::{Alert, InternalErrorAlert, NodeStatement, PollingComplete};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Tuning of the analysis pipeline.
#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    /// Base target value above which the fleet is considered slowed down.
    pub base_target_threshold: u64,
    /// Maximum tolerated height spread between fleet partitions.
    pub height_delta: u64,
    /// Backoff multiplier for persistent alerts.
    pub alert_backoff: u32,
    /// Rounds of silence before an alert identity is vacuumed.
    pub alert_vacuum_quota: i64,
    /// Per-type confirmation requirements.
    pub required_confirmations: AlertConfirmations,
    /// Tuning of the incomplete criterion.
    pub incomplete: IncompleteCriterionOptions,
}

impl AnalyzerOptions {
    /// Default options for the given (required) base target threshold.
    pub fn new(base_target_threshold: u64) -> Self {
        Self {
            base_target_threshold,
            height_delta: 1,
            alert_backoff: DEFAULT_BACKOFF,
            alert_vacuum_quota: DEFAULT_VACUUM_QUOTA,
            required_confirmations: default_confirmations(),
            incomplete: IncompleteCriterionOptions::default(),
        }
    }
}

/// The per-round analysis pipeline.
pub struct Analyzer {
    events: Arc<EventsStorage>,
    criteria: Vec<Criterion>,
    alerts: AlertsStorage,
}

impl Analyzer {
    /// Builds the pipeline with its criteria registered in emission order.
    pub fn new(events: Arc<EventsStorage>, options: AnalyzerOptions) -> Self {
        let alerts = AlertsStorage::new(
            options.alert_backoff,
            options.alert_vacuum_quota,
            options.required_confirmations.clone(),
        );

        let incomplete_options = options.incomplete.clone();
        let height_delta = options.height_delta;
        let base_target_threshold = options.base_target_threshold;
        let criteria = vec![
            Criterion::new("unreachable", criteria::unreachable::analyze),
            Criterion::new("incomplete", move |context, statements| {
                criteria::incomplete::analyze(context, statements, &incomplete_options)
            }),
            Criterion::new("invalid_height", criteria::invalid_height::analyze),
            Criterion::new("height", move |context, statements| {
                criteria::height::analyze(context, statements, height_delta)
            }),
            Criterion::new("state_hash", criteria::state_hash::analyze),
            Criterion::new("base_target", move |context, statements| {
                criteria::base_target::analyze(context, statements, base_target_threshold)
            }),
        ];

        Self {
            events,
            criteria,
            alerts,
        }
    }

    /// Spawns the pipeline task. It consumes round notifications until the
    /// input closes, then closes the returned alert stream.
    pub fn start(mut self, mut notifications: mpsc::Receiver<PollingComplete>) -> mpsc::Receiver<Alert> {
        let (sender, receiver) = mpsc::channel(64);
        tokio::spawn(async move {
            while let Some(notification) = notifications.recv().await {
                for alert in self.analyze(&notification) {
                    if sender.send(alert).await.is_err() {
                        return;
                    }
                }
            }
            tracing::info!(target = "analysis", "notification stream closed, analyzer stopping");
        });
        receiver
    }

    /// Runs one round: assemble, detect, de-duplicate, vacuum.
    pub fn analyze(&mut self, notification: &PollingComplete) -> Vec<Alert> {
        let ts = notification.ts;
        let statements = self.assemble(notification);
        let context = CriterionContext {
            ts,
            history: &self.events,
        };

        let mut candidates = Vec::new();
        for criterion in &self.criteria {
            match criterion.run(&context, &statements) {
                Ok(alerts) => candidates.extend(alerts),
                Err(error) => {
                    tracing::error!(
                        target = "analysis",
                        criterion = criterion.name(),
                        %error,
                        "criterion failed"
                    );
                    candidates.push(Alert::InternalError(InternalErrorAlert {
                        ts,
                        criterion: criterion.name().to_string(),
                        message: error.to_string(),
                    }));
                }
            }
        }

        let mut emitted = Vec::new();
        for alert in candidates {
            if self.alerts.put(&alert) {
                emitted.push(alert);
            }
        }
        for fixed in self.alerts.vacuum() {
            emitted.push(Alert::Fixed(Box::new(fixed)));
        }
        tracing::debug!(
            target = "analysis",
            ts,
            statements = statements.len(),
            emitted = emitted.len(),
            "round analyzed"
        );
        emitted
    }

    /// Folds the round's events into exactly one statement per polled URL.
    fn assemble(&self, notification: &PollingComplete) -> Vec<NodeStatement> {
        notification
            .urls
            .iter()
            .map(|url| {
                let events = self.events.events_at(url, notification.ts);
                NodeStatement::from_events(url, notification.ts, events.iter())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainwatch_types::NodeStatus;
    use std::time::Duration;

    #[test]
    fn test_assemble_is_total_over_the_url_set() {
        let events = Arc::new(EventsStorage::new(Duration::from_secs(3600)));
        let ts = crate::criteria::tests_now();
        events
            .put(chainwatch_types::Event::Unreachable {
                url: "https://n1.example.com".to_string(),
                ts,
            })
            .unwrap();

        let analyzer = Analyzer::new(Arc::clone(&events), AnalyzerOptions::new(200));
        let notification = PollingComplete::new(
            vec![
                "https://n1.example.com".to_string(),
                "https://n2.example.com".to_string(),
            ],
            ts,
        );
        let statements = analyzer.assemble(&notification);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].status, NodeStatus::Unreachable);
        // No events at all still folds into a statement.
        assert_eq!(statements[1].status, NodeStatus::Incomplete);
    }
}
