// Path: crates/analysis/src/criteria/incomplete.rs

//! Incomplete-statement streak analysis.
//!
//! A node that answered partially once is noise; a node that has not produced
//! a complete statement for several consecutive rounds is a problem. This
//! criterion walks the node's statement history newest-first and alerts once
//! the trailing run of incomplete-ish rounds reaches the configured streak.

use super::CriterionContext;
use chainwatch_types::error::StorageError;
use chainwatch_types::{Alert, IncompleteAlert, NodeStatement, NodeStatus};

/// Tuning of the incomplete criterion.
#[derive(Debug, Clone)]
pub struct IncompleteCriterionOptions {
    /// Trailing run length that triggers the alert.
    pub streak: usize,
    /// Maximum number of historic rounds inspected per node.
    pub depth: usize,
    /// Whether an `Unreachable` round counts toward the streak.
    pub consider_unreachable_as_incomplete: bool,
}

impl Default for IncompleteCriterionOptions {
    fn default() -> Self {
        Self {
            streak: 3,
            depth: 5,
            consider_unreachable_as_incomplete: true,
        }
    }
}

/// Emits an alert for every node whose current status is incomplete-ish and
/// whose trailing streak of such rounds reaches `options.streak`.
pub fn analyze(
    context: &CriterionContext<'_>,
    statements: &[NodeStatement],
    options: &IncompleteCriterionOptions,
) -> Result<Vec<Alert>, StorageError> {
    let mut alerts = Vec::new();
    for statement in statements {
        if !counts(statement.status, options) {
            continue;
        }
        if streak_reached(context, &statement.node, options)? {
            alerts.push(Alert::Incomplete(IncompleteAlert {
                statement: statement.clone(),
            }));
        }
    }
    Ok(alerts)
}

fn counts(status: NodeStatus, options: &IncompleteCriterionOptions) -> bool {
    status == NodeStatus::Incomplete
        || (options.consider_unreachable_as_incomplete && status == NodeStatus::Unreachable)
}

fn streak_reached(
    context: &CriterionContext<'_>,
    node: &str,
    options: &IncompleteCriterionOptions,
) -> Result<bool, StorageError> {
    let mut streak = 0usize;
    let mut depth = 0usize;
    context.history.statements_descending(node, |statement| {
        if counts(statement.status, options) {
            streak += 1;
        } else {
            streak = 0;
        }
        depth += 1;
        streak < options.streak && depth < options.depth
    })?;
    Ok(streak >= options.streak)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainwatch_storage::EventsStorage;
    use chainwatch_types::Event;
    use std::time::Duration;

    const URL: &str = "https://n1.example.com";

    fn unreachable_round(history: &EventsStorage, ts: i64) {
        history
            .put(Event::Unreachable {
                url: URL.to_string(),
                ts,
            })
            .unwrap();
    }

    fn complete_round(history: &EventsStorage, ts: i64) {
        history
            .put(Event::StateHash {
                url: URL.to_string(),
                ts,
                version: "1.4.7".to_string(),
                height: 99,
                state_hash: "aa".to_string(),
                base_target: 120,
            })
            .unwrap();
    }

    fn current_statement(history: &EventsStorage, ts: i64) -> Vec<NodeStatement> {
        history.statements_at(ts)
    }

    #[test]
    fn test_streak_of_three_raises() {
        let history = EventsStorage::new(Duration::from_secs(3600));
        let base = super::super::tests_now();
        complete_round(&history, base - 180);
        unreachable_round(&history, base - 120);
        unreachable_round(&history, base - 60);
        unreachable_round(&history, base);

        let context = CriterionContext { ts: base, history: &history };
        let statements = current_statement(&history, base);
        let alerts = analyze(&context, &statements, &IncompleteCriterionOptions::default()).unwrap();
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn test_interrupted_streak_stays_silent() {
        let history = EventsStorage::new(Duration::from_secs(3600));
        let base = super::super::tests_now();
        unreachable_round(&history, base - 180);
        unreachable_round(&history, base - 120);
        complete_round(&history, base - 60);
        unreachable_round(&history, base);

        let context = CriterionContext { ts: base, history: &history };
        let statements = current_statement(&history, base);
        let alerts = analyze(&context, &statements, &IncompleteCriterionOptions::default()).unwrap();
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_unreachable_does_not_count_when_flag_is_off() {
        let history = EventsStorage::new(Duration::from_secs(3600));
        let base = super::super::tests_now();
        unreachable_round(&history, base - 120);
        unreachable_round(&history, base - 60);
        unreachable_round(&history, base);

        let context = CriterionContext { ts: base, history: &history };
        let statements = current_statement(&history, base);
        let options = IncompleteCriterionOptions {
            consider_unreachable_as_incomplete: false,
            ..IncompleteCriterionOptions::default()
        };
        let alerts = analyze(&context, &statements, &options).unwrap();
        assert!(alerts.is_empty());
    }
}
