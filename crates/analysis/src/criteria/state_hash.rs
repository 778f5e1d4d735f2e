// Path: crates/analysis/src/criteria/state_hash.rs

//! State hash divergence analysis.
//!
//! Height agreement is necessary but not sufficient: two nodes at the same
//! height can still disagree on state. The comparison happens at the maximum
//! common height, the highest height reported by at least two `Ok` nodes,
//! so the freshest comparable evidence wins.

use super::CriterionContext;
use chainwatch_types::error::StorageError;
use chainwatch_types::{Alert, NodeStatement, NodeStatus, StateHashAlert, StateHashGroup};
use std::collections::BTreeMap;

/// Partitions `Ok` statements at the maximum common height by state hash and
/// alerts when more than one partition is populated.
pub fn analyze(
    context: &CriterionContext<'_>,
    statements: &[NodeStatement],
) -> Result<Vec<Alert>, StorageError> {
    let mut by_height: BTreeMap<u64, Vec<&NodeStatement>> = BTreeMap::new();
    for statement in statements {
        if statement.status != NodeStatus::Ok {
            continue;
        }
        if let (Some(height), Some(_)) = (statement.height, statement.state_hash.as_ref()) {
            by_height.entry(height).or_default().push(statement);
        }
    }

    // The greatest height shared by at least two nodes; lower candidates are
    // stale by comparison.
    let Some((&height, contenders)) = by_height.iter().rev().find(|(_, s)| s.len() >= 2) else {
        return Ok(Vec::new());
    };

    let mut partitions: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for statement in contenders {
        if let Some(state_hash) = &statement.state_hash {
            partitions
                .entry(state_hash.clone())
                .or_default()
                .push(statement.node.clone());
        }
    }
    if partitions.len() < 2 {
        return Ok(Vec::new());
    }

    let groups: Vec<StateHashGroup> = partitions
        .into_iter()
        .map(|(state_hash, mut nodes)| {
            nodes.sort();
            StateHashGroup { state_hash, nodes }
        })
        .collect();
    Ok(vec![Alert::StateHash(StateHashAlert {
        ts: context.ts,
        height,
        groups,
    })])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainwatch_storage::EventsStorage;
    use std::time::Duration;

    fn ok_statement(node: &str, height: u64, state_hash: &str) -> NodeStatement {
        NodeStatement {
            node: node.to_string(),
            ts: 1,
            status: NodeStatus::Ok,
            version: Some("1.4.7".to_string()),
            height: Some(height),
            state_hash: Some(state_hash.to_string()),
            base_target: Some(120),
        }
    }

    fn run(statements: &[NodeStatement]) -> Vec<Alert> {
        let history = EventsStorage::new(Duration::from_secs(3600));
        let context = CriterionContext { ts: 1, history: &history };
        analyze(&context, statements).unwrap()
    }

    #[test]
    fn test_agreement_is_silent() {
        let statements = vec![
            ok_statement("a", 100, "aa"),
            ok_statement("b", 100, "aa"),
            ok_statement("c", 100, "aa"),
        ];
        assert!(run(&statements).is_empty());
    }

    #[test]
    fn test_disagreement_at_common_height_alerts() {
        let statements = vec![
            ok_statement("a", 100, "aa"),
            ok_statement("b", 100, "bb"),
            ok_statement("c", 100, "aa"),
        ];
        let alerts = run(&statements);
        assert_eq!(alerts.len(), 1);
        match &alerts[0] {
            Alert::StateHash(alert) => {
                assert_eq!(alert.height, 100);
                assert_eq!(alert.groups.len(), 2);
                assert_eq!(alert.groups[0].state_hash, "aa");
                assert_eq!(alert.groups[0].nodes, vec!["a".to_string(), "c".to_string()]);
                assert_eq!(alert.groups[1].nodes, vec!["b".to_string()]);
            }
            other => panic!("unexpected alert {other:?}"),
        }
    }

    #[test]
    fn test_greatest_common_height_wins() {
        // Heights 100 (two nodes, agreeing) and 99 (two nodes, disagreeing):
        // the comparison happens at 100 only, so no alert.
        let statements = vec![
            ok_statement("a", 100, "aa"),
            ok_statement("b", 100, "aa"),
            ok_statement("c", 99, "xx"),
            ok_statement("d", 99, "yy"),
        ];
        assert!(run(&statements).is_empty());
    }

    #[test]
    fn test_lone_heights_are_not_comparable() {
        let statements = vec![ok_statement("a", 100, "aa"), ok_statement("b", 99, "bb")];
        assert!(run(&statements).is_empty());
    }
}
