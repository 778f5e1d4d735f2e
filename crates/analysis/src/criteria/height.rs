// Path: crates/analysis/src/criteria/height.rs

//! Height divergence analysis.
//!
//! Nodes at slightly different heights are business as usual; a fleet split
//! into groups further apart than the configured delta is a fork or a stall.

use super::CriterionContext;
use chainwatch_types::error::StorageError;
use chainwatch_types::{Alert, HeightAlert, HeightGroup, NodeStatement, NodeStatus};
use std::collections::BTreeMap;

/// Partitions `Ok` statements by height and alerts when the spread between
/// the lowest and the highest group exceeds `delta`.
pub fn analyze(
    context: &CriterionContext<'_>,
    statements: &[NodeStatement],
    delta: u64,
) -> Result<Vec<Alert>, StorageError> {
    let mut partitions: BTreeMap<u64, Vec<String>> = BTreeMap::new();
    for statement in statements {
        if statement.status != NodeStatus::Ok {
            continue;
        }
        if let Some(height) = statement.height {
            partitions.entry(height).or_default().push(statement.node.clone());
        }
    }
    if partitions.len() < 2 {
        return Ok(Vec::new());
    }
    let lowest = *partitions.keys().next().unwrap_or(&0);
    let highest = *partitions.keys().next_back().unwrap_or(&0);
    if highest - lowest <= delta {
        return Ok(Vec::new());
    }

    let groups: Vec<HeightGroup> = partitions
        .into_iter()
        .rev()
        .map(|(height, mut nodes)| {
            nodes.sort();
            HeightGroup { height, nodes }
        })
        .collect();
    Ok(vec![Alert::Height(HeightAlert {
        ts: context.ts,
        groups,
    })])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainwatch_storage::EventsStorage;
    use std::time::Duration;

    fn ok_statement(node: &str, height: u64) -> NodeStatement {
        NodeStatement {
            node: node.to_string(),
            ts: 1,
            status: NodeStatus::Ok,
            version: Some("1.4.7".to_string()),
            height: Some(height),
            state_hash: Some("aa".to_string()),
            base_target: Some(120),
        }
    }

    fn run(statements: &[NodeStatement], delta: u64) -> Vec<Alert> {
        let history = EventsStorage::new(Duration::from_secs(3600));
        let context = CriterionContext { ts: 1, history: &history };
        analyze(&context, statements, delta).unwrap()
    }

    #[test]
    fn test_uniform_fleet_is_silent() {
        let statements = vec![
            ok_statement("a", 100),
            ok_statement("b", 100),
            ok_statement("c", 100),
        ];
        assert!(run(&statements, 1).is_empty());
    }

    #[test]
    fn test_spread_within_delta_is_silent() {
        let statements = vec![ok_statement("a", 100), ok_statement("b", 99)];
        assert!(run(&statements, 1).is_empty());
    }

    #[test]
    fn test_divergence_alerts_with_sorted_groups() {
        let statements = vec![
            ok_statement("b", 100),
            ok_statement("c", 90),
            ok_statement("a", 100),
        ];
        let alerts = run(&statements, 1);
        assert_eq!(alerts.len(), 1);
        match &alerts[0] {
            Alert::Height(alert) => {
                assert_eq!(alert.groups.len(), 2);
                assert_eq!(alert.groups[0].height, 100);
                assert_eq!(alert.groups[0].nodes, vec!["a".to_string(), "b".to_string()]);
                assert_eq!(alert.groups[1].height, 90);
            }
            other => panic!("unexpected alert {other:?}"),
        }
    }

    #[test]
    fn test_non_ok_statements_are_ignored() {
        let mut unreachable = ok_statement("c", 90);
        unreachable.status = NodeStatus::Unreachable;
        let statements = vec![ok_statement("a", 100), ok_statement("b", 100), unreachable];
        assert!(run(&statements, 1).is_empty());
    }
}
