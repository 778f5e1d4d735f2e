// Path: crates/analysis/src/criteria/base_target.rs

//! Base target threshold analysis.
//!
//! A rising base target means the chain is slowing down; a modal value above
//! the configured threshold (or a degenerate zero) is worth an alert carrying
//! every node's reading, so operators can tell a fleet-wide slowdown from a
//! single misreporting node.

use super::CriterionContext;
use chainwatch_types::error::StorageError;
use chainwatch_types::{Alert, BaseTargetAlert, BaseTargetValue, NodeStatement, NodeStatus};
use std::collections::HashMap;

/// Computes the modal base target across `Ok` statements (ties broken by
/// first-seen) and alerts when it exceeds `threshold` or collapses to zero.
pub fn analyze(
    context: &CriterionContext<'_>,
    statements: &[NodeStatement],
    threshold: u64,
) -> Result<Vec<Alert>, StorageError> {
    let mut values = Vec::new();
    for statement in statements {
        if statement.status != NodeStatus::Ok {
            continue;
        }
        if let Some(base_target) = statement.base_target {
            values.push(BaseTargetValue {
                node: statement.node.clone(),
                base_target,
            });
        }
    }
    let Some(mode) = modal_base_target(&values) else {
        return Ok(Vec::new());
    };
    if mode > threshold || mode == 0 {
        return Ok(vec![Alert::BaseTarget(BaseTargetAlert {
            ts: context.ts,
            threshold,
            values,
        })]);
    }
    Ok(Vec::new())
}

/// The most frequent base target; the first value to reach the winning count
/// wins ties.
fn modal_base_target(values: &[BaseTargetValue]) -> Option<u64> {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    let mut best: Option<(u64, usize)> = None;
    for value in values {
        let count = counts.entry(value.base_target).or_insert(0);
        *count += 1;
        match best {
            Some((_, best_count)) if *count <= best_count => {}
            _ => best = Some((value.base_target, *count)),
        }
    }
    best.map(|(mode, _)| mode)
}
