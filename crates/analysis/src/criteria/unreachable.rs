// Path: crates/analysis/src/criteria/unreachable.rs

//! Unreachable-node reporting.

use super::CriterionContext;
use chainwatch_types::error::StorageError;
use chainwatch_types::{Alert, NodeStatement, NodeStatus, UnreachableAlert};

/// One alert per statement whose status is `Unreachable`.
pub fn analyze(
    context: &CriterionContext<'_>,
    statements: &[NodeStatement],
) -> Result<Vec<Alert>, StorageError> {
    Ok(statements
        .iter()
        .filter(|s| s.status == NodeStatus::Unreachable)
        .map(|s| {
            Alert::Unreachable(UnreachableAlert {
                ts: context.ts,
                node: s.node.clone(),
            })
        })
        .collect())
}
