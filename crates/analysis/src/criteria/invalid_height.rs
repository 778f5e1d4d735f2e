// Path: crates/analysis/src/criteria/invalid_height.rs

//! Invalid-height reporting.

use super::CriterionContext;
use chainwatch_types::error::StorageError;
use chainwatch_types::{Alert, InvalidHeightAlert, NodeStatement, NodeStatus};

/// One alert per statement whose status is `InvalidHeight`.
pub fn analyze(
    _context: &CriterionContext<'_>,
    statements: &[NodeStatement],
) -> Result<Vec<Alert>, StorageError> {
    Ok(statements
        .iter()
        .filter(|s| s.status == NodeStatus::InvalidHeight)
        .map(|s| {
            Alert::InvalidHeight(InvalidHeightAlert {
                statement: s.clone(),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainwatch_storage::EventsStorage;
    use chainwatch_types::Event;
    use std::time::Duration;

    #[test]
    fn test_invalid_height_statement_raises() {
        let history = EventsStorage::new(Duration::from_secs(3600));
        let context = CriterionContext { ts: 1, history: &history };
        let events = [Event::InvalidHeight {
            url: "https://n1.example.com".to_string(),
            ts: 1,
            version: "1.4.7".to_string(),
            height: 1,
        }];
        let statements = vec![NodeStatement::from_events(
            "https://n1.example.com",
            1,
            &events,
        )];
        let alerts = analyze(&context, &statements).unwrap();
        assert_eq!(alerts.len(), 1);
        match &alerts[0] {
            Alert::InvalidHeight(a) => assert_eq!(a.statement.height, Some(1)),
            other => panic!("unexpected alert {other:?}"),
        }
    }
}
