// Path: crates/analysis/src/criteria/mod.rs

//! Detection criteria over node statements and event history.
//!
//! A criterion is a pure function `(context, statements) -> alerts` modulo
//! reads of the event store. Criteria run sequentially in declaration order
//! within a round, so alert emission stays totally ordered.

use chainwatch_storage::EventsStorage;
use chainwatch_types::error::StorageError;
use chainwatch_types::{Alert, NodeStatement};

/// Base target threshold analysis.
pub mod base_target;
/// Height divergence analysis.
pub mod height;
/// Incomplete-statement streak analysis.
pub mod incomplete;
/// Invalid-height reporting.
pub mod invalid_height;
/// State hash divergence analysis.
pub mod state_hash;
/// Unreachable-node reporting.
pub mod unreachable;

/// What a criterion sees of the world: the round timestamp and the event
/// history.
pub struct CriterionContext<'a> {
    /// The round being analyzed.
    pub ts: i64,
    /// The event store, for criteria that need history.
    pub history: &'a EventsStorage,
}

type CriterionFn =
    dyn Fn(&CriterionContext<'_>, &[NodeStatement]) -> Result<Vec<Alert>, StorageError>
        + Send
        + Sync;

/// A named, registered detection routine.
pub struct Criterion {
    name: &'static str,
    check: Box<CriterionFn>,
}

impl Criterion {
    /// Registers a detection routine under a stable name.
    pub fn new<F>(name: &'static str, check: F) -> Self
    where
        F: Fn(&CriterionContext<'_>, &[NodeStatement]) -> Result<Vec<Alert>, StorageError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name,
            check: Box::new(check),
        }
    }

    /// The criterion's stable name, used to key internal-error alerts.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Runs the criterion over one round's statements.
    pub fn run(
        &self,
        context: &CriterionContext<'_>,
        statements: &[NodeStatement],
    ) -> Result<Vec<Alert>, StorageError> {
        (self.check)(context, statements)
    }
}

#[cfg(test)]
pub(crate) fn tests_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}
