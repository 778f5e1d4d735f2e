// Path: crates/types/src/statements.rs

//! Per-round node statements and their fold rules.
//!
//! A statement is the canonical summary of one node's state for one round,
//! folded from all events the round produced for that node.

use crate::events::Event;
use serde::{Deserialize, Serialize};

/// Health classification of a node for one round. Serialized as the wire
/// integer: `OK=0, Incomplete=1, Unreachable=2, InvalidHeight=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum NodeStatus {
    /// The full probe sequence succeeded.
    Ok,
    /// Some probes succeeded but the sequence did not terminate in a state hash.
    Incomplete,
    /// The node did not answer.
    Unreachable,
    /// The node reported a height below the minimum meaningful value.
    InvalidHeight,
}

impl From<NodeStatus> for u8 {
    fn from(status: NodeStatus) -> u8 {
        match status {
            NodeStatus::Ok => 0,
            NodeStatus::Incomplete => 1,
            NodeStatus::Unreachable => 2,
            NodeStatus::InvalidHeight => 3,
        }
    }
}

impl TryFrom<u8> for NodeStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(NodeStatus::Ok),
            1 => Ok(NodeStatus::Incomplete),
            2 => Ok(NodeStatus::Unreachable),
            3 => Ok(NodeStatus::InvalidHeight),
            other => Err(format!("unknown node status {other}")),
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeStatus::Ok => "ok",
            NodeStatus::Incomplete => "incomplete",
            NodeStatus::Unreachable => "unreachable",
            NodeStatus::InvalidHeight => "invalid_height",
        };
        f.write_str(s)
    }
}

/// The latest coherent observation for a `(node, round)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatement {
    /// Node URL.
    pub node: String,
    /// Round timestamp, unix seconds.
    pub ts: i64,
    /// Health classification for the round.
    pub status: NodeStatus,
    /// Reported software version, when any probe got that far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Observed height, when any probe got that far. For `Ok` statements this
    /// is the height the state hash was taken at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    /// State hash at `height`, present only for `Ok` statements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_hash: Option<String>,
    /// Base target of the node's tip block, when observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_target: Option<u64>,
}

impl NodeStatement {
    /// Folds all events of one round for one node into a statement.
    ///
    /// The rule: an `Unreachable` observation dominates; then `InvalidHeight`;
    /// then a present `StateHash` makes the statement `Ok`; anything else is
    /// `Incomplete`, carrying whatever fields were observed. An empty event
    /// set folds to `Incomplete`, so the fold is total.
    pub fn from_events<'a, I>(node: &str, ts: i64, events: I) -> NodeStatement
    where
        I: IntoIterator<Item = &'a Event>,
    {
        let mut statement = NodeStatement {
            node: node.to_string(),
            ts,
            status: NodeStatus::Incomplete,
            version: None,
            height: None,
            state_hash: None,
            base_target: None,
        };
        let mut unreachable = false;
        let mut invalid_height = false;
        let mut complete = false;

        for event in events {
            match event {
                Event::Unreachable { .. } => unreachable = true,
                Event::Version { version, .. } => {
                    statement.version = Some(version.clone());
                }
                Event::Height {
                    version, height, ..
                } => {
                    statement.version = Some(version.clone());
                    statement.height = Some(*height);
                }
                Event::InvalidHeight {
                    version, height, ..
                } => {
                    invalid_height = true;
                    statement.version = Some(version.clone());
                    statement.height = Some(*height);
                }
                Event::BaseTarget {
                    version,
                    height,
                    base_target,
                    ..
                } => {
                    statement.version = Some(version.clone());
                    statement.height = Some(*height);
                    statement.base_target = Some(*base_target);
                }
                Event::StateHash {
                    version,
                    height,
                    state_hash,
                    base_target,
                    ..
                } => {
                    complete = true;
                    statement.version = Some(version.clone());
                    statement.height = Some(*height);
                    statement.state_hash = Some(state_hash.clone());
                    statement.base_target = Some(*base_target);
                }
            }
        }

        statement.status = if unreachable {
            NodeStatus::Unreachable
        } else if invalid_height {
            NodeStatus::InvalidHeight
        } else if complete {
            NodeStatus::Ok
        } else {
            NodeStatus::Incomplete
        };
        statement
    }
}
