// Path: crates/types/src/alerts.rs

//! Alert variants, alert types and semantic alert identity.
//!
//! An alert's [`Alert::id`] is deterministic in its semantic identity (the
//! node set, heights, hash buckets) and never in its timestamp. The analysis
//! pipeline's confirmation counting and backoff both key on this identity, so
//! the same condition observed in consecutive rounds must produce the same id.

use crate::statements::NodeStatement;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The classification of an alert, used for the bus topic byte and for the
/// per-type confirmation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// A node did not answer its probes.
    Unreachable,
    /// A node has not produced a complete statement for several rounds.
    Incomplete,
    /// A node reported a meaningless height.
    InvalidHeight,
    /// The fleet diverged in height.
    Height,
    /// The fleet disagrees on a state hash at a common height.
    StateHash,
    /// The modal base target crossed the configured threshold.
    BaseTarget,
    /// A previously confirmed alert stopped recurring.
    Fixed,
    /// A detection criterion itself failed.
    InternalError,
}

impl AlertType {
    /// All alert types; useful for subscribing to every bus topic.
    pub const ALL: [AlertType; 8] = [
        AlertType::Unreachable,
        AlertType::Incomplete,
        AlertType::InvalidHeight,
        AlertType::Height,
        AlertType::StateHash,
        AlertType::BaseTarget,
        AlertType::Fixed,
        AlertType::InternalError,
    ];

    /// Stable topic byte of this alert type on the message bus.
    pub fn tag(self) -> u8 {
        match self {
            AlertType::Unreachable => 1,
            AlertType::Incomplete => 2,
            AlertType::InvalidHeight => 3,
            AlertType::Height => 4,
            AlertType::StateHash => 5,
            AlertType::BaseTarget => 6,
            AlertType::Fixed => 7,
            AlertType::InternalError => 8,
        }
    }

    /// Resolves a bus topic byte back to the alert type.
    pub fn from_tag(tag: u8) -> Option<AlertType> {
        AlertType::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// Stable lower-case name of the type, for logs and metric labels.
    pub fn name(self) -> &'static str {
        match self {
            AlertType::Unreachable => "unreachable",
            AlertType::Incomplete => "incomplete",
            AlertType::InvalidHeight => "invalid_height",
            AlertType::Height => "height",
            AlertType::StateHash => "state_hash",
            AlertType::BaseTarget => "base_target",
            AlertType::Fixed => "fixed",
            AlertType::InternalError => "internal_error",
        }
    }
}

/// Payload of an [`Alert::Unreachable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreachableAlert {
    /// Round timestamp, unix seconds.
    pub ts: i64,
    /// URL of the unreachable node.
    pub node: String,
}

/// Payload of an [`Alert::Incomplete`]; carries the statement that closed the
/// incomplete streak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompleteAlert {
    /// The offending node's statement for the current round.
    pub statement: NodeStatement,
}

/// Payload of an [`Alert::InvalidHeight`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidHeightAlert {
    /// The offending node's statement for the current round.
    pub statement: NodeStatement,
}

/// One height partition of the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightGroup {
    /// The common height of this partition.
    pub height: u64,
    /// URLs at that height, sorted.
    pub nodes: Vec<String>,
}

/// Payload of an [`Alert::Height`]: the fleet split into height groups whose
/// spread exceeds the configured delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightAlert {
    /// Round timestamp, unix seconds.
    pub ts: i64,
    /// The height partitions, sorted by height descending.
    pub groups: Vec<HeightGroup>,
}

/// One state-hash partition of the fleet at the alert's height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateHashGroup {
    /// The state hash shared by this partition.
    pub state_hash: String,
    /// URLs reporting that hash, sorted.
    pub nodes: Vec<String>,
}

/// Payload of an [`Alert::StateHash`]: disagreement at the maximum common
/// height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateHashAlert {
    /// Round timestamp, unix seconds.
    pub ts: i64,
    /// The height the disagreement was observed at.
    pub height: u64,
    /// The state-hash partitions, sorted by hash.
    pub groups: Vec<StateHashGroup>,
}

/// One node's base target observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseTargetValue {
    /// Node URL.
    pub node: String,
    /// The node's reported base target.
    pub base_target: u64,
}

/// Payload of an [`Alert::BaseTarget`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseTargetAlert {
    /// Round timestamp, unix seconds.
    pub ts: i64,
    /// The configured threshold that was crossed.
    pub threshold: u64,
    /// Every polled node's base target this round.
    pub values: Vec<BaseTargetValue>,
}

/// Payload of an [`Alert::InternalError`]: the monitor monitoring itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalErrorAlert {
    /// Round timestamp, unix seconds.
    pub ts: i64,
    /// Name of the criterion that failed.
    pub criterion: String,
    /// Human-readable failure description.
    pub message: String,
}

/// A condition worth notifying operators about, with a stable semantic
/// identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Alert {
    /// A node did not answer its probes this round.
    Unreachable(UnreachableAlert),
    /// A node's statements have been incomplete for a configured streak.
    Incomplete(IncompleteAlert),
    /// A node reported a meaningless height.
    InvalidHeight(InvalidHeightAlert),
    /// The fleet diverged in height.
    Height(HeightAlert),
    /// The fleet disagrees on a state hash at a common height.
    StateHash(StateHashAlert),
    /// The modal base target crossed the configured threshold.
    BaseTarget(BaseTargetAlert),
    /// A previously confirmed alert stopped recurring.
    Fixed(Box<Alert>),
    /// A detection criterion itself failed.
    InternalError(InternalErrorAlert),
}

impl Alert {
    /// The classification of this alert.
    pub fn alert_type(&self) -> AlertType {
        match self {
            Alert::Unreachable(_) => AlertType::Unreachable,
            Alert::Incomplete(_) => AlertType::Incomplete,
            Alert::InvalidHeight(_) => AlertType::InvalidHeight,
            Alert::Height(_) => AlertType::Height,
            Alert::StateHash(_) => AlertType::StateHash,
            Alert::BaseTarget(_) => AlertType::BaseTarget,
            Alert::Fixed(_) => AlertType::Fixed,
            Alert::InternalError(_) => AlertType::InternalError,
        }
    }

    /// Round timestamp the alert was raised at, unix seconds.
    pub fn ts(&self) -> i64 {
        match self {
            Alert::Unreachable(a) => a.ts,
            Alert::Incomplete(a) => a.statement.ts,
            Alert::InvalidHeight(a) => a.statement.ts,
            Alert::Height(a) => a.ts,
            Alert::StateHash(a) => a.ts,
            Alert::BaseTarget(a) => a.ts,
            Alert::Fixed(inner) => inner.ts(),
            Alert::InternalError(a) => a.ts,
        }
    }

    /// The stable identity of the alert: a hex SHA-256 over the alert's
    /// semantic content. Timestamps are never part of the identity, and
    /// grouped content is sorted first, so the id is invariant to input
    /// order across rounds.
    pub fn id(&self) -> String {
        let identity = match self {
            Alert::Unreachable(a) => format!("unreachable|{}", a.node),
            Alert::Incomplete(a) => format!("incomplete|{}", a.statement.node),
            Alert::InvalidHeight(a) => format!("invalid_height|{}", a.statement.node),
            Alert::Height(a) => {
                let mut groups: Vec<(u64, Vec<String>)> = a
                    .groups
                    .iter()
                    .map(|g| {
                        let mut nodes = g.nodes.clone();
                        nodes.sort();
                        (g.height, nodes)
                    })
                    .collect();
                groups.sort();
                let parts: Vec<String> = groups
                    .into_iter()
                    .map(|(height, nodes)| format!("{}:{}", height, nodes.join(",")))
                    .collect();
                format!("height|{}", parts.join(";"))
            }
            Alert::StateHash(a) => {
                let mut groups: Vec<(String, Vec<String>)> = a
                    .groups
                    .iter()
                    .map(|g| {
                        let mut nodes = g.nodes.clone();
                        nodes.sort();
                        (g.state_hash.clone(), nodes)
                    })
                    .collect();
                groups.sort();
                let parts: Vec<String> = groups
                    .into_iter()
                    .map(|(hash, nodes)| format!("{}:{}", hash, nodes.join(",")))
                    .collect();
                format!("state_hash|{}|{}", a.height, parts.join(";"))
            }
            Alert::BaseTarget(a) => format!("base_target|{}", a.threshold),
            Alert::Fixed(inner) => format!("fixed|{}", inner.id()),
            Alert::InternalError(a) => format!("internal_error|{}", a.criterion),
        };
        let digest = Sha256::digest(identity.as_bytes());
        hex::encode(digest)
    }
}

impl std::fmt::Display for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Alert::Unreachable(a) => write!(f, "Node {} is unreachable", a.node),
            Alert::Incomplete(a) => write!(
                f,
                "Node {} has not produced a complete statement for several rounds",
                a.statement.node
            ),
            Alert::InvalidHeight(a) => write!(
                f,
                "Node {} reported invalid height {}",
                a.statement.node,
                a.statement.height.unwrap_or_default()
            ),
            Alert::Height(a) => {
                let parts: Vec<String> = a
                    .groups
                    .iter()
                    .map(|g| format!("{} at height {}", g.nodes.join(", "), g.height))
                    .collect();
                write!(f, "Fleet height divergence: {}", parts.join("; "))
            }
            Alert::StateHash(a) => {
                let parts: Vec<String> = a
                    .groups
                    .iter()
                    .map(|g| format!("{} report {}", g.nodes.join(", "), g.state_hash))
                    .collect();
                write!(
                    f,
                    "State hash disagreement at height {}: {}",
                    a.height,
                    parts.join("; ")
                )
            }
            Alert::BaseTarget(a) => write!(
                f,
                "Base target is out of range (threshold {}) on {} nodes",
                a.threshold,
                a.values.len()
            ),
            Alert::Fixed(inner) => write!(f, "Fixed: {inner}"),
            Alert::InternalError(a) => {
                write!(f, "Criterion {} failed: {}", a.criterion, a.message)
            }
        }
    }
}
