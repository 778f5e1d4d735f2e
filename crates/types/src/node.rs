// Path: crates/types/src/node.rs

//! Monitored node records.

use serde::{Deserialize, Serialize};

/// A monitored blockchain node. Identity is the canonical URL string;
/// two nodes are the same node iff their URLs are equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// REST API base URL of the node.
    pub url: String,
    /// Disabled nodes stay registered but are excluded from polling.
    pub enabled: bool,
    /// Optional human-readable alias; empty string when unset.
    #[serde(default)]
    pub alias: String,
}

impl Node {
    /// Creates an enabled node without an alias.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            enabled: true,
            alias: String::new(),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for Node {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_equality_is_by_url() {
        let mut a = Node::new("https://n1.example.com");
        let b = Node::new("https://n1.example.com");
        a.enabled = false;
        a.alias = "primary".to_string();
        assert_eq!(a, b);

        let c = Node::new("https://n2.example.com");
        assert_ne!(a, c);
    }
}
