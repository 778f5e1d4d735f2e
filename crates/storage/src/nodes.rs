// Path: crates/storage/src/nodes.rs

//! The authoritative registry of monitored nodes.
//!
//! The registry owns the in-memory copy and serialises every mutation; each
//! mutation is persisted as a full JSON document replaced atomically
//! (write-to-temp, then rename), so a crash never leaves a torn node list.

use chainwatch_types::error::StorageError;
use chainwatch_types::Node;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use url::Url;

/// The persisted document: the regular fleet plus the privately polled list.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct PersistedNodes {
    nodes: Vec<Node>,
    #[serde(default)]
    specific_nodes: Vec<Node>,
}

/// Registry of monitored nodes, persisted to a JSON file.
pub struct NodesStorage {
    path: PathBuf,
    inner: Mutex<PersistedNodes>,
}

impl NodesStorage {
    /// Opens the registry at `path`. An existing file is loaded; otherwise
    /// the registry is seeded from `seed_urls` and written out immediately.
    pub fn open(path: impl AsRef<Path>, seed_urls: &[String]) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let document = if path.exists() {
            let raw = fs::read(&path).map_err(|e| StorageError::Io(e.to_string()))?;
            serde_json::from_slice(&raw).map_err(|e| StorageError::Serialization(e.to_string()))?
        } else {
            let mut document = PersistedNodes::default();
            for url in seed_urls {
                document.nodes.push(Node::new(canonical_url(url)?));
            }
            document
        };
        let storage = Self {
            path,
            inner: Mutex::new(document),
        };
        {
            let inner = storage.lock();
            storage.persist(&inner)?;
        }
        Ok(storage)
    }

    /// All registered nodes, enabled or not.
    pub fn all(&self) -> Vec<Node> {
        self.lock().nodes.clone()
    }

    /// The nodes currently eligible for polling.
    pub fn enabled(&self) -> Vec<Node> {
        self.lock().nodes.iter().filter(|n| n.enabled).cloned().collect()
    }

    /// All privately polled nodes.
    pub fn specific(&self) -> Vec<Node> {
        self.lock().specific_nodes.clone()
    }

    /// Registers a node. Adding an already-present URL is a no-op.
    pub fn add(&self, url: &str) -> Result<(), StorageError> {
        let url = canonical_url(url)?;
        let mut inner = self.lock();
        if inner.nodes.iter().any(|n| n.url == url) {
            return Ok(());
        }
        inner.nodes.push(Node::new(url));
        self.persist(&inner)
    }

    /// Registers a privately polled node. Idempotent like [`Self::add`].
    pub fn add_specific(&self, url: &str) -> Result<(), StorageError> {
        let url = canonical_url(url)?;
        let mut inner = self.lock();
        if inner.specific_nodes.iter().any(|n| n.url == url) {
            return Ok(());
        }
        inner.specific_nodes.push(Node::new(url));
        self.persist(&inner)
    }

    /// Removes a node from either list. Fails with `NotFound` for an
    /// unregistered URL.
    pub fn remove(&self, url: &str) -> Result<Node, StorageError> {
        let mut inner = self.lock();
        if let Some(position) = inner.nodes.iter().position(|n| n.url == url) {
            let node = inner.nodes.remove(position);
            self.persist(&inner)?;
            return Ok(node);
        }
        if let Some(position) = inner.specific_nodes.iter().position(|n| n.url == url) {
            let node = inner.specific_nodes.remove(position);
            self.persist(&inner)?;
            return Ok(node);
        }
        Err(StorageError::NotFound(url.to_string()))
    }

    /// Marks a node eligible for polling.
    pub fn enable(&self, url: &str) -> Result<(), StorageError> {
        self.update(url, |node| node.enabled = true)
    }

    /// Excludes a node from polling without forgetting it.
    pub fn disable(&self, url: &str) -> Result<(), StorageError> {
        self.update(url, |node| node.enabled = false)
    }

    /// Sets the human-readable alias of a node.
    pub fn set_alias(&self, url: &str, alias: &str) -> Result<(), StorageError> {
        let alias = alias.to_string();
        self.update(url, move |node| node.alias = alias.clone())
    }

    fn update<F>(&self, url: &str, mutate: F) -> Result<(), StorageError>
    where
        F: Fn(&mut Node),
    {
        let mut inner = self.lock();
        {
            let document = &mut *inner;
            let node = document
                .nodes
                .iter_mut()
                .chain(document.specific_nodes.iter_mut())
                .find(|n| n.url == url)
                .ok_or_else(|| StorageError::NotFound(url.to_string()))?;
            mutate(node);
        }
        self.persist(&inner)
    }

    fn persist(&self, document: &PersistedNodes) -> Result<(), StorageError> {
        let encoded = serde_json::to_vec_pretty(document)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &encoded).map_err(|e| StorageError::Io(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| StorageError::Io(e.to_string()))?;
        tracing::debug!(
            target = "storage",
            path = %self.path.display(),
            nodes = document.nodes.len(),
            specific = document.specific_nodes.len(),
            "persisted node registry"
        );
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PersistedNodes> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Validates and canonicalises a node URL.
fn canonical_url(raw: &str) -> Result<String, StorageError> {
    let parsed = Url::parse(raw)
        .map_err(|e| StorageError::InvalidArgument(format!("invalid node URL {raw:?}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(StorageError::InvalidArgument(format!(
            "unsupported URL scheme {:?}",
            parsed.scheme()
        )));
    }
    Ok(raw.trim_end_matches('/').to_string())
}
