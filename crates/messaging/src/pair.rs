// Path: crates/messaging/src/pair.rs

//! The paired request/response channel for chat front-ends.
//!
//! Requests arrive as framed bytes: a request-type tag byte followed by the
//! payload. Replies are JSON objects with stable shapes and are strictly
//! correlated one-to-one with requests; a handler that misses its deadline
//! answers with an internal error instead of going silent.

use chainwatch_poller::ObservationsWriter;
use chainwatch_storage::{EventsStorage, NodesStorage};
use chainwatch_types::error::{ErrorCode, MessagingError, StorageError};
use chainwatch_types::{Event, NodeStatement, NodeStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Request-type tag bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum RequestTag {
    NodeList = 1,
    AddNode = 2,
    DeleteNode = 3,
    NodesStatus = 4,
    NodeStatement = 5,
    UpdateNode = 6,
    SpecificNodeList = 7,
    InsertSpecificNode = 8,
}

impl RequestTag {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::NodeList),
            2 => Some(Self::AddNode),
            3 => Some(Self::DeleteNode),
            4 => Some(Self::NodesStatus),
            5 => Some(Self::NodeStatement),
            6 => Some(Self::UpdateNode),
            7 => Some(Self::SpecificNodeList),
            8 => Some(Self::InsertSpecificNode),
            _ => None,
        }
    }
}

/// Payload of a `NodeStatement` request.
#[derive(Debug, Serialize, Deserialize)]
struct NodeHeight {
    url: String,
    height: u64,
}

/// Payload of an `UpdateNode` request.
#[derive(Debug, Serialize, Deserialize)]
struct NodeUpdate {
    url: String,
    #[serde(default)]
    alias: String,
}

/// An admin request from a chat front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairRequest {
    /// List the regular fleet.
    NodeList,
    /// Register a node.
    AddNode {
        /// REST API base URL.
        url: String,
    },
    /// Forget a node.
    DeleteNode {
        /// REST API base URL.
        url: String,
    },
    /// Report the latest status of the given nodes.
    NodesStatus {
        /// REST API base URLs.
        urls: Vec<String>,
    },
    /// Report one node's statement at a specific height.
    NodeStatement {
        /// REST API base URL.
        url: String,
        /// The height of interest.
        height: u64,
    },
    /// Update a node's alias.
    UpdateNode {
        /// REST API base URL.
        url: String,
        /// New alias; empty clears it.
        alias: String,
    },
    /// List the privately polled nodes.
    SpecificNodeList,
    /// Register a privately polled node.
    InsertSpecificNode {
        /// REST API base URL.
        url: String,
    },
}

impl PairRequest {
    /// Encodes the request into its wire frame.
    pub fn encode(&self) -> Result<Vec<u8>, MessagingError> {
        let mut frame = Vec::new();
        match self {
            PairRequest::NodeList => frame.push(RequestTag::NodeList as u8),
            PairRequest::SpecificNodeList => frame.push(RequestTag::SpecificNodeList as u8),
            PairRequest::AddNode { url } => {
                frame.push(RequestTag::AddNode as u8);
                frame.extend_from_slice(url.as_bytes());
            }
            PairRequest::DeleteNode { url } => {
                frame.push(RequestTag::DeleteNode as u8);
                frame.extend_from_slice(url.as_bytes());
            }
            PairRequest::InsertSpecificNode { url } => {
                frame.push(RequestTag::InsertSpecificNode as u8);
                frame.extend_from_slice(url.as_bytes());
            }
            PairRequest::NodesStatus { urls } => {
                frame.push(RequestTag::NodesStatus as u8);
                frame.extend_from_slice(urls.join(",").as_bytes());
            }
            PairRequest::NodeStatement { url, height } => {
                frame.push(RequestTag::NodeStatement as u8);
                let payload = serde_json::to_vec(&NodeHeight {
                    url: url.clone(),
                    height: *height,
                })
                .map_err(|e| MessagingError::Encode(e.to_string()))?;
                frame.extend_from_slice(&payload);
            }
            PairRequest::UpdateNode { url, alias } => {
                frame.push(RequestTag::UpdateNode as u8);
                let payload = serde_json::to_vec(&NodeUpdate {
                    url: url.clone(),
                    alias: alias.clone(),
                })
                .map_err(|e| MessagingError::Encode(e.to_string()))?;
                frame.extend_from_slice(&payload);
            }
        }
        Ok(frame)
    }

    /// Decodes a wire frame into a request.
    pub fn decode(frame: &[u8]) -> Result<Self, MessagingError> {
        let (&tag, payload) = frame
            .split_first()
            .ok_or_else(|| MessagingError::Decode("empty frame".to_string()))?;
        let tag = RequestTag::from_byte(tag).ok_or(MessagingError::UnknownRequest(tag))?;
        let text = || {
            String::from_utf8(payload.to_vec())
                .map_err(|e| MessagingError::Decode(e.to_string()))
        };
        match tag {
            RequestTag::NodeList => Ok(PairRequest::NodeList),
            RequestTag::SpecificNodeList => Ok(PairRequest::SpecificNodeList),
            RequestTag::AddNode => Ok(PairRequest::AddNode { url: text()? }),
            RequestTag::DeleteNode => Ok(PairRequest::DeleteNode { url: text()? }),
            RequestTag::InsertSpecificNode => Ok(PairRequest::InsertSpecificNode { url: text()? }),
            RequestTag::NodesStatus => {
                let text = text()?;
                let urls = text
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
                Ok(PairRequest::NodesStatus { urls })
            }
            RequestTag::NodeStatement => {
                let request: NodeHeight = serde_json::from_slice(payload)
                    .map_err(|e| MessagingError::Decode(e.to_string()))?;
                Ok(PairRequest::NodeStatement {
                    url: request.url,
                    height: request.height,
                })
            }
            RequestTag::UpdateNode => {
                let request: NodeUpdate = serde_json::from_slice(payload)
                    .map_err(|e| MessagingError::Decode(e.to_string()))?;
                Ok(PairRequest::UpdateNode {
                    url: request.url,
                    alias: request.alias,
                })
            }
        }
    }
}

/// One node's entry in a `NodesStatusResponse`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatusEntry {
    /// REST API base URL.
    pub url: String,
    /// Latest observed state hash, when the node ever completed a probe.
    pub statehash: Option<String>,
    /// Latest observed height; zero when nothing was ever observed.
    pub height: u64,
    /// Latest status as the wire integer.
    pub status: NodeStatus,
}

/// A reply on the pair channel. Every variant is a JSON object with a stable
/// shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PairResponse {
    /// Reply to `NodeList` and `SpecificNodeList`.
    NodesList {
        /// Registered URLs.
        urls: Vec<String>,
    },
    /// Reply to `NodesStatus`.
    NodesStatus {
        /// One entry per requested URL.
        nodes_status: Vec<NodeStatusEntry>,
    },
    /// Reply to `NodeStatement`.
    NodeStatement {
        /// The statement found in history.
        node_statement: NodeStatement,
    },
    /// Positive reply to a mutation request.
    Ack {
        /// Always `true`; kept explicit for wire stability.
        ok: bool,
        /// Human-readable confirmation.
        details: String,
    },
    /// Negative reply: a human-readable string plus a machine-readable code.
    InternalError {
        /// Stable machine-readable error code.
        code: String,
        /// Human-readable description.
        message: String,
    },
}

impl PairResponse {
    fn error(code: &str, message: impl Into<String>) -> Self {
        PairResponse::InternalError {
            code: code.to_string(),
            message: message.into(),
        }
    }

    fn from_storage_error(error: StorageError) -> Self {
        PairResponse::error(error.code(), error.to_string())
    }
}

/// Serves admin requests against the registry and the event store.
pub struct PairServer {
    nodes: Arc<NodesStorage>,
    events: Arc<EventsStorage>,
    observations: ObservationsWriter,
    deadline: Duration,
}

impl PairServer {
    /// Builds a server answering within `deadline`.
    pub fn new(
        nodes: Arc<NodesStorage>,
        events: Arc<EventsStorage>,
        observations: ObservationsWriter,
        deadline: Duration,
    ) -> Self {
        Self {
            nodes,
            events,
            observations,
            deadline,
        }
    }

    /// Spawns the serve loop over a channel of `(request frame, reply slot)`
    /// pairs. Every received frame gets exactly one reply.
    pub fn start(
        self,
        mut requests: mpsc::Receiver<(Vec<u8>, oneshot::Sender<Vec<u8>>)>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some((frame, reply)) = requests.recv().await {
                let response =
                    match tokio::time::timeout(self.deadline, self.handle_frame(&frame)).await {
                        Ok(encoded) => encoded,
                        Err(_) => encode_response(&PairResponse::error(
                            MessagingError::Deadline.code(),
                            "request deadline elapsed",
                        )),
                    };
                if reply.send(response).is_err() {
                    tracing::warn!(target = "messaging", "pair requester went away");
                }
            }
            tracing::info!(target = "messaging", "pair request stream closed");
        })
    }

    /// Decodes, dispatches and encodes one request frame. Never fails: every
    /// problem becomes an error reply.
    pub async fn handle_frame(&self, frame: &[u8]) -> Vec<u8> {
        let response = match PairRequest::decode(frame) {
            Ok(request) => {
                tracing::debug!(target = "messaging", request = ?request, "pair request");
                self.handle(request)
            }
            Err(error) => PairResponse::error(error.code(), error.to_string()),
        };
        encode_response(&response)
    }

    fn handle(&self, request: PairRequest) -> PairResponse {
        match request {
            PairRequest::NodeList => PairResponse::NodesList {
                urls: self.nodes.all().into_iter().map(|n| n.url).collect(),
            },
            PairRequest::SpecificNodeList => PairResponse::NodesList {
                urls: self.nodes.specific().into_iter().map(|n| n.url).collect(),
            },
            PairRequest::AddNode { url } => match self.nodes.add(&url) {
                Ok(()) => PairResponse::Ack {
                    ok: true,
                    details: format!("node {url} added"),
                },
                Err(error) => PairResponse::from_storage_error(error),
            },
            PairRequest::DeleteNode { url } => match self.nodes.remove(&url) {
                Ok(_) => PairResponse::Ack {
                    ok: true,
                    details: format!("node {url} deleted"),
                },
                Err(error) => PairResponse::from_storage_error(error),
            },
            PairRequest::UpdateNode { url, alias } => {
                let updated = self
                    .nodes
                    .add(&url)
                    .and_then(|()| self.nodes.set_alias(&url, &alias));
                match updated {
                    Ok(()) => PairResponse::Ack {
                        ok: true,
                        details: format!("node {url} updated"),
                    },
                    Err(error) => PairResponse::from_storage_error(error),
                }
            }
            PairRequest::InsertSpecificNode { url } => match self.nodes.add_specific(&url) {
                Ok(()) => {
                    // Seed the overlay so the node is visible (as unreachable)
                    // from the next round even if it never reports.
                    self.observations.write(Event::Unreachable {
                        url: url.clone(),
                        ts: 0,
                    });
                    PairResponse::Ack {
                        ok: true,
                        details: format!("specific node {url} added"),
                    }
                }
                Err(error) => PairResponse::from_storage_error(error),
            },
            PairRequest::NodesStatus { urls } => {
                let mut nodes_status = Vec::with_capacity(urls.len());
                for url in urls {
                    nodes_status.push(self.status_entry(url));
                }
                PairResponse::NodesStatus { nodes_status }
            }
            PairRequest::NodeStatement { url, height } => {
                match self.events.statement_at(&url, height) {
                    Ok(Some(node_statement)) => PairResponse::NodeStatement { node_statement },
                    Ok(None) => PairResponse::error(
                        StorageError::NotFound(url.clone()).code(),
                        format!("no statement for {url} at height {height}"),
                    ),
                    Err(error) => PairResponse::from_storage_error(error),
                }
            }
        }
    }

    fn status_entry(&self, url: String) -> NodeStatusEntry {
        let mut latest: Option<NodeStatement> = None;
        let scanned = self.events.statements_descending(&url, |statement| {
            latest = Some(statement.clone());
            false
        });
        if let Err(error) = scanned {
            tracing::warn!(target = "messaging", %error, url, "status scan failed");
        }
        match latest {
            Some(statement) => NodeStatusEntry {
                url,
                statehash: statement.state_hash,
                height: statement.height.unwrap_or(0),
                status: statement.status,
            },
            None => NodeStatusEntry {
                url,
                statehash: None,
                height: 0,
                status: NodeStatus::Unreachable,
            },
        }
    }
}

fn encode_response(response: &PairResponse) -> Vec<u8> {
    serde_json::to_vec(response).unwrap_or_else(|error| {
        tracing::error!(target = "messaging", %error, "failed to encode pair response");
        br#"{"code":"MSG_ENCODE","message":"failed to encode response"}"#.to_vec()
    })
}
