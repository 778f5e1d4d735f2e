// Path: crates/client/src/lib.rs
#![forbid(unsafe_code)]

//! # Chainwatch Client
//!
//! One-shot HTTP probes against a monitored node's REST API. Each accessor
//! issues a single GET and reports a distinguishable failure kind; retry
//! policy belongs to the polling engine, never to this client.

use chainwatch_types::error::ProbeError;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(Deserialize)]
struct VersionResponse {
    version: String,
}

#[derive(Deserialize)]
struct HeightResponse {
    height: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateHashResponse {
    state_hash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockHeaderResponse {
    base_target: u64,
}

/// HTTP client for one monitored node.
pub struct NodeClient {
    base: String,
    http: reqwest::Client,
}

impl NodeClient {
    /// Builds a client for the node at `url` with a per-request `timeout`.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ProbeError> {
        let parsed =
            Url::parse(url).map_err(|e| ProbeError::Transport(format!("invalid base URL: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Transport(e.to_string()))?;
        Ok(Self {
            base: parsed.as_str().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// `GET /node/version`.
    pub async fn version(&self) -> Result<String, ProbeError> {
        let response: VersionResponse = self.get(&format!("{}/node/version", self.base)).await?;
        Ok(response.version)
    }

    /// `GET /blocks/height`.
    pub async fn height(&self) -> Result<u64, ProbeError> {
        let response: HeightResponse = self.get(&format!("{}/blocks/height", self.base)).await?;
        Ok(response.height)
    }

    /// `GET /debug/stateHash?height=H`.
    pub async fn state_hash(&self, height: u64) -> Result<String, ProbeError> {
        let response: StateHashResponse = self
            .get(&format!("{}/debug/stateHash?height={height}", self.base))
            .await?;
        Ok(response.state_hash)
    }

    /// `GET /blocks/headers/at/H`, returning the header's base target.
    pub async fn base_target(&self, height: u64) -> Result<u64, ProbeError> {
        let response: BlockHeaderResponse = self
            .get(&format!("{}/blocks/headers/at/{height}", self.base))
            .await?;
        Ok(response.base_target)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ProbeError> {
        let response = self.http.get(url).send().await.map_err(map_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status {
                code: status.as_u16(),
            });
        }
        response.json::<T>().await.map_err(map_error)
    }
}

fn map_error(error: reqwest::Error) -> ProbeError {
    if error.is_timeout() {
        ProbeError::Timeout
    } else if error.is_decode() {
        ProbeError::Decode(error.to_string())
    } else {
        ProbeError::Transport(error.to_string())
    }
}
