// Path: crates/node/src/config.rs

//! Command-line and environment configuration of the monitor.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use url::Url;

/// Fleet monitor for blockchain nodes.
#[derive(Parser, Debug)]
#[command(name = "chainwatch", version)]
pub struct Opts {
    /// Path to the node registry JSON file.
    #[arg(long, env = "CHAINWATCH_STORAGE", default_value = ".nodes.json")]
    pub storage: PathBuf,

    /// Initial list of node REST API URLs to monitor, space separated. Only
    /// used when the registry file does not exist yet.
    #[arg(long, env = "CHAINWATCH_NODES", default_value = "")]
    pub nodes: String,

    /// Privately polled node URLs, space separated. These nodes push their
    /// observations instead of being probed.
    #[arg(long, env = "CHAINWATCH_PRIVATE_NODES", default_value = "")]
    pub private_nodes: String,

    /// Polling interval, seconds.
    #[arg(long, env = "CHAINWATCH_INTERVAL", default_value_t = 60)]
    pub interval: u64,

    /// Per-HTTP-request timeout, seconds.
    #[arg(long, env = "CHAINWATCH_TIMEOUT", default_value_t = 15)]
    pub timeout: u64,

    /// Event retention window, seconds.
    #[arg(long, env = "CHAINWATCH_RETENTION", default_value_t = 12 * 60 * 60)]
    pub retention: u64,

    /// Base target threshold. Must be specified and non-zero.
    #[arg(long, env = "CHAINWATCH_BASE_TARGET_THRESHOLD", default_value_t = 0)]
    pub base_target_threshold: u64,

    /// Maximum tolerated height spread before a divergence alert.
    #[arg(long, env = "CHAINWATCH_HEIGHT_DELTA", default_value_t = 1)]
    pub height_delta: u64,

    /// Rounds of silence before an alert identity is vacuumed.
    #[arg(long, env = "CHAINWATCH_ALERT_VACUUM_QUOTA", default_value_t = 5)]
    pub alert_vacuum_quota: i64,

    /// Backoff multiplier between re-emissions of a persistent alert.
    #[arg(long, env = "CHAINWATCH_ALERT_BACKOFF", default_value_t = 2)]
    pub alert_backoff: u32,

    /// Consecutive rounds required to confirm a height divergence alert.
    #[arg(long, env = "CHAINWATCH_HEIGHT_CONFIRMATIONS", default_value_t = 2)]
    pub height_confirmations: u32,

    /// Reply deadline of the pair request channel, seconds.
    #[arg(long, env = "CHAINWATCH_PAIR_DEADLINE", default_value_t = 30)]
    pub pair_deadline: u64,

    /// Bind address of the telemetry HTTP server.
    #[arg(long, env = "CHAINWATCH_TELEMETRY_BIND", default_value = "127.0.0.1:8080")]
    pub telemetry_bind: SocketAddr,

    /// Emit logs as structured JSON instead of the compact format.
    #[arg(long, env = "CHAINWATCH_LOG_JSON")]
    pub log_json: bool,
}

impl Opts {
    /// The seed URLs for the regular fleet.
    pub fn seed_urls(&self) -> Vec<String> {
        self.nodes.split_whitespace().map(String::from).collect()
    }

    /// The privately polled node URLs.
    pub fn private_urls(&self) -> Vec<String> {
        self.private_nodes
            .split_whitespace()
            .map(String::from)
            .collect()
    }

    /// Rejects configurations the monitor cannot run with. The returned
    /// message names the offending option.
    pub fn validate(&self) -> Result<(), String> {
        if self.storage.as_os_str().is_empty() {
            return Err("storage path must not be empty".to_string());
        }
        if self.interval == 0 {
            return Err("polling interval must be positive".to_string());
        }
        if self.timeout == 0 {
            return Err("network timeout must be positive".to_string());
        }
        if self.retention == 0 {
            return Err("retention duration must be positive".to_string());
        }
        if self.base_target_threshold == 0 {
            return Err("base target threshold must be specified and non-zero".to_string());
        }
        for (index, url) in self
            .seed_urls()
            .iter()
            .chain(self.private_urls().iter())
            .enumerate()
        {
            Url::parse(url).map_err(|e| format!("node URL #{} {url:?} is invalid: {e}", index + 1))?;
        }
        Ok(())
    }
}
