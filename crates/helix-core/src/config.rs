//! Configuration system for Helix clients.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $HELIX_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/helix/config.toml
//!   3. ~/.config/helix/config.toml
//!
//! Per-request timeouts and the pipeline's fixed tuning constants live here
//! too; they are not user-configurable.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Timeout for any node request without a dedicated entry below.
pub const DEFAULT_NODE_REQUEST_TIMEOUT: Duration = Duration::from_secs(6);
pub const GET_BALANCES_REQUEST_TIMEOUT: Duration = Duration::from_secs(12);
pub const GET_NODE_INFO_REQUEST_TIMEOUT: Duration = Duration::from_secs(4);
pub const WERE_ADDRESSES_SPENT_FROM_REQUEST_TIMEOUT: Duration = Duration::from_secs(8);
pub const GET_TRANSACTIONS_TO_APPROVE_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// First window for remote proof-of-work. Retries widen it.
pub const ATTACH_TO_TANGLE_REQUEST_TIMEOUT: Duration = Duration::from_secs(25);

/// Attempts the timeout handler makes before giving up.
pub const MAX_REQUEST_ATTEMPTS: u32 = 3;

/// Tip-selection walk depth.
pub const DEFAULT_DEPTH: u32 = 3;

/// Required leading zero bits on every attached transaction hash.
pub const DEFAULT_MIN_WEIGHT_MAGNITUDE: u8 = 14;

/// Confirmation threshold (percent) passed with balance queries.
pub const DEFAULT_BALANCES_THRESHOLD: u8 = 100;

/// A node more than this many rounds behind is not trusted.
pub const MAX_MILESTONE_FALLBEHIND: i64 = 2;

/// Sent as `X-HELIX-API-Version` on every request.
pub const HELIX_API_VERSION: &str = "1";

/// Share of quorum nodes (percent) that must agree on a read.
pub const QUORUM_THRESHOLD_PERCENT: u8 = 67;

/// Transactions attached longer ago than this can no longer be promoted.
pub const MAX_PROMOTION_AGE: Duration = Duration::from_secs(11 * 60);

/// Timeout for a node command, looked up by its wire name.
pub fn api_timeout(method: &str) -> Duration {
    match method {
        "wereAddressesSpentFrom" => WERE_ADDRESSES_SPENT_FROM_REQUEST_TIMEOUT,
        "getBalances" => GET_BALANCES_REQUEST_TIMEOUT,
        "getNodeInfo" => GET_NODE_INFO_REQUEST_TIMEOUT,
        "attachToTangle" => ATTACH_TO_TANGLE_REQUEST_TIMEOUT,
        "getTransactionsToApprove" => GET_TRANSACTIONS_TO_APPROVE_REQUEST_TIMEOUT,
        _ => DEFAULT_NODE_REQUEST_TIMEOUT,
    }
}

// ── Node settings ─────────────────────────────────────────────────────────────

/// Where and how to reach one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub url: String,
    /// Sent as a bearer token when present.
    pub auth_token: Option<String>,
    pub request_timeout_ms: u64,
}

impl NodeSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8085".to_string(),
            auth_token: None,
            request_timeout_ms: DEFAULT_NODE_REQUEST_TIMEOUT.as_millis() as u64,
        }
    }
}

// ── Config file ───────────────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HelixConfig {
    pub node: NodeSettings,
    pub quorum: QuorumConfig,
    pub attachment: AttachmentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuorumConfig {
    /// Route balance, spent-from and inclusion reads through the quorum.
    pub enabled: bool,
    /// Node URLs polled for quorum reads. Empty = the primary node only.
    pub nodes: Vec<String>,
    /// Percent of nodes that must agree. 0 = QUORUM_THRESHOLD_PERCENT.
    pub threshold_percent: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentConfig {
    pub depth: u32,
    pub min_weight_magnitude: u8,
    /// Ask the node to do proof-of-work instead of doing it locally.
    pub remote_pow: bool,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            nodes: Vec::new(),
            threshold_percent: QUORUM_THRESHOLD_PERCENT,
        }
    }
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            min_weight_magnitude: DEFAULT_MIN_WEIGHT_MAGNITUDE,
            remote_pow: false,
        }
    }
}

impl QuorumConfig {
    pub fn threshold(&self) -> u8 {
        if self.threshold_percent == 0 {
            QUORUM_THRESHOLD_PERCENT
        } else {
            self.threshold_percent.min(100)
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

pub fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("helix")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl HelixConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            HelixConfig::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a specific file without env overrides.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("HELIX_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&HelixConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply HELIX_* overrides. `lookup` is `std::env::var` outside tests.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("HELIX_NODE__URL") {
            self.node.url = v;
        }
        if let Some(v) = lookup("HELIX_NODE__AUTH_TOKEN") {
            self.node.auth_token = Some(v).filter(|t| !t.is_empty());
        }
        if let Some(v) = lookup("HELIX_NODE__REQUEST_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                self.node.request_timeout_ms = ms;
            }
        }
        if let Some(v) = lookup("HELIX_QUORUM__ENABLED") {
            self.quorum.enabled = v == "true" || v == "1";
        }
        if let Some(v) = lookup("HELIX_QUORUM__NODES") {
            self.quorum.nodes = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("HELIX_ATTACHMENT__REMOTE_POW") {
            self.attachment.remote_pow = v == "true" || v == "1";
        }
        if let Some(v) = lookup("HELIX_ATTACHMENT__MIN_WEIGHT_MAGNITUDE") {
            if let Ok(mwm) = v.parse() {
                self.attachment.min_weight_magnitude = mwm;
            }
        }
    }
}
