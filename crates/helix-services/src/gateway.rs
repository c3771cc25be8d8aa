//! Node gateway: the uniform call interface to a ledger node.
//!
//! `NodeApi` is the node's command surface, one method per command.
//! `Gateway` is the process-wide configuration object: built once at
//! startup, passed to every operation, and used to obtain a `NodeHandle`
//! either for the default node or for ad hoc `NodeSettings`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use helix_core::config::{HelixConfig, QUORUM_THRESHOLD_PERCENT};
use helix_core::{Hash, NodeSettings, TxBytes};

use crate::error::ApiError;
use crate::http_node::HttpConnector;
use crate::quorum::Quorum;

/// Error text a node returns when attachToTangle is enabled but called
/// without arguments.
pub const INVALID_PARAMETERS: &str = "Invalid parameters";

/// Error text of the synthetic probe response when the endpoint is absent.
pub const ATTACH_TO_TANGLE_UNAVAILABLE: &str = "attachToTangle is not available";

/// Feature flag advertised by nodes that do proof-of-work for clients.
pub const REMOTE_POW_FEATURE: &str = "RemotePOW";

// ── Node responses ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub app_name: String,
    pub app_version: String,
    pub current_round_index: i64,
    pub latest_solid_round_index: i64,
    /// Absent on nodes that predate feature advertisement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
}

/// The two transactions a new bundle attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tips {
    #[serde(rename = "trunkTransaction")]
    pub trunk: Hash,
    #[serde(rename = "branchTransaction")]
    pub branch: Hash,
}

/// findTransactions filter. Empty lists are left out of the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindQuery {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<Hash>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bundles: Vec<Hash>,
    /// Hex-encoded tags.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub approvees: Vec<Hash>,
}

impl FindQuery {
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
            && self.bundles.is_empty()
            && self.tags.is_empty()
            && self.approvees.is_empty()
    }
}

/// Raw answer to the attachToTangle feature probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResponse {
    #[serde(default)]
    pub error: Option<String>,
}

impl ProbeResponse {
    /// Stand-in used when the probe itself fails, so callers handle one shape.
    pub fn unavailable() -> Self {
        Self {
            error: Some(ATTACH_TO_TANGLE_UNAVAILABLE.to_string()),
        }
    }
}

// ── Node surface ──────────────────────────────────────────────────────────────

/// Commands a node answers. Every call may fail with a transport, timeout
/// or node-reported error; nothing here retries.
#[async_trait]
pub trait NodeApi: Send + Sync {
    /// URL this handle talks to. Used for logging.
    fn url(&self) -> &str;

    async fn get_balances(&self, addresses: &[Hash], threshold: u8) -> Result<Vec<u64>, ApiError>;

    async fn get_node_info(&self) -> Result<NodeInfo, ApiError>;

    /// Canonical bytes for each hash, in request order.
    async fn get_transaction_strings(&self, hashes: &[Hash]) -> Result<Vec<TxBytes>, ApiError>;

    async fn find_transactions(&self, query: &FindQuery) -> Result<Vec<Hash>, ApiError>;

    async fn get_inclusion_states(
        &self,
        hashes: &[Hash],
        tips: &[Hash],
    ) -> Result<Vec<bool>, ApiError>;

    /// Tips to attach to; with `reference`, tips that approve it.
    async fn get_transactions_to_approve(
        &self,
        depth: u32,
        reference: Option<Hash>,
    ) -> Result<Tips, ApiError>;

    /// Remote proof-of-work. `txs` head first; the answer keeps that order.
    async fn attach_to_tangle(
        &self,
        trunk: Hash,
        branch: Hash,
        min_weight_magnitude: u8,
        txs: &[TxBytes],
    ) -> Result<Vec<TxBytes>, ApiError>;

    async fn store_transactions(&self, txs: &[TxBytes]) -> Result<(), ApiError>;

    async fn broadcast_transactions(&self, txs: &[TxBytes]) -> Result<(), ApiError>;

    /// Whether the tails are consistent with the node's ledger state.
    async fn check_consistency(&self, tails: &[Hash]) -> Result<bool, ApiError>;

    async fn were_addresses_spent_from(&self, addresses: &[Hash]) -> Result<Vec<bool>, ApiError>;

    /// Call attachToTangle with no arguments. Never fails: transport
    /// problems come back as `ProbeResponse::unavailable()`.
    async fn check_attach_to_tangle(&self) -> ProbeResponse;
}

pub type NodeHandle = Arc<dyn NodeApi>;

/// Builds node handles from settings.
pub trait Connector: Send + Sync {
    fn connect(&self, settings: &NodeSettings, timeout: Duration) -> NodeHandle;
}

// ── Gateway ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Gateway {
    default_settings: NodeSettings,
    default: NodeHandle,
    connector: Arc<dyn Connector>,
    quorum: Quorum,
}

impl Gateway {
    /// Gateway whose default handle is `settings`, connected once, now.
    /// The quorum starts as the default node alone.
    pub fn new(settings: NodeSettings, connector: Arc<dyn Connector>) -> Self {
        let default = connector.connect(&settings, settings.request_timeout());
        let quorum = Quorum::new(vec![settings.clone()], QUORUM_THRESHOLD_PERCENT);
        Self {
            default_settings: settings,
            default,
            connector,
            quorum,
        }
    }

    /// HTTP gateway for a loaded configuration.
    pub fn from_config(config: &HelixConfig) -> Self {
        let gateway = Self::new(config.node.clone(), Arc::new(HttpConnector));
        if config.quorum.nodes.is_empty() {
            return gateway;
        }
        let nodes = config
            .quorum
            .nodes
            .iter()
            .map(|url| NodeSettings {
                url: url.clone(),
                ..config.node.clone()
            })
            .collect();
        gateway.with_quorum(Quorum::new(nodes, config.quorum.threshold()))
    }

    pub fn with_quorum(mut self, quorum: Quorum) -> Self {
        self.quorum = quorum;
        self
    }

    /// Handle for `settings` with `timeout`, or the default handle.
    ///
    /// The default handle keeps the timeout it was built with.
    pub fn instance(&self, settings: Option<&NodeSettings>, timeout: Duration) -> NodeHandle {
        match settings {
            Some(settings) => self.connector.connect(settings, timeout),
            None => Arc::clone(&self.default),
        }
    }

    pub fn default_settings(&self) -> &NodeSettings {
        &self.default_settings
    }

    pub fn quorum(&self) -> &Quorum {
        &self.quorum
    }

    /// Settings for an explicit call site, falling back to the default node.
    pub fn settings_or_default<'a>(
        &'a self,
        settings: Option<&'a NodeSettings>,
    ) -> &'a NodeSettings {
        settings.unwrap_or(&self.default_settings)
    }
}
