//! JSON-over-HTTP node client.
//!
//! Every command is a POST to the node URL with a body of the form
//! `{"command": "<name>", ...params}`. Nodes report failures as
//! `{"error": "..."}`, usually with a 4xx/5xx status.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use helix_core::config::HELIX_API_VERSION;
use helix_core::{Hash, NodeSettings, TxBytes};

use crate::error::ApiError;
use crate::gateway::{Connector, FindQuery, NodeApi, NodeHandle, NodeInfo, ProbeResponse, Tips};

pub const API_VERSION_HEADER: &str = "X-HELIX-API-Version";

/// Builds `HttpNode` handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl Connector for HttpConnector {
    fn connect(&self, settings: &NodeSettings, timeout: Duration) -> NodeHandle {
        std::sync::Arc::new(HttpNode::new(settings.clone(), timeout))
    }
}

pub struct HttpNode {
    client: reqwest::Client,
    settings: NodeSettings,
    timeout: Duration,
}

#[derive(Deserialize)]
struct BalancesResponse {
    balances: Vec<u64>,
}

#[derive(Deserialize)]
struct TxsResponse {
    txs: Vec<TxBytes>,
}

#[derive(Deserialize)]
struct HashesResponse {
    hashes: Vec<Hash>,
}

#[derive(Deserialize)]
struct StatesResponse {
    states: Vec<bool>,
}

#[derive(Deserialize)]
struct ConsistencyResponse {
    state: bool,
    #[serde(default)]
    info: Option<String>,
}

#[derive(Deserialize)]
struct Empty {}

impl HttpNode {
    pub fn new(settings: NodeSettings, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
            timeout,
        }
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response, reqwest::Error> {
        let mut request = self
            .client
            .post(&self.settings.url)
            .timeout(self.timeout)
            .header(API_VERSION_HEADER, HELIX_API_VERSION)
            .json(body);
        if let Some(token) = &self.settings.auth_token {
            request = request.bearer_auth(token);
        }
        request.send().await
    }

    async fn call<T: DeserializeOwned>(&self, body: Value) -> Result<T, ApiError> {
        let command = body["command"].as_str().unwrap_or_default().to_string();
        tracing::debug!(url = %self.settings.url, %command, "node request");

        let response = self.send(&body).await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        let value: Value = serde_json::from_str(&text).map_err(|e| {
            if status.is_success() {
                ApiError::Node(format!("{command}: malformed response: {e}"))
            } else {
                ApiError::Node(format!("{command}: HTTP {status}"))
            }
        })?;

        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return Err(ApiError::Node(error.to_string()));
        }
        if !status.is_success() {
            return Err(ApiError::Node(format!("{command}: HTTP {status}")));
        }

        serde_json::from_value(value)
            .map_err(|e| ApiError::Node(format!("{command}: malformed response: {e}")))
    }
}

fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Network(e.to_string())
    }
}

#[async_trait]
impl NodeApi for HttpNode {
    fn url(&self) -> &str {
        &self.settings.url
    }

    async fn get_balances(&self, addresses: &[Hash], threshold: u8) -> Result<Vec<u64>, ApiError> {
        let resp: BalancesResponse = self
            .call(json!({
                "command": "getBalances",
                "addresses": addresses,
                "threshold": threshold,
            }))
            .await?;
        Ok(resp.balances)
    }

    async fn get_node_info(&self) -> Result<NodeInfo, ApiError> {
        self.call(json!({ "command": "getNodeInfo" })).await
    }

    async fn get_transaction_strings(&self, hashes: &[Hash]) -> Result<Vec<TxBytes>, ApiError> {
        let resp: TxsResponse = self
            .call(json!({ "command": "getTransactionStrings", "hashes": hashes }))
            .await?;
        Ok(resp.txs)
    }

    async fn find_transactions(&self, query: &FindQuery) -> Result<Vec<Hash>, ApiError> {
        let mut body = serde_json::to_value(query)
            .map_err(|e| ApiError::InvalidParameters(e.to_string()))?;
        body["command"] = json!("findTransactions");
        let resp: HashesResponse = self.call(body).await?;
        Ok(resp.hashes)
    }

    async fn get_inclusion_states(
        &self,
        hashes: &[Hash],
        tips: &[Hash],
    ) -> Result<Vec<bool>, ApiError> {
        let resp: StatesResponse = self
            .call(json!({
                "command": "getInclusionStates",
                "transactions": hashes,
                "tips": tips,
            }))
            .await?;
        Ok(resp.states)
    }

    async fn get_transactions_to_approve(
        &self,
        depth: u32,
        reference: Option<Hash>,
    ) -> Result<Tips, ApiError> {
        let mut body = json!({ "command": "getTransactionsToApprove", "depth": depth });
        if let Some(reference) = reference {
            body["reference"] = json!(reference);
        }
        self.call(body).await
    }

    async fn attach_to_tangle(
        &self,
        trunk: Hash,
        branch: Hash,
        min_weight_magnitude: u8,
        txs: &[TxBytes],
    ) -> Result<Vec<TxBytes>, ApiError> {
        let resp: TxsResponse = self
            .call(json!({
                "command": "attachToTangle",
                "trunkTransaction": trunk,
                "branchTransaction": branch,
                "minWeightMagnitude": min_weight_magnitude,
                "txs": txs,
            }))
            .await?;
        Ok(resp.txs)
    }

    async fn store_transactions(&self, txs: &[TxBytes]) -> Result<(), ApiError> {
        let _: Empty = self
            .call(json!({ "command": "storeTransactions", "txs": txs }))
            .await?;
        Ok(())
    }

    async fn broadcast_transactions(&self, txs: &[TxBytes]) -> Result<(), ApiError> {
        let _: Empty = self
            .call(json!({ "command": "broadcastTransactions", "txs": txs }))
            .await?;
        Ok(())
    }

    async fn check_consistency(&self, tails: &[Hash]) -> Result<bool, ApiError> {
        let resp: ConsistencyResponse = self
            .call(json!({ "command": "checkConsistency", "tails": tails }))
            .await?;
        if let Some(info) = resp.info.filter(|_| !resp.state) {
            tracing::debug!(url = %self.settings.url, %info, "tails inconsistent");
        }
        Ok(resp.state)
    }

    async fn were_addresses_spent_from(&self, addresses: &[Hash]) -> Result<Vec<bool>, ApiError> {
        let resp: StatesResponse = self
            .call(json!({ "command": "wereAddressesSpentFrom", "addresses": addresses }))
            .await?;
        Ok(resp.states)
    }

    async fn check_attach_to_tangle(&self) -> ProbeResponse {
        let response = match self.send(&json!({ "command": "attachToTangle" })).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(
                    url = %self.settings.url,
                    error = %e,
                    "attachToTangle probe failed"
                );
                return ProbeResponse::unavailable();
            }
        };
        // Nodes answer the argument-less call with an error body and a 4xx
        // status; the body is what matters.
        match response.text().await.map(|text| serde_json::from_str(&text)) {
            Ok(Ok(probe)) => probe,
            _ => ProbeResponse::unavailable(),
        }
    }
}
