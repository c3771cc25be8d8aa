//! Read-only node queries.
//!
//! Every function takes the gateway plus optional `NodeSettings`: `None`
//! means the default node. The reads that can be cross-checked
//! (balances, spent-from, inclusion) take a `with_quorum` flag that routes
//! them through the quorum instead.

use std::time::{SystemTime, UNIX_EPOCH};

use helix_core::bundle::is_bundle;
use helix_core::config::{api_timeout, MAX_PROMOTION_AGE};
use helix_core::{Hash, NodeSettings, Transaction};

use crate::error::ApiError;
use crate::gateway::{FindQuery, Gateway, NodeApi, NodeInfo};
use crate::quorum;

pub async fn get_balances(
    gateway: &Gateway,
    settings: Option<&NodeSettings>,
    with_quorum: bool,
    addresses: &[Hash],
    threshold: u8,
) -> Result<Vec<u64>, ApiError> {
    if with_quorum {
        return quorum::get_balances(gateway, addresses, threshold).await;
    }
    gateway
        .instance(settings, api_timeout("getBalances"))
        .get_balances(addresses, threshold)
        .await
}

pub async fn were_addresses_spent_from(
    gateway: &Gateway,
    settings: Option<&NodeSettings>,
    with_quorum: bool,
    addresses: &[Hash],
) -> Result<Vec<bool>, ApiError> {
    if with_quorum {
        return quorum::were_addresses_spent_from(gateway, addresses).await;
    }
    gateway
        .instance(settings, api_timeout("wereAddressesSpentFrom"))
        .were_addresses_spent_from(addresses)
        .await
}

/// Whether each transaction is confirmed, by the node's latest view.
pub async fn get_latest_inclusion(
    gateway: &Gateway,
    settings: Option<&NodeSettings>,
    with_quorum: bool,
    hashes: &[Hash],
) -> Result<Vec<bool>, ApiError> {
    if with_quorum {
        return quorum::get_latest_inclusion(gateway, hashes).await;
    }
    gateway
        .instance(settings, api_timeout("getInclusionStates"))
        .get_inclusion_states(hashes, &[])
        .await
}

pub async fn get_node_info(
    gateway: &Gateway,
    settings: Option<&NodeSettings>,
) -> Result<NodeInfo, ApiError> {
    gateway
        .instance(settings, api_timeout("getNodeInfo"))
        .get_node_info()
        .await
}

/// Fetch and decode transactions. Output order follows `hashes`.
pub async fn get_transaction_objects(
    gateway: &Gateway,
    settings: Option<&NodeSettings>,
    hashes: &[Hash],
) -> Result<Vec<Transaction>, ApiError> {
    let node = gateway.instance(settings, api_timeout("getTransactionStrings"));
    fetch_transactions(node.as_ref(), hashes).await
}

pub async fn find_transactions(
    gateway: &Gateway,
    settings: Option<&NodeSettings>,
    query: &FindQuery,
) -> Result<Vec<Hash>, ApiError> {
    if query.is_empty() {
        return Err(ApiError::InvalidParameters("empty findTransactions query".into()));
    }
    gateway
        .instance(settings, api_timeout("findTransactions"))
        .find_transactions(query)
        .await
}

pub async fn find_transaction_objects(
    gateway: &Gateway,
    settings: Option<&NodeSettings>,
    query: &FindQuery,
) -> Result<Vec<Transaction>, ApiError> {
    let hashes = find_transactions(gateway, settings, query).await?;
    if hashes.is_empty() {
        return Ok(Vec::new());
    }
    get_transaction_objects(gateway, settings, &hashes).await
}

/// A tail can be promoted while the node still considers it consistent and
/// it was attached recently enough to be picked up by tip selection.
pub async fn is_promotable(
    gateway: &Gateway,
    settings: Option<&NodeSettings>,
    tail: &Hash,
) -> Result<bool, ApiError> {
    let node = gateway.instance(settings, api_timeout("checkConsistency"));
    if !node.check_consistency(std::slice::from_ref(tail)).await? {
        tracing::debug!(tail = %tail, "tail inconsistent, not promotable");
        return Ok(false);
    }

    let records = fetch_transactions(node.as_ref(), std::slice::from_ref(tail)).await?;
    let Some(record) = records.first() else {
        return Ok(false);
    };
    let age_ms = now_millis().saturating_sub(record.attachment_timestamp);
    Ok(u128::from(age_ms) < MAX_PROMOTION_AGE.as_millis())
}

/// Fetch the bundle a tail transaction starts, by following trunk links.
///
/// Returns the records tail first. Fails with `InvalidBundle` when the
/// chain is broken or the records do not form a valid bundle.
pub async fn get_bundle(
    gateway: &Gateway,
    settings: Option<&NodeSettings>,
    tail: &Hash,
) -> Result<Vec<Transaction>, ApiError> {
    let node = gateway.instance(settings, api_timeout("getTransactionStrings"));

    let mut current = fetch_one(node.as_ref(), tail).await?;
    if !current.is_tail() {
        return Err(ApiError::InvalidParameters(format!("{tail} is not a tail transaction")));
    }

    let bundle = current.bundle;
    let last_index = current.last_index;
    let mut records = Vec::new();
    loop {
        let done = current.is_head();
        let next = current.trunk;
        records.push(current);
        if done {
            break;
        }
        if records.len() as u64 > last_index {
            return Err(ApiError::InvalidBundle(*tail));
        }
        current = fetch_one(node.as_ref(), &next).await?;
        if current.bundle != bundle || current.current_index != records.len() as u64 {
            return Err(ApiError::InvalidBundle(*tail));
        }
    }

    if !is_bundle(&records) {
        return Err(ApiError::InvalidBundle(*tail));
    }
    Ok(records)
}

async fn fetch_one(node: &dyn NodeApi, hash: &Hash) -> Result<Transaction, ApiError> {
    let mut records = fetch_transactions(node, std::slice::from_ref(hash)).await?;
    records
        .pop()
        .ok_or_else(|| ApiError::Node(format!("transaction {hash} not found")))
}

/// getTransactionStrings plus decoding. Checks that the node returned
/// exactly the transactions asked for.
async fn fetch_transactions(
    node: &dyn NodeApi,
    hashes: &[Hash],
) -> Result<Vec<Transaction>, ApiError> {
    let txs = node.get_transaction_strings(hashes).await?;
    if txs.len() != hashes.len() {
        return Err(ApiError::Node(format!(
            "asked for {} transactions, got {}",
            hashes.len(),
            txs.len()
        )));
    }

    let mut records = Vec::with_capacity(txs.len());
    for (bytes, hash) in txs.iter().zip(hashes) {
        let record = Transaction::from_bytes(bytes)?;
        if record.hash != *hash {
            return Err(ApiError::Node(format!("node returned {} for {}", record.hash, hash)));
        }
        records.push(record);
    }
    Ok(records)
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
