//! Persisting bundles, and the composite pipelines built on top:
//! promote, replay and send.
//!
//! Each pipeline is a straight sequence of stages. Every stage hands its
//! result to the next as a plain value; the first failure stops the
//! sequence and comes back tagged with the stage that failed.

use helix_core::{Hash, NodeSettings, Transaction, Transfer, TxBytes};

use crate::attach::attach_to_tangle;
use crate::error::{ApiError, Stage, StageExt};
use crate::gateway::Gateway;
use crate::queries::{get_bundle, is_promotable};
use crate::signer::{PrepareOptions, Signer};
use crate::tips::get_transactions_to_approve;

/// Store on the node, then broadcast to its neighbours. Returns `txs`.
pub async fn store_and_broadcast(
    gateway: &Gateway,
    settings: Option<&NodeSettings>,
    txs: Vec<TxBytes>,
) -> Result<Vec<TxBytes>, ApiError> {
    let node = gateway.instance(settings, gateway.settings_or_default(settings).request_timeout());
    node.store_transactions(&txs).await?;
    node.broadcast_transactions(&txs).await?;
    tracing::info!(url = node.url(), records = txs.len(), "bundle broadcast");
    Ok(txs)
}

/// Attach a zero-value bundle whose tips approve `hash`, nudging a stalled
/// transaction towards confirmation. Resolves to `hash`.
///
/// `transfer` defaults to `Transfer::promotion()`.
pub async fn promote_transaction(
    gateway: &Gateway,
    settings: Option<&NodeSettings>,
    signer: &dyn Signer,
    hash: Hash,
    depth: u32,
    min_weight_magnitude: u8,
    transfer: Option<Transfer>,
) -> Result<Hash, ApiError> {
    let transfer = transfer.unwrap_or_else(Transfer::promotion);

    if !is_promotable(gateway, settings, &hash).await.at(Stage::CheckPromotable)? {
        return Err::<Hash, _>(ApiError::NotPromotable(hash)).at(Stage::CheckPromotable);
    }

    let txs = signer
        .prepare_transfers(&[transfer], &PrepareOptions::default())
        .await
        .at(Stage::PrepareTransfers)?;

    let tips = get_transactions_to_approve(gateway, settings, Some(&hash), depth)
        .await
        .at(Stage::SelectTips)?;

    let attached = attach_to_tangle(
        gateway,
        settings,
        signer,
        tips.trunk,
        tips.branch,
        &txs,
        min_weight_magnitude,
    )
    .await
    .at(Stage::Attach)?;

    store_and_broadcast(gateway, settings, attached.txs)
        .await
        .at(Stage::Broadcast)?;

    tracing::info!(hash = %hash, "transaction promoted");
    Ok(hash)
}

/// Re-attach an existing bundle on fresh tips. Resolves to the newly
/// attached records, head first.
pub async fn replay_bundle(
    gateway: &Gateway,
    settings: Option<&NodeSettings>,
    signer: &dyn Signer,
    tail: Hash,
    depth: u32,
    min_weight_magnitude: u8,
) -> Result<Vec<Transaction>, ApiError> {
    let bundle = get_bundle(gateway, settings, &tail).await.at(Stage::FetchBundle)?;
    let txs: Vec<TxBytes> = bundle.iter().map(Transaction::to_bytes).collect();

    let tips = get_transactions_to_approve(gateway, settings, None, depth)
        .await
        .at(Stage::SelectTips)?;

    let attached = attach_to_tangle(
        gateway,
        settings,
        signer,
        tips.trunk,
        tips.branch,
        &txs,
        min_weight_magnitude,
    )
    .await
    .at(Stage::Attach)?;

    store_and_broadcast(gateway, settings, attached.txs)
        .await
        .at(Stage::Broadcast)?;

    tracing::info!(tail = %tail, "bundle replayed");
    Ok(attached.transactions)
}

/// Prepare, attach and broadcast a new bundle. Resolves to its records,
/// head first.
pub async fn send_transfer(
    gateway: &Gateway,
    settings: Option<&NodeSettings>,
    signer: &dyn Signer,
    transfers: &[Transfer],
    options: &PrepareOptions,
    depth: u32,
    min_weight_magnitude: u8,
) -> Result<Vec<Transaction>, ApiError> {
    let txs = signer
        .prepare_transfers(transfers, options)
        .await
        .at(Stage::PrepareTransfers)?;

    let tips = get_transactions_to_approve(gateway, settings, None, depth)
        .await
        .at(Stage::SelectTips)?;

    let attached = attach_to_tangle(
        gateway,
        settings,
        signer,
        tips.trunk,
        tips.branch,
        &txs,
        min_weight_magnitude,
    )
    .await
    .at(Stage::Attach)?;

    store_and_broadcast(gateway, settings, attached.txs)
        .await
        .at(Stage::Broadcast)?;

    if let Some(tail) = attached.transactions.last() {
        tracing::info!(tail = %tail.hash, bundle = %tail.bundle, "transfer sent");
    }
    Ok(attached.transactions)
}
