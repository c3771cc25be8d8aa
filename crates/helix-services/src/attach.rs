//! Attachment engine: links a prepared bundle into the graph and gets
//! proof-of-work done on it, locally or by the node.
//!
//! Whichever side did the work, the result is only accepted once it passes
//! `is_bundle` and is traversable from the trunk/branch it was attached to.

use helix_core::bundle::{
    construct_bundle_from_attached, is_bundle, is_bundle_traversable, sort_tx_bytes,
};
use helix_core::config::{api_timeout, MAX_REQUEST_ATTEMPTS};
use helix_core::{AttachedBundle, Hash, NodeSettings, Transaction, TxBytes};

use crate::error::ApiError;
use crate::gateway::{Gateway, ATTACH_TO_TANGLE_UNAVAILABLE};
use crate::signer::{PowOutput, Signer};
use crate::timeouts::with_request_timeouts;

pub async fn attach_to_tangle(
    gateway: &Gateway,
    settings: Option<&NodeSettings>,
    signer: &dyn Signer,
    trunk: Hash,
    branch: Hash,
    txs: &[TxBytes],
    min_weight_magnitude: u8,
) -> Result<AttachedBundle, ApiError> {
    if txs.is_empty() {
        return Err(ApiError::InvalidParameters("nothing to attach".into()));
    }

    if signer.offload_pow() {
        let bundle =
            attach_remote(gateway, settings, trunk, branch, txs, min_weight_magnitude).await?;
        if !accepts(&bundle.transactions, &trunk, &branch) {
            return Err(ApiError::InvalidBundleRemotePow);
        }
        tracing::info!(trunk = %trunk, records = bundle.txs.len(), "bundle attached remotely");
        return Ok(bundle);
    }

    let bundle = match signer.perform_pow(txs, trunk, branch, min_weight_magnitude).await? {
        PowOutput::Bundle(bundle) => bundle,
        PowOutput::Attached(attached) => AttachedBundle {
            transactions: construct_bundle_from_attached(&sort_tx_bytes(&attached))?,
            txs: attached,
        },
    };
    if !accepts(&bundle.transactions, &trunk, &branch) {
        return Err(ApiError::InvalidBundleLocalPow);
    }
    tracing::info!(trunk = %trunk, records = bundle.txs.len(), "bundle attached locally");
    Ok(bundle)
}

/// Offload to the node, retrying timeouts with a widening window. Each
/// attempt gets a fresh handle whose client timeout matches the window.
async fn attach_remote(
    gateway: &Gateway,
    settings: Option<&NodeSettings>,
    trunk: Hash,
    branch: Hash,
    txs: &[TxBytes],
    min_weight_magnitude: u8,
) -> Result<AttachedBundle, ApiError> {
    let settings = gateway.settings_or_default(settings);
    let sorted = sort_tx_bytes(txs);

    let base = api_timeout("attachToTangle");
    let attached = with_request_timeouts(base, MAX_REQUEST_ATTEMPTS, |window| {
        let node = gateway.instance(Some(settings), window);
        let sorted = &sorted;
        async move {
            node.attach_to_tangle(trunk, branch, min_weight_magnitude, sorted)
                .await
        }
    })
    .await
    .map_err(endpoint_unavailable)?;

    Ok(AttachedBundle {
        transactions: construct_bundle_from_attached(&attached)?,
        txs: attached,
    })
}

/// Nodes with the endpoint switched off reject the command outright.
fn endpoint_unavailable(err: ApiError) -> ApiError {
    match err {
        ApiError::Node(message)
            if message
                .to_ascii_lowercase()
                .contains(&ATTACH_TO_TANGLE_UNAVAILABLE.to_ascii_lowercase()) =>
        {
            ApiError::AttachToTangleUnavailable
        }
        other => other,
    }
}

fn accepts(records: &[Transaction], trunk: &Hash, branch: &Hash) -> bool {
    is_bundle(records) && is_bundle_traversable(records, trunk, branch)
}
