//! Tip selection.

use helix_core::config::api_timeout;
use helix_core::{Hash, NodeSettings};

use crate::error::ApiError;
use crate::gateway::{Gateway, Tips};

/// Ask the node for a trunk/branch pair to attach to.
///
/// Without a reference (or with the zero hash) the node picks freely. With
/// one, the tips it returns must approve the reference, which is how a
/// promotion pulls a stalled transaction along.
pub async fn get_transactions_to_approve(
    gateway: &Gateway,
    settings: Option<&NodeSettings>,
    reference: Option<&Hash>,
    depth: u32,
) -> Result<Tips, ApiError> {
    let reference = reference.filter(|h| !h.is_zero()).copied();
    let tips = gateway
        .instance(settings, api_timeout("getTransactionsToApprove"))
        .get_transactions_to_approve(depth, reference)
        .await?;
    tracing::debug!(trunk = %tips.trunk, branch = %tips.branch, depth, "tips selected");
    Ok(tips)
}
