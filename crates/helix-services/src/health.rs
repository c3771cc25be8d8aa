//! Node health and capability checks.

use helix_core::config::MAX_MILESTONE_FALLBEHIND;
use helix_core::NodeSettings;

use crate::error::ApiError;
use crate::gateway::{Gateway, NodeInfo, INVALID_PARAMETERS, REMOTE_POW_FEATURE};
use crate::queries::get_node_info;

const PRERELEASE_MARKERS: [&str; 3] = ["rc", "beta", "alpha"];

/// True if the node runs a release build and is close enough to the
/// latest round to be trusted. Otherwise fails with `UnsupportedNode` or
/// `NodeNotSynced`.
pub async fn is_node_healthy(
    gateway: &Gateway,
    settings: Option<&NodeSettings>,
) -> Result<bool, ApiError> {
    let info = get_node_info(gateway, settings).await?;
    check_node_info(&info)
}

/// The synchronous half of `is_node_healthy`.
///
/// The version check comes first, so a pre-release node is rejected no
/// matter how well synced it is.
pub fn check_node_info(info: &NodeInfo) -> Result<bool, ApiError> {
    let version = info.app_version.to_lowercase();
    if PRERELEASE_MARKERS.iter().any(|m| version.contains(m)) {
        return Err(ApiError::UnsupportedNode(info.app_version.clone()));
    }

    let gap = info
        .current_round_index
        .saturating_sub(info.latest_solid_round_index);
    if (0..MAX_MILESTONE_FALLBEHIND).contains(&gap) {
        Ok(true)
    } else {
        Err(ApiError::NodeNotSynced { gap })
    }
}

/// Whether the node will do proof-of-work for us.
///
/// Nodes that advertise features are taken at their word. Older nodes are
/// probed: calling attachToTangle with no arguments answers "invalid
/// parameters" when the endpoint is enabled.
pub async fn allows_remote_pow(
    gateway: &Gateway,
    settings: Option<&NodeSettings>,
) -> Result<bool, ApiError> {
    let info = get_node_info(gateway, settings).await?;
    if let Some(features) = &info.features {
        return Ok(features.iter().any(|f| f == REMOTE_POW_FEATURE));
    }

    let probe = gateway
        .instance(settings, gateway.settings_or_default(settings).request_timeout())
        .check_attach_to_tangle()
        .await;
    let allowed = probe
        .error
        .as_deref()
        .is_some_and(|e| e.to_lowercase().contains(&INVALID_PARAMETERS.to_lowercase()));
    tracing::debug!(allowed, error = ?probe.error, "attachToTangle probe");
    Ok(allowed)
}
