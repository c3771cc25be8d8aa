//! Helix integration test harness.
//!
//! Every test starts its own fake node on a loopback port and drives the
//! library through the real HTTP client:
//!
//!   cargo test --test integration
//!
//! Proof-of-work runs at difficulty 1 so the tests stay fast.

mod pipeline;
mod quorum;

pub use fake_node::*;

use helix_core::crypto::Seed;
use helix_core::HelixConfig;
use helix_services::{Gateway, LocalSigner, RemoteSigner};

// ── Harness ───────────────────────────────────────────────────────────────────

pub const SEED: [u8; 32] = [0x5e; 32];

pub const MWM: u8 = 1;

pub const DEPTH: u32 = 3;

pub fn config_for(url: &str) -> HelixConfig {
    let mut config = HelixConfig::default();
    config.node.url = url.to_string();
    config.attachment.min_weight_magnitude = MWM;
    config
}

pub fn gateway_for(node: &FakeNode) -> Gateway {
    Gateway::from_config(&config_for(&node.url))
}

pub fn local_signer() -> LocalSigner {
    LocalSigner::new(Seed::from_bytes(SEED))
}

pub fn remote_signer() -> RemoteSigner {
    RemoteSigner::new(Seed::from_bytes(SEED))
}

/// The fake node answers on a port the OS picked.
#[tokio::test]
async fn test_fake_node_listens() {
    let node = spawn(FakeState::default()).await.expect("fake node should start");
    assert!(node.url.starts_with("http://127.0.0.1:"));
    let info = helix_services::queries::get_node_info(&gateway_for(&node), None)
        .await
        .expect("node info over http");
    assert_eq!(info.app_name, "helix");
}
