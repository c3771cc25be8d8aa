//! helix-services: the network-facing side of a Helix wallet.
//!
//! Everything here goes through a `Gateway`: queries, quorum reads, tip
//! selection, attachment, broadcast and the promote / replay / send
//! pipelines built from them.

pub mod attach;
pub mod broadcast;
pub mod error;
pub mod gateway;
pub mod health;
pub mod http_node;
pub mod queries;
pub mod quorum;
pub mod signer;
pub mod timeouts;
pub mod tips;

#[cfg(test)]
mod testing;

pub use attach::attach_to_tangle;
pub use broadcast::{promote_transaction, replay_bundle, send_transfer, store_and_broadcast};
pub use error::{ApiError, Stage};
pub use gateway::{
    Connector, FindQuery, Gateway, NodeApi, NodeHandle, NodeInfo, ProbeResponse, Tips,
};
pub use health::{allows_remote_pow, check_node_info, is_node_healthy};
pub use http_node::{HttpConnector, HttpNode};
pub use quorum::Quorum;
pub use signer::{
    BundleAssembler, Input, LocalSigner, PowOutput, PrepareOptions, RemoteSigner, Signer,
};
pub use timeouts::with_request_timeouts;
pub use tips::get_transactions_to_approve;
