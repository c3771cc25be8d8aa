//! helix-core: shared types, transaction format, bundle validation and
//! proof-of-work. All other Helix crates depend on this one.

pub mod bundle;
pub mod config;
pub mod crypto;
pub mod hash;
pub mod pow;
pub mod transaction;
pub mod transfer;

pub use bundle::{is_bundle, is_bundle_traversable, AttachedBundle};
pub use config::{api_timeout, HelixConfig, NodeSettings};
pub use hash::Hash;
pub use transaction::{Transaction, TxBytes, WireError};
pub use transfer::Transfer;
