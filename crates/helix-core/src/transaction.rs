//! Helix transaction format: the canonical byte layout of a transaction
//! record and its decoded form.
//!
//! `TransactionWire` IS the format. Every field and every size is part of
//! what nodes hash, store and gossip; the transaction hash is BLAKE3 over
//! exactly these bytes. Integers are big-endian so the bytes are the same on
//! every host.
//!
//! The wire struct is #[repr(C, packed)] with zerocopy derives, so decoding
//! is a bounds-checked copy. There is no unsafe code in this module.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::crypto;
use crate::hash::{Hash, HASH_LEN};

// ── Sizes ─────────────────────────────────────────────────────────────────────

/// Signature or message fragment carried by every transaction.
pub const SIGNATURE_FRAGMENT_LEN: usize = 512;

pub const TAG_LEN: usize = 8;

pub const NONCE_LEN: usize = 8;

/// Total canonical size of one transaction.
pub const TX_BYTES_LEN: usize = 744;

/// Byte range of the essence (address through last index) inside the
/// canonical bytes. The bundle hash covers only these bytes, so attaching
/// a bundle never changes its bundle hash.
pub const ESSENCE_OFFSET: usize = SIGNATURE_FRAGMENT_LEN;
pub const ESSENCE_LEN: usize = 96;

const CURRENT_INDEX_OFFSET: usize = ESSENCE_OFFSET + 80;

// ── Wire layout ───────────────────────────────────────────────────────────────

/// Canonical on-wire transaction.
///
/// Wire size: 744 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct TransactionWire {
    /// Input signature, or message payload for outputs.
    pub signature_message_fragment: [u8; SIGNATURE_FRAGMENT_LEN],

    // essence start
    pub address: [u8; 32],
    /// Signed amount. Negative for inputs.
    pub value: [u8; 8],
    pub bundle_nonce: [u8; 32],
    /// Seconds since the unix epoch, set by the assembler.
    pub timestamp: [u8; 8],
    pub current_index: [u8; 8],
    pub last_index: [u8; 8],
    // essence end

    pub bundle: [u8; 32],
    /// Filled by attachment.
    pub trunk: [u8; 32],
    /// Filled by attachment.
    pub branch: [u8; 32],
    pub tag: [u8; TAG_LEN],
    /// Milliseconds since the unix epoch, set by whoever does the PoW.
    pub attachment_timestamp: [u8; 8],
    pub attachment_timestamp_lower: [u8; 8],
    pub attachment_timestamp_upper: [u8; 8],
    pub nonce: [u8; NONCE_LEN],
}

// Compile-time size guard. If this fails, the format has silently changed.
assert_eq_size!(TransactionWire, [u8; TX_BYTES_LEN]);

// ── Canonical bytes ───────────────────────────────────────────────────────────

/// Canonical bytes of one transaction. Always exactly `TX_BYTES_LEN` long.
///
/// This is the form handed to nodes for attachment, storage and broadcast,
/// hex-encoded in JSON.
#[derive(Clone, PartialEq, Eq)]
pub struct TxBytes(Vec<u8>);

impl TxBytes {
    pub fn new(bytes: Vec<u8>) -> Result<Self, WireError> {
        if bytes.len() != TX_BYTES_LEN {
            return Err(WireError::InvalidLength {
                expected: TX_BYTES_LEN,
                got: bytes.len(),
            });
        }
        Ok(Self(bytes))
    }

    pub fn from_hex(s: &str) -> Result<Self, WireError> {
        let bytes = hex::decode(s).map_err(|e| WireError::InvalidHex(e.to_string()))?;
        Self::new(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// BLAKE3 of the canonical bytes.
    pub fn hash(&self) -> Hash {
        crypto::hash(&self.0)
    }

    /// Bundle index, read straight from the bytes without a full decode.
    pub fn current_index(&self) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.0[CURRENT_INDEX_OFFSET..CURRENT_INDEX_OFFSET + 8]);
        u64::from_be_bytes(buf)
    }

    pub fn essence(&self) -> &[u8] {
        &self.0[ESSENCE_OFFSET..ESSENCE_OFFSET + ESSENCE_LEN]
    }
}

impl std::fmt::Debug for TxBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TxBytes(index={}, hash={:?})", self.current_index(), self.hash())
    }
}

impl Serialize for TxBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TxBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TxBytes::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ── Decoded record ────────────────────────────────────────────────────────────

/// A decoded transaction record.
///
/// `hash` is derived from the other fields; after mutating a record call
/// `rehash` (or round-trip through `to_bytes`) before trusting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: Hash,
    #[serde(with = "hex_array")]
    pub signature_message_fragment: [u8; SIGNATURE_FRAGMENT_LEN],
    pub address: Hash,
    pub value: i64,
    pub bundle_nonce: Hash,
    pub timestamp: u64,
    pub current_index: u64,
    pub last_index: u64,
    pub bundle: Hash,
    pub trunk: Hash,
    pub branch: Hash,
    #[serde(with = "hex_array")]
    pub tag: [u8; TAG_LEN],
    pub attachment_timestamp: u64,
    pub attachment_timestamp_lower: u64,
    pub attachment_timestamp_upper: u64,
    #[serde(with = "hex_array")]
    pub nonce: [u8; NONCE_LEN],
}

impl Transaction {
    /// An unattached, unsigned record: everything zero except what is given.
    pub fn unsigned(address: Hash, value: i64, tag: [u8; TAG_LEN], timestamp: u64) -> Self {
        let mut tx = Self {
            hash: Hash::ZERO,
            signature_message_fragment: [0u8; SIGNATURE_FRAGMENT_LEN],
            address,
            value,
            bundle_nonce: Hash::ZERO,
            timestamp,
            current_index: 0,
            last_index: 0,
            bundle: Hash::ZERO,
            trunk: Hash::ZERO,
            branch: Hash::ZERO,
            tag,
            attachment_timestamp: 0,
            attachment_timestamp_lower: 0,
            attachment_timestamp_upper: 0,
            nonce: [0u8; NONCE_LEN],
        };
        tx.rehash();
        tx
    }

    /// Decode canonical bytes. The hash is computed, never trusted from input.
    pub fn from_bytes(bytes: &TxBytes) -> Result<Self, WireError> {
        let wire = TransactionWire::read_from(bytes.as_bytes()).ok_or(WireError::InvalidLength {
            expected: TX_BYTES_LEN,
            got: bytes.as_bytes().len(),
        })?;

        Ok(Self {
            hash: bytes.hash(),
            signature_message_fragment: wire.signature_message_fragment,
            address: Hash(wire.address),
            value: i64::from_be_bytes(wire.value),
            bundle_nonce: Hash(wire.bundle_nonce),
            timestamp: u64::from_be_bytes(wire.timestamp),
            current_index: u64::from_be_bytes(wire.current_index),
            last_index: u64::from_be_bytes(wire.last_index),
            bundle: Hash(wire.bundle),
            trunk: Hash(wire.trunk),
            branch: Hash(wire.branch),
            tag: wire.tag,
            attachment_timestamp: u64::from_be_bytes(wire.attachment_timestamp),
            attachment_timestamp_lower: u64::from_be_bytes(wire.attachment_timestamp_lower),
            attachment_timestamp_upper: u64::from_be_bytes(wire.attachment_timestamp_upper),
            nonce: wire.nonce,
        })
    }

    pub fn to_wire(&self) -> TransactionWire {
        TransactionWire {
            signature_message_fragment: self.signature_message_fragment,
            address: self.address.0,
            value: self.value.to_be_bytes(),
            bundle_nonce: self.bundle_nonce.0,
            timestamp: self.timestamp.to_be_bytes(),
            current_index: self.current_index.to_be_bytes(),
            last_index: self.last_index.to_be_bytes(),
            bundle: self.bundle.0,
            trunk: self.trunk.0,
            branch: self.branch.0,
            tag: self.tag,
            attachment_timestamp: self.attachment_timestamp.to_be_bytes(),
            attachment_timestamp_lower: self.attachment_timestamp_lower.to_be_bytes(),
            attachment_timestamp_upper: self.attachment_timestamp_upper.to_be_bytes(),
            nonce: self.nonce,
        }
    }

    pub fn to_bytes(&self) -> TxBytes {
        TxBytes(self.to_wire().as_bytes().to_vec())
    }

    pub fn compute_hash(&self) -> Hash {
        crypto::hash(self.to_wire().as_bytes())
    }

    pub fn rehash(&mut self) {
        self.hash = self.compute_hash();
    }

    /// Essence bytes: address ‖ value ‖ bundle nonce ‖ timestamp ‖
    /// current index ‖ last index.
    pub fn essence(&self) -> [u8; ESSENCE_LEN] {
        let mut out = [0u8; ESSENCE_LEN];
        out[..HASH_LEN].copy_from_slice(self.address.as_bytes());
        out[32..40].copy_from_slice(&self.value.to_be_bytes());
        out[40..72].copy_from_slice(self.bundle_nonce.as_bytes());
        out[72..80].copy_from_slice(&self.timestamp.to_be_bytes());
        out[80..88].copy_from_slice(&self.current_index.to_be_bytes());
        out[88..96].copy_from_slice(&self.last_index.to_be_bytes());
        out
    }

    pub fn is_tail(&self) -> bool {
        self.current_index == 0
    }

    pub fn is_head(&self) -> bool {
        self.current_index == self.last_index
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },
}

/// Serde helper: fixed-size byte arrays as hex strings.
mod hex_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom(format!("expected {} bytes", N)))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
