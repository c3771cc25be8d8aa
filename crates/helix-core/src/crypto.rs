//! Cryptographic primitives for Helix.
//!
//! Provides two things:
//!   1. BLAKE3 hashing: transaction hashes, bundle hashes, proof-of-work
//!   2. Seed handling: address and input-signing key derivation
//!
//! Seeds derive ZeroizeOnDrop: wiped from memory when dropped.
//! There is no unsafe code in this module.

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::hash::Hash;

/// Context strings for BLAKE3 derive-key mode. Changing either one changes
/// every address and signature a seed produces.
const ADDRESS_CONTEXT: &str = "helix 2019-06-01 address derivation";
const SIGNING_CONTEXT: &str = "helix 2019-06-01 input signing key";

// ── BLAKE3 ────────────────────────────────────────────────────────────────────

/// Hash a byte slice, returning a 32-byte BLAKE3 digest.
pub fn hash(data: &[u8]) -> Hash {
    Hash(*blake3::hash(data).as_bytes())
}

/// Incremental BLAKE3 hasher. The bundle hash is built by feeding it one
/// transaction essence at a time.
///
/// # Example
/// ```
/// use helix_core::crypto::Hasher;
/// let mut h = Hasher::new();
/// h.update(b"hello ");
/// h.update(b"world");
/// let digest = h.finalize();
/// assert_eq!(digest, helix_core::crypto::hash(b"hello world"));
/// ```
pub struct Hasher(blake3::Hasher);

impl Hasher {
    pub fn new() -> Self {
        Self(blake3::Hasher::new())
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub fn finalize(self) -> Hash {
        Hash(*self.0.finalize().as_bytes())
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

// ── Seed ──────────────────────────────────────────────────────────────────────

/// A wallet seed. Every address and input-signing key is derived from it.
///
/// The raw bytes never leave this struct.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: Zeroizing<[u8; 32]>,
}

impl Seed {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Parse a seed from 64 hex characters.
    pub fn from_hex(s: &str) -> Option<Self> {
        let decoded = Zeroizing::new(hex::decode(s.trim()).ok()?);
        let arr: [u8; 32] = decoded.as_slice().try_into().ok()?;
        Some(Self::from_bytes(arr))
    }

    /// Address at `index`.
    ///
    ///   address = BLAKE3-derive-key(ADDRESS_CONTEXT, seed || index_be)
    pub fn address(&self, index: u64) -> Hash {
        Hash(blake3::derive_key(ADDRESS_CONTEXT, &self.material(index)[..]))
    }

    /// Key that signs inputs spent from the address at `index`.
    pub fn signing_key(&self, index: u64) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(blake3::derive_key(SIGNING_CONTEXT, &self.material(index)[..]))
    }

    fn material(&self, index: u64) -> Zeroizing<[u8; 40]> {
        let mut material = Zeroizing::new([0u8; 40]);
        material[..32].copy_from_slice(&self.bytes[..]);
        material[32..].copy_from_slice(&index.to_be_bytes());
        material
    }
}

/// Fill `fragment` with the signature of `bundle` under `key`.
///
/// The signature is the keyed-BLAKE3 XOF stream of the bundle hash, so it
/// covers every essence in the bundle and fills the fragment regardless of
/// its length.
pub fn sign_fragment(key: &[u8; 32], bundle: &Hash, fragment: &mut [u8]) {
    let mut hasher = blake3::Hasher::new_keyed(key);
    hasher.update(bundle.as_bytes());
    hasher.finalize_xof().fill(fragment);
}
