//! Attachment: linking a bundle into the graph and searching nonces.
//!
//! Linking rule, walking from the head (highest index) down to the tail:
//!   head:   trunk = anchor trunk,        branch = anchor branch
//!   others: trunk = hash of the record above, branch = anchor trunk
//!
//! Proof-of-work: a record is accepted once its hash has at least
//! `min_weight_magnitude` leading zero bits. This is CPU-bound; async
//! callers run it on a blocking thread.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::bundle::sort_tx_bytes;
use crate::hash::Hash;
use crate::transaction::{Transaction, TxBytes, WireError};

/// Highest difficulty anyone can ask for. Leading zero bits of a 256-bit hash.
pub const MAX_MIN_WEIGHT_MAGNITUDE: u8 = 64;

/// Link `txs` to `trunk`/`branch` and do proof-of-work on every record.
///
/// `txs` may be in any order. Returns the attached bytes head first.
pub fn attach_bundle(
    txs: &[TxBytes],
    trunk: &Hash,
    branch: &Hash,
    min_weight_magnitude: u8,
) -> Result<Vec<TxBytes>, WireError> {
    let mwm = min_weight_magnitude.min(MAX_MIN_WEIGHT_MAGNITUDE);
    let mut previous: Option<Hash> = None;
    let mut attached = Vec::with_capacity(txs.len());

    for bytes in sort_tx_bytes(txs) {
        let mut tx = Transaction::from_bytes(&bytes)?;
        match previous {
            None => {
                tx.trunk = *trunk;
                tx.branch = *branch;
            }
            Some(above) => {
                tx.trunk = above;
                tx.branch = *trunk;
            }
        }
        tx.attachment_timestamp = now_millis();
        tx.attachment_timestamp_lower = 0;
        tx.attachment_timestamp_upper = u64::MAX;

        search_nonce(&mut tx, mwm);
        previous = Some(tx.hash);
        attached.push(tx.to_bytes());
    }

    Ok(attached)
}

/// Try nonces until the record's hash carries `mwm` leading zero bits.
/// Leaves the winning nonce and hash in `tx`.
pub fn search_nonce(tx: &mut Transaction, mwm: u8) {
    let mut counter: u64 = rand::thread_rng().gen();
    loop {
        tx.nonce = counter.to_be_bytes();
        tx.rehash();
        if meets_difficulty(&tx.hash, mwm) {
            return;
        }
        counter = counter.wrapping_add(1);
    }
}

pub fn meets_difficulty(hash: &Hash, mwm: u8) -> bool {
    hash.leading_zero_bits() >= u32::from(mwm)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
