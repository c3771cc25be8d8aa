//! Bundles: atomic, hash-chained groups of transactions.
//!
//! Everything here is pure and synchronous. `is_bundle` and
//! `is_bundle_traversable` are the only gate for accepting proof-of-work
//! output, whether it was computed locally or by a node.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::crypto::Hasher;
use crate::hash::Hash;
use crate::transaction::{Transaction, TxBytes, WireError};

/// A bundle after attachment: the canonical bytes as attached, and the
/// records decoded from them, head (highest index) first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedBundle {
    pub txs: Vec<TxBytes>,
    pub transactions: Vec<Transaction>,
}

impl AttachedBundle {
    pub fn tail(&self) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.is_tail())
    }

    pub fn bundle_hash(&self) -> Option<Hash> {
        self.transactions.first().map(|tx| tx.bundle)
    }
}

/// Bundle hash over the essences of `records`, taken in index order.
/// Input order does not matter.
pub fn bundle_hash(records: &[Transaction]) -> Hash {
    let mut ordered: Vec<&Transaction> = records.iter().collect();
    ordered.sort_by_key(|tx| tx.current_index);

    let mut hasher = Hasher::new();
    for tx in ordered {
        hasher.update(&tx.essence());
    }
    hasher.finalize()
}

/// Order canonical bytes head first (descending bundle index).
///
/// Nodes expect attachment input in this order; callers may hand bytes
/// over in any order. The sort is stable.
pub fn sort_tx_bytes(txs: &[TxBytes]) -> Vec<TxBytes> {
    let mut sorted = txs.to_vec();
    sorted.sort_by(|a, b| b.current_index().cmp(&a.current_index()));
    sorted
}

/// Decode attached bytes into records, head first.
///
/// The result is the same whatever order `txs` arrives in.
pub fn construct_bundle_from_attached(txs: &[TxBytes]) -> Result<Vec<Transaction>, WireError> {
    let mut transactions = txs
        .iter()
        .map(Transaction::from_bytes)
        .collect::<Result<Vec<_>, _>>()?;
    transactions.sort_by(|a, b| b.current_index.cmp(&a.current_index));
    Ok(transactions)
}

/// Structural validity of a bundle.
///
/// True when the records are non-empty, carry indices 0..=last_index
/// exactly once, all agree on `last_index`, all declare the bundle hash
/// recomputed from their essences, and their values sum to exactly zero.
pub fn is_bundle(records: &[Transaction]) -> bool {
    if records.is_empty() {
        return false;
    }

    let mut ordered: Vec<&Transaction> = records.iter().collect();
    ordered.sort_by_key(|tx| tx.current_index);

    let last_index = (records.len() - 1) as u64;
    let expected_bundle = bundle_hash(records);
    let mut total: i128 = 0;

    for (position, tx) in ordered.iter().enumerate() {
        if tx.current_index != position as u64 || tx.last_index != last_index {
            return false;
        }
        if tx.bundle != expected_bundle {
            return false;
        }
        total += i128::from(tx.value);
    }

    total == 0
}

/// True when the records form one trunk-linked chain anchored at
/// `trunk`/`branch`.
///
/// Starting at the tail, every non-head record must reference the next
/// record's hash as its trunk and the anchor `trunk` as its branch. The head
/// must reference `trunk` and `branch` directly. The walk is bounded by the
/// bundle length, so cycles and missing links both fail.
pub fn is_bundle_traversable(records: &[Transaction], trunk: &Hash, branch: &Hash) -> bool {
    let by_hash: HashMap<Hash, &Transaction> = records.iter().map(|tx| (tx.hash, tx)).collect();
    if by_hash.len() != records.len() {
        return false;
    }

    let Some(mut current) = records.iter().find(|tx| tx.is_tail()) else {
        return false;
    };
    let mut visited = HashSet::new();

    for step in 0..records.len() {
        if !visited.insert(current.hash) {
            return false;
        }
        if current.is_head() {
            return step + 1 == records.len()
                && current.trunk == *trunk
                && current.branch == *branch;
        }
        if current.branch != *trunk {
            return false;
        }
        let Some(&next) = by_hash.get(&current.trunk) else {
            return false;
        };
        if next.current_index != current.current_index + 1 {
            return false;
        }
        current = next;
    }

    false
}
