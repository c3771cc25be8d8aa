//! Signers: the seed-holding side of the pipeline.
//!
//! A `Signer` turns transfers into signed, unattached bundle bytes and
//! decides where proof-of-work happens. `LocalSigner` does it in-process;
//! `RemoteSigner` hands it to the node.
//!
//! Both wrap a `BundleAssembler`, which owns the seed. The seed is zeroed
//! when the assembler is dropped.

use async_trait::async_trait;

use helix_core::bundle::{bundle_hash, sort_tx_bytes};
use helix_core::crypto::{sign_fragment, Seed};
use helix_core::{pow, AttachedBundle, Hash, Transaction, Transfer, TxBytes};

use crate::error::ApiError;
use crate::queries::now_millis;

/// A funded address the bundle may spend from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub address: Hash,
    pub balance: u64,
    /// Seed index the address was derived at.
    pub key_index: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    pub inputs: Vec<Input>,
    /// Where leftover input balance goes. Defaults to the seed address after
    /// the highest input index.
    pub remainder_address: Option<Hash>,
}

/// What proof-of-work produced: bare attached bytes (batched PoW) or a
/// bundle that already carries its decoded records.
#[derive(Debug, Clone)]
pub enum PowOutput {
    Attached(Vec<TxBytes>),
    Bundle(AttachedBundle),
}

#[async_trait]
pub trait Signer: Send + Sync {
    /// True when the node should do proof-of-work for this signer.
    fn offload_pow(&self) -> bool;

    /// Build and sign a bundle for `transfers`. Returns canonical bytes,
    /// head first.
    async fn prepare_transfers(
        &self,
        transfers: &[Transfer],
        options: &PrepareOptions,
    ) -> Result<Vec<TxBytes>, ApiError>;

    async fn perform_pow(
        &self,
        txs: &[TxBytes],
        trunk: Hash,
        branch: Hash,
        min_weight_magnitude: u8,
    ) -> Result<PowOutput, ApiError>;
}

// ── Assembler ─────────────────────────────────────────────────────────────────

pub struct BundleAssembler {
    seed: Seed,
}

impl BundleAssembler {
    pub fn new(seed: Seed) -> Self {
        Self { seed }
    }

    pub fn address(&self, index: u64) -> Hash {
        self.seed.address(index)
    }

    /// Assemble and sign. `timestamp` is seconds since the unix epoch.
    pub fn assemble(
        &self,
        transfers: &[Transfer],
        options: &PrepareOptions,
        timestamp: u64,
    ) -> Result<Vec<TxBytes>, ApiError> {
        if transfers.is_empty() {
            return Err(ApiError::InvalidParameters("no transfers".into()));
        }

        let mut total: u64 = 0;
        let mut records = Vec::new();
        for transfer in transfers {
            let tag = transfer
                .padded_tag()
                .ok_or_else(|| ApiError::InvalidParameters("tag longer than 8 bytes".into()))?;
            let value = to_signed(transfer.value)?;
            total = total
                .checked_add(transfer.value)
                .ok_or_else(|| ApiError::InvalidParameters("transfer total overflows".into()))?;

            for (i, fragment) in transfer.message_fragments().into_iter().enumerate() {
                let amount = if i == 0 { value } else { 0 };
                let mut tx = Transaction::unsigned(transfer.address, amount, tag, timestamp);
                tx.signature_message_fragment = fragment;
                records.push(tx);
            }
        }

        // Inputs only come into play when value actually moves.
        let mut signed_inputs = Vec::new();
        if total > 0 {
            if options.inputs.is_empty() {
                return Err(ApiError::InvalidParameters("value transfer without inputs".into()));
            }
            let tag = records[0].tag;
            let mut available: u64 = 0;
            for input in &options.inputs {
                if input.address != self.seed.address(input.key_index) {
                    return Err(ApiError::InvalidParameters(format!(
                        "input {} does not belong to this seed",
                        input.address
                    )));
                }
                available = available
                    .checked_add(input.balance)
                    .ok_or_else(|| ApiError::InvalidParameters("input total overflows".into()))?;
                signed_inputs.push((records.len(), input.key_index));
                records.push(Transaction::unsigned(
                    input.address,
                    -to_signed(input.balance)?,
                    tag,
                    timestamp,
                ));
            }

            if available < total {
                return Err(ApiError::InvalidParameters(format!(
                    "insufficient balance: {available} < {total}"
                )));
            }
            let remainder = available - total;
            if remainder > 0 {
                let address = match options.remainder_address {
                    Some(address) => address,
                    None => {
                        let highest = options.inputs.iter().map(|i| i.key_index).max();
                        let next = highest.unwrap_or(0) + 1;
                        self.seed.address(next)
                    }
                };
                records.push(Transaction::unsigned(address, to_signed(remainder)?, tag, timestamp));
            }
        }

        let last_index = (records.len() - 1) as u64;
        for (i, tx) in records.iter_mut().enumerate() {
            tx.current_index = i as u64;
            tx.last_index = last_index;
        }
        let bundle = bundle_hash(&records);
        for tx in &mut records {
            tx.bundle = bundle;
        }
        for (position, key_index) in signed_inputs {
            let key = self.seed.signing_key(key_index);
            sign_fragment(&key, &bundle, &mut records[position].signature_message_fragment);
        }

        tracing::debug!(bundle = %bundle, records = records.len(), "bundle assembled");
        let txs: Vec<TxBytes> = records.iter().map(Transaction::to_bytes).collect();
        Ok(sort_tx_bytes(&txs))
    }
}

fn to_signed(value: u64) -> Result<i64, ApiError> {
    i64::try_from(value)
        .map_err(|_| ApiError::InvalidParameters(format!("value {value} out of range")))
}

// ── Signers ───────────────────────────────────────────────────────────────────

/// Does proof-of-work on a blocking thread in this process.
pub struct LocalSigner {
    assembler: BundleAssembler,
}

impl LocalSigner {
    pub fn new(seed: Seed) -> Self {
        Self {
            assembler: BundleAssembler::new(seed),
        }
    }

    pub fn assembler(&self) -> &BundleAssembler {
        &self.assembler
    }
}

#[async_trait]
impl Signer for LocalSigner {
    fn offload_pow(&self) -> bool {
        false
    }

    async fn prepare_transfers(
        &self,
        transfers: &[Transfer],
        options: &PrepareOptions,
    ) -> Result<Vec<TxBytes>, ApiError> {
        self.assembler.assemble(transfers, options, now_millis() / 1000)
    }

    async fn perform_pow(
        &self,
        txs: &[TxBytes],
        trunk: Hash,
        branch: Hash,
        min_weight_magnitude: u8,
    ) -> Result<PowOutput, ApiError> {
        let txs = txs.to_vec();
        let attached = tokio::task::spawn_blocking(move || {
            pow::attach_bundle(&txs, &trunk, &branch, min_weight_magnitude)
        })
        .await
        .map_err(|e| ApiError::ProofOfWork(e.to_string()))??;
        Ok(PowOutput::Attached(attached))
    }
}

/// Leaves proof-of-work to the node.
pub struct RemoteSigner {
    assembler: BundleAssembler,
}

impl RemoteSigner {
    pub fn new(seed: Seed) -> Self {
        Self {
            assembler: BundleAssembler::new(seed),
        }
    }

    pub fn assembler(&self) -> &BundleAssembler {
        &self.assembler
    }
}

#[async_trait]
impl Signer for RemoteSigner {
    fn offload_pow(&self) -> bool {
        true
    }

    async fn prepare_transfers(
        &self,
        transfers: &[Transfer],
        options: &PrepareOptions,
    ) -> Result<Vec<TxBytes>, ApiError> {
        self.assembler.assemble(transfers, options, now_millis() / 1000)
    }

    async fn perform_pow(
        &self,
        _txs: &[TxBytes],
        _trunk: Hash,
        _branch: Hash,
        _min_weight_magnitude: u8,
    ) -> Result<PowOutput, ApiError> {
        Err(ApiError::ProofOfWork("proof-of-work is offloaded to the node".into()))
    }
}
