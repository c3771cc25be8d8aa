//! In-memory node and signer doubles shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use helix_core::bundle::construct_bundle_from_attached;
use helix_core::crypto::Seed;
use helix_core::{pow, AttachedBundle, Hash, NodeSettings, Transaction, Transfer, TxBytes};

use crate::error::ApiError;
use crate::gateway::{
    Connector, FindQuery, Gateway, NodeApi, NodeHandle, NodeInfo, ProbeResponse, Tips,
    INVALID_PARAMETERS,
};
use crate::signer::{BundleAssembler, Input, PowOutput, PrepareOptions, Signer};

pub(crate) const PRIMARY: &str = "mock://primary";

// ── Mock node ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MockState {
    calls: Vec<&'static str>,
    store: HashMap<Hash, TxBytes>,
    attach_timeouts: u32,
    tip_requests: Vec<(u32, Option<Hash>)>,
    attach_inputs: Vec<Vec<TxBytes>>,
    broadcasted: Vec<TxBytes>,
    probes: usize,
}

pub(crate) struct MockNode {
    url: String,
    reachable: bool,
    info: NodeInfo,
    balances: HashMap<Hash, u64>,
    spent: HashSet<Hash>,
    consistent: bool,
    failing: HashSet<&'static str>,
    probe: ProbeResponse,
    corrupt_attach: bool,
    attach_disabled: bool,
    tips: Tips,
    state: Mutex<MockState>,
}

impl MockNode {
    pub(crate) fn healthy() -> Self {
        Self {
            url: String::new(),
            reachable: true,
            info: NodeInfo {
                app_name: "helix".into(),
                app_version: "1.0.0".into(),
                current_round_index: 100,
                latest_solid_round_index: 100,
                features: None,
            },
            balances: HashMap::new(),
            spent: HashSet::new(),
            consistent: true,
            failing: HashSet::new(),
            probe: ProbeResponse {
                error: Some(INVALID_PARAMETERS.into()),
            },
            corrupt_attach: false,
            attach_disabled: false,
            tips: Tips {
                trunk: Hash([0x71; 32]),
                branch: Hash([0x72; 32]),
            },
            state: Mutex::new(MockState::default()),
        }
    }

    pub(crate) fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::healthy()
        }
    }

    pub(crate) fn with_balance(mut self, address: Hash, balance: u64) -> Self {
        self.balances.insert(address, balance);
        self
    }

    pub(crate) fn with_spent(mut self, address: Hash) -> Self {
        self.spent.insert(address);
        self
    }

    pub(crate) fn with_consistency(mut self, consistent: bool) -> Self {
        self.consistent = consistent;
        self
    }

    pub(crate) fn failing(mut self, command: &'static str) -> Self {
        self.failing.insert(command);
        self
    }

    pub(crate) fn with_stored(mut self, txs: &[TxBytes]) -> Self {
        let state = self.state.get_mut().unwrap();
        for tx in txs {
            state.store.insert(tx.hash(), tx.clone());
        }
        self
    }

    pub(crate) fn attach_timeouts(mut self, count: u32) -> Self {
        self.state.get_mut().unwrap().attach_timeouts = count;
        self
    }

    pub(crate) fn corrupt_attach(mut self) -> Self {
        self.corrupt_attach = true;
        self
    }

    /// attachToTangle rejected the way nodes with the command switched off do.
    pub(crate) fn attach_disabled(mut self) -> Self {
        self.attach_disabled = true;
        self
    }

    pub(crate) fn with_rounds(mut self, current: i64, solid: i64) -> Self {
        self.info.current_round_index = current;
        self.info.latest_solid_round_index = solid;
        self
    }

    pub(crate) fn with_features(mut self, features: Vec<String>) -> Self {
        self.info.features = Some(features);
        self
    }

    pub(crate) fn with_probe(mut self, probe: ProbeResponse) -> Self {
        self.probe = probe;
        self
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn last_tip_request(&self) -> Option<(u32, Option<Hash>)> {
        self.state.lock().unwrap().tip_requests.last().copied()
    }

    pub(crate) fn last_attach_input(&self) -> Vec<TxBytes> {
        self.state.lock().unwrap().attach_inputs.last().cloned().unwrap_or_default()
    }

    pub(crate) fn broadcasted(&self) -> Vec<TxBytes> {
        self.state.lock().unwrap().broadcasted.clone()
    }

    pub(crate) fn probes(&self) -> usize {
        self.state.lock().unwrap().probes
    }

    pub(crate) fn tips(&self) -> Tips {
        self.tips
    }

    fn record(&self, command: &'static str) -> Result<(), ApiError> {
        if !self.reachable {
            return Err(ApiError::Network(format!("{} unreachable", self.url)));
        }
        self.state.lock().unwrap().calls.push(command);
        if self.failing.contains(command) {
            return Err(ApiError::Node(format!("{command} rejected")));
        }
        Ok(())
    }
}

#[async_trait]
impl NodeApi for MockNode {
    fn url(&self) -> &str {
        &self.url
    }

    async fn get_balances(&self, addresses: &[Hash], _threshold: u8) -> Result<Vec<u64>, ApiError> {
        self.record("getBalances")?;
        Ok(addresses
            .iter()
            .map(|a| self.balances.get(a).copied().unwrap_or(0))
            .collect())
    }

    async fn get_node_info(&self) -> Result<NodeInfo, ApiError> {
        self.record("getNodeInfo")?;
        Ok(self.info.clone())
    }

    async fn get_transaction_strings(&self, hashes: &[Hash]) -> Result<Vec<TxBytes>, ApiError> {
        self.record("getTransactionStrings")?;
        let state = self.state.lock().unwrap();
        Ok(hashes.iter().filter_map(|h| state.store.get(h).cloned()).collect())
    }

    async fn find_transactions(&self, query: &FindQuery) -> Result<Vec<Hash>, ApiError> {
        self.record("findTransactions")?;
        let state = self.state.lock().unwrap();
        let mut hashes = Vec::new();
        for (hash, bytes) in &state.store {
            let tx = Transaction::from_bytes(bytes)?;
            if query.bundles.contains(&tx.bundle) || query.addresses.contains(&tx.address) {
                hashes.push(*hash);
            }
        }
        Ok(hashes)
    }

    async fn get_inclusion_states(
        &self,
        hashes: &[Hash],
        _tips: &[Hash],
    ) -> Result<Vec<bool>, ApiError> {
        self.record("getInclusionStates")?;
        let state = self.state.lock().unwrap();
        Ok(hashes.iter().map(|h| state.store.contains_key(h)).collect())
    }

    async fn get_transactions_to_approve(
        &self,
        depth: u32,
        reference: Option<Hash>,
    ) -> Result<Tips, ApiError> {
        self.record("getTransactionsToApprove")?;
        self.state.lock().unwrap().tip_requests.push((depth, reference));
        Ok(self.tips)
    }

    async fn attach_to_tangle(
        &self,
        trunk: Hash,
        branch: Hash,
        min_weight_magnitude: u8,
        txs: &[TxBytes],
    ) -> Result<Vec<TxBytes>, ApiError> {
        self.record("attachToTangle")?;
        if self.attach_disabled {
            return Err(ApiError::Node(
                "COMMAND attachToTangle is not available on this node".into(),
            ));
        }
        {
            let mut state = self.state.lock().unwrap();
            state.attach_inputs.push(txs.to_vec());
            if state.attach_timeouts > 0 {
                state.attach_timeouts -= 1;
                return Err(ApiError::Timeout);
            }
        }

        let mut attached = pow::attach_bundle(txs, &trunk, &branch, min_weight_magnitude)?;
        if self.corrupt_attach {
            // re-point the tail somewhere else; the bundle hash still checks out
            if let Some(tail) = attached.last_mut() {
                let mut tx = Transaction::from_bytes(tail)?;
                tx.trunk = Hash([0xee; 32]);
                *tail = tx.to_bytes();
            }
        }
        Ok(attached)
    }

    async fn store_transactions(&self, txs: &[TxBytes]) -> Result<(), ApiError> {
        self.record("storeTransactions")?;
        let mut state = self.state.lock().unwrap();
        for tx in txs {
            state.store.insert(tx.hash(), tx.clone());
        }
        Ok(())
    }

    async fn broadcast_transactions(&self, txs: &[TxBytes]) -> Result<(), ApiError> {
        self.record("broadcastTransactions")?;
        self.state.lock().unwrap().broadcasted.extend_from_slice(txs);
        Ok(())
    }

    async fn check_consistency(&self, _tails: &[Hash]) -> Result<bool, ApiError> {
        self.record("checkConsistency")?;
        Ok(self.consistent)
    }

    async fn were_addresses_spent_from(&self, addresses: &[Hash]) -> Result<Vec<bool>, ApiError> {
        self.record("wereAddressesSpentFrom")?;
        Ok(addresses.iter().map(|a| self.spent.contains(a)).collect())
    }

    async fn check_attach_to_tangle(&self) -> ProbeResponse {
        if !self.reachable {
            return ProbeResponse::unavailable();
        }
        self.state.lock().unwrap().probes += 1;
        self.probe.clone()
    }
}

// ── Mock connector ────────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct MockConnector {
    nodes: Mutex<HashMap<String, Arc<MockNode>>>,
    connects: Mutex<Vec<(String, Duration)>>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, url: &str, mut node: MockNode) -> Arc<MockNode> {
        node.url = url.to_string();
        let node = Arc::new(node);
        self.nodes.lock().unwrap().insert(url.to_string(), Arc::clone(&node));
        node
    }

    pub(crate) fn connects(&self) -> Vec<(String, Duration)> {
        self.connects.lock().unwrap().clone()
    }
}

impl Connector for MockConnector {
    fn connect(&self, settings: &NodeSettings, timeout: Duration) -> NodeHandle {
        self.connects.lock().unwrap().push((settings.url.clone(), timeout));
        match self.nodes.lock().unwrap().get(&settings.url) {
            Some(node) => Arc::clone(node) as NodeHandle,
            None => {
                let mut node = MockNode::unreachable();
                node.url = settings.url.clone();
                Arc::new(node)
            }
        }
    }
}

/// Gateway whose default node (and single-member quorum) is `node`.
pub(crate) fn gateway_for(node: MockNode) -> (Gateway, Arc<MockNode>) {
    let connector = MockConnector::new();
    let node = connector.register(PRIMARY, node);
    let gateway = Gateway::new(NodeSettings::new(PRIMARY), Arc::new(connector));
    (gateway, node)
}

// ── Bundles ───────────────────────────────────────────────────────────────────

fn test_assembler() -> BundleAssembler {
    BundleAssembler::new(Seed::from_bytes([3; 32]))
}

/// Signed, unattached three-record bundle (60 + 40 out, 100 in), head first.
pub(crate) fn prepared() -> Vec<TxBytes> {
    let assembler = test_assembler();
    let transfers = [
        Transfer::new(Hash([0x0a; 32]), 60),
        Transfer::new(Hash([0x0b; 32]), 40),
    ];
    let options = PrepareOptions {
        inputs: vec![Input {
            address: assembler.address(0),
            balance: 100,
            key_index: 0,
        }],
        remainder_address: None,
    };
    assembler
        .assemble(&transfers, &options, crate::queries::now_millis() / 1000)
        .unwrap()
}

/// `prepared()` after local proof-of-work against `trunk`/`branch`.
pub(crate) fn attached_bundle(trunk: Hash, branch: Hash) -> AttachedBundle {
    let txs = pow::attach_bundle(&prepared(), &trunk, &branch, 1).unwrap();
    AttachedBundle {
        transactions: construct_bundle_from_attached(&txs).unwrap(),
        txs,
    }
}

// ── Test signer ───────────────────────────────────────────────────────────────

/// Signer that funds value transfers from its own address 0 when the caller
/// supplies no inputs, so pipelines can be driven with plain transfers.
pub(crate) struct TestSigner {
    assembler: BundleAssembler,
    offload: bool,
    full_bundle: bool,
    swap_anchors: bool,
}

impl TestSigner {
    pub(crate) fn local() -> Self {
        Self {
            assembler: test_assembler(),
            offload: false,
            full_bundle: false,
            swap_anchors: false,
        }
    }

    pub(crate) fn remote() -> Self {
        Self {
            offload: true,
            ..Self::local()
        }
    }

    pub(crate) fn returning_bundle(mut self) -> Self {
        self.full_bundle = true;
        self
    }

    pub(crate) fn with_wrong_anchors(mut self) -> Self {
        self.swap_anchors = true;
        self
    }

    pub(crate) fn address(&self, index: u64) -> Hash {
        self.assembler.address(index)
    }
}

#[async_trait]
impl Signer for TestSigner {
    fn offload_pow(&self) -> bool {
        self.offload
    }

    async fn prepare_transfers(
        &self,
        transfers: &[Transfer],
        options: &PrepareOptions,
    ) -> Result<Vec<TxBytes>, ApiError> {
        let total: u64 = transfers.iter().map(|t| t.value).sum();
        let mut options = options.clone();
        if total > 0 && options.inputs.is_empty() {
            options.inputs.push(Input {
                address: self.assembler.address(0),
                balance: total,
                key_index: 0,
            });
        }
        self.assembler
            .assemble(transfers, &options, crate::queries::now_millis() / 1000)
    }

    async fn perform_pow(
        &self,
        txs: &[TxBytes],
        trunk: Hash,
        branch: Hash,
        min_weight_magnitude: u8,
    ) -> Result<PowOutput, ApiError> {
        if self.offload {
            return Err(ApiError::ProofOfWork("offloaded".into()));
        }
        let (trunk, branch) = if self.swap_anchors { (branch, trunk) } else { (trunk, branch) };
        let attached = pow::attach_bundle(txs, &trunk, &branch, min_weight_magnitude)?;
        if !self.full_bundle {
            return Ok(PowOutput::Attached(attached));
        }
        Ok(PowOutput::Bundle(AttachedBundle {
            transactions: construct_bundle_from_attached(&attached)?,
            txs: attached,
        }))
    }
}
