use crate::*;

use helix_core::bundle::{is_bundle, is_bundle_traversable};
use helix_core::{Hash, Transaction, Transfer};
use helix_services::{
    promote_transaction, queries, replay_bundle, send_transfer, ApiError, FindQuery, Input,
    PrepareOptions, Signer, Stage,
};

fn decode(txs: &[helix_core::TxBytes]) -> Vec<Transaction> {
    txs.iter().map(|tx| Transaction::from_bytes(tx).unwrap()).collect()
}

/// Zero-value send with local proof-of-work lands on the node as a valid,
/// traversable bundle.
#[tokio::test]
async fn test_send_with_local_pow() {
    let node = spawn(FakeState::default()).await.unwrap();
    let gateway = gateway_for(&node);

    let transfer = Transfer::new(Hash([0x0c; 32]), 0).with_message(b"hello helix".to_vec());
    let records = send_transfer(
        &gateway,
        None,
        &local_signer(),
        &[transfer],
        &PrepareOptions::default(),
        DEPTH,
        MWM,
    )
    .await
    .unwrap();

    assert_eq!(records.len(), 1);
    let sent = decode(&node.broadcasted());
    assert!(is_bundle(&sent));
    assert!(is_bundle_traversable(&sent, &TRUNK, &BRANCH));
    assert_eq!(
        node.commands(),
        vec!["getTransactionsToApprove", "storeTransactions", "broadcastTransactions"]
    );
}

/// Value transfer with the node doing the proof-of-work.
#[tokio::test]
async fn test_send_with_remote_pow() {
    let node = spawn(FakeState::default()).await.unwrap();
    let gateway = gateway_for(&node);
    let signer = remote_signer();
    let options = PrepareOptions {
        inputs: vec![Input {
            address: signer.assembler().address(0),
            balance: 250,
            key_index: 0,
        }],
        remainder_address: None,
    };

    let records = send_transfer(
        &gateway,
        None,
        &signer,
        &[Transfer::new(Hash([0x0d; 32]), 100)],
        &options,
        DEPTH,
        MWM,
    )
    .await
    .unwrap();

    // output, input, remainder
    assert_eq!(records.len(), 3);
    assert!(is_bundle(&records));
    assert!(is_bundle_traversable(&records, &TRUNK, &BRANCH));

    let state = node.state.lock().unwrap();
    let sent_indices: Vec<u64> =
        state.attach_inputs[0].iter().map(|tx| tx.current_index()).collect();
    assert_eq!(sent_indices, vec![2, 1, 0]);
}

/// A node with attachToTangle switched off stops the send at the attach
/// stage with a dedicated error, and nothing is broadcast.
#[tokio::test]
async fn test_send_to_node_without_attach_endpoint() {
    let mut state = FakeState::default();
    state.remote_pow = false;
    let node = spawn(state).await.unwrap();
    let gateway = gateway_for(&node);

    let err = send_transfer(
        &gateway,
        None,
        &remote_signer(),
        &[Transfer::new(Hash([0x0e; 32]), 0)],
        &PrepareOptions::default(),
        DEPTH,
        MWM,
    )
    .await
    .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Attach));
    assert!(matches!(err.root(), ApiError::AttachToTangleUnavailable));
    assert!(node.broadcasted().is_empty());
}

/// Promotion asks for tips that approve the promoted transaction and
/// resolves to its hash.
#[tokio::test]
async fn test_promote_after_send() {
    let node = spawn(FakeState::default()).await.unwrap();
    let gateway = gateway_for(&node);
    let signer = local_signer();

    let records = send_transfer(
        &gateway,
        None,
        &signer,
        &[Transfer::promotion()],
        &PrepareOptions::default(),
        DEPTH,
        MWM,
    )
    .await
    .unwrap();
    let tail = records.last().unwrap().hash;

    let promoted = promote_transaction(&gateway, None, &signer, tail, DEPTH, MWM, None)
        .await
        .unwrap();

    assert_eq!(promoted, tail);
    let references = node.state.lock().unwrap().tip_references.clone();
    assert_eq!(references, vec![None, Some(tail)]);
    assert_eq!(node.broadcasted().len(), 2);
}

/// A node rejecting broadcast stops promotion and the error names the stage.
#[tokio::test]
async fn test_promote_reports_failing_stage() {
    let mut state = FakeState::default();
    state.failing.insert("broadcastTransactions".into());
    let node = spawn(state).await.unwrap();
    let gateway = gateway_for(&node);
    let signer = local_signer();

    // seed the node with something to promote
    let txs = signer
        .prepare_transfers(&[Transfer::promotion()], &PrepareOptions::default())
        .await
        .unwrap();
    let attached = helix_core::pow::attach_bundle(&txs, &TRUNK, &BRANCH, MWM).unwrap();
    let tail = attached.last().unwrap().hash();
    helix_services::store_and_broadcast(&gateway, None, attached)
        .await
        .unwrap_err();

    let err = promote_transaction(&gateway, None, &signer, tail, DEPTH, MWM, None)
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Broadcast));
    assert!(err.to_string().starts_with("broadcast failed"), "{err}");
}

#[tokio::test]
async fn test_get_bundle_and_replay() {
    let node = spawn(FakeState::default()).await.unwrap();
    let gateway = gateway_for(&node);
    let signer = local_signer();
    let options = PrepareOptions {
        inputs: vec![Input {
            address: signer.assembler().address(0),
            balance: 40,
            key_index: 0,
        }],
        remainder_address: None,
    };

    let sent = send_transfer(
        &gateway,
        None,
        &signer,
        &[Transfer::new(Hash([0x0e; 32]), 40)],
        &options,
        DEPTH,
        MWM,
    )
    .await
    .unwrap();
    let tail = sent.last().unwrap().hash;

    let fetched = queries::get_bundle(&gateway, None, &tail).await.unwrap();
    assert_eq!(fetched.len(), 2);
    assert_eq!(fetched[0].hash, tail);

    let replayed = replay_bundle(&gateway, None, &signer, tail, DEPTH, MWM).await.unwrap();
    assert_eq!(replayed.len(), 2);
    assert_eq!(replayed[0].bundle, sent[0].bundle);
    assert_ne!(replayed.last().unwrap().hash, tail);

    let query = FindQuery {
        bundles: vec![sent[0].bundle],
        ..FindQuery::default()
    };
    let all = queries::find_transaction_objects(&gateway, None, &query).await.unwrap();
    assert_eq!(all.len(), 4);
}

#[tokio::test]
async fn test_replay_unknown_tail_fails_at_fetch() {
    let node = spawn(FakeState::default()).await.unwrap();
    let gateway = gateway_for(&node);
    let err = replay_bundle(&gateway, None, &local_signer(), Hash([0x99; 32]), DEPTH, MWM)
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::FetchBundle));
    assert!(matches!(err.root(), ApiError::Node(_)));
}
