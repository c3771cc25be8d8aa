use crate::*;

use helix_core::Hash;
use helix_services::{queries, ApiError};

const ADDRESS: Hash = Hash([0x42; 32]);

async fn node_with_balance(balance: u64) -> FakeNode {
    let mut state = FakeState::default();
    state.balances.insert(ADDRESS, balance);
    spawn(state).await.unwrap()
}

fn quorum_gateway(
    primary: &FakeNode,
    members: Vec<String>,
    threshold: u8,
) -> helix_services::Gateway {
    let mut config = config_for(&primary.url);
    config.quorum.enabled = true;
    config.quorum.nodes = members;
    config.quorum.threshold_percent = threshold;
    helix_services::Gateway::from_config(&config)
}

#[tokio::test]
async fn test_quorum_balances_agree() {
    let a = node_with_balance(300).await;
    let b = node_with_balance(300).await;
    let c = node_with_balance(300).await;
    let gateway = quorum_gateway(&a, vec![a.url.clone(), b.url.clone(), c.url.clone()], 67);

    let balances = queries::get_balances(&gateway, None, true, &[ADDRESS], 100)
        .await
        .unwrap();
    assert_eq!(balances, vec![300]);
    for node in [&a, &b, &c] {
        assert_eq!(node.commands(), vec!["getBalances".to_string()]);
    }
}

#[tokio::test]
async fn test_quorum_tolerates_one_dead_node() {
    let a = node_with_balance(300).await;
    let b = node_with_balance(300).await;
    let dead = closed_url().await.unwrap();
    let gateway = quorum_gateway(&a, vec![a.url.clone(), b.url.clone(), dead], 60);

    let balances = queries::get_balances(&gateway, None, true, &[ADDRESS], 100)
        .await
        .unwrap();
    assert_eq!(balances, vec![300]);
}

#[tokio::test]
async fn test_quorum_rejects_split_answers() {
    let a = node_with_balance(300).await;
    let b = node_with_balance(200).await;
    let c = node_with_balance(100).await;
    let gateway = quorum_gateway(&a, vec![a.url.clone(), b.url.clone(), c.url.clone()], 67);

    let err = queries::get_balances(&gateway, None, true, &[ADDRESS], 100)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::QuorumNotReached(_)), "{err}");

    // the same read without the quorum trusts the primary
    let balances = queries::get_balances(&gateway, None, false, &[ADDRESS], 100)
        .await
        .unwrap();
    assert_eq!(balances, vec![300]);
}

#[tokio::test]
async fn test_quorum_spent_and_inclusion() {
    let mut spent_state = FakeState::default();
    spent_state.spent.insert(ADDRESS);
    let a = spawn(spent_state).await.unwrap();
    let mut spent_state = FakeState::default();
    spent_state.spent.insert(ADDRESS);
    let b = spawn(spent_state).await.unwrap();
    let gateway = quorum_gateway(&a, vec![a.url.clone(), b.url.clone()], 100);

    let spent = queries::were_addresses_spent_from(&gateway, None, true, &[ADDRESS, Hash([1; 32])])
        .await
        .unwrap();
    assert_eq!(spent, vec![true, false]);

    let included = queries::get_latest_inclusion(&gateway, None, true, &[Hash([2; 32])])
        .await
        .unwrap();
    assert_eq!(included, vec![false]);
}
