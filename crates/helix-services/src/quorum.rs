//! Quorum reads: ask several nodes the same question and only accept an
//! answer enough of them agree on.
//!
//! Only read-only queries go through here (balances, spent-from status,
//! inclusion). Writes always go to a single node.
//!
//! Agreement is per element: for each position in the answer, the most
//! common value must be reported by at least `required()` nodes. Nodes
//! that fail, time out or return an answer of the wrong length do not
//! vote.

use std::future::Future;

use futures::future::join_all;

use helix_core::config::{api_timeout, DEFAULT_BALANCES_THRESHOLD};
use helix_core::{Hash, NodeSettings};

use crate::error::ApiError;
use crate::gateway::{Gateway, NodeHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quorum {
    nodes: Vec<NodeSettings>,
    threshold_percent: u8,
}

impl Quorum {
    pub fn new(nodes: Vec<NodeSettings>, threshold_percent: u8) -> Self {
        Self {
            nodes,
            threshold_percent: threshold_percent.min(100),
        }
    }

    pub fn nodes(&self) -> &[NodeSettings] {
        &self.nodes
    }

    /// Votes needed: `ceil(size × threshold / 100)`, never less than one.
    pub fn required(&self) -> usize {
        let size = self.nodes.len() * usize::from(self.threshold_percent);
        size.div_ceil(100).max(1)
    }
}

pub async fn get_balances(
    gateway: &Gateway,
    addresses: &[Hash],
    threshold: u8,
) -> Result<Vec<u64>, ApiError> {
    let threshold = if threshold == 0 { DEFAULT_BALANCES_THRESHOLD } else { threshold };
    let answers = fan_out(gateway, "getBalances", |node| async move {
        node.get_balances(addresses, threshold).await
    })
    .await;
    agree(gateway.quorum(), answers, addresses.len())
}

pub async fn were_addresses_spent_from(
    gateway: &Gateway,
    addresses: &[Hash],
) -> Result<Vec<bool>, ApiError> {
    let answers = fan_out(gateway, "wereAddressesSpentFrom", |node| async move {
        node.were_addresses_spent_from(addresses).await
    })
    .await;
    agree(gateway.quorum(), answers, addresses.len())
}

pub async fn get_latest_inclusion(
    gateway: &Gateway,
    hashes: &[Hash],
) -> Result<Vec<bool>, ApiError> {
    let answers = fan_out(gateway, "getInclusionStates", |node| async move {
        node.get_inclusion_states(hashes, &[]).await
    })
    .await;
    agree(gateway.quorum(), answers, hashes.len())
}

/// Run `call` against every quorum node at once. Failures are logged and
/// dropped.
async fn fan_out<T, F, Fut>(gateway: &Gateway, method: &str, call: F) -> Vec<Vec<T>>
where
    F: Fn(NodeHandle) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ApiError>>,
{
    let timeout = api_timeout(method);
    let requests = gateway.quorum().nodes().iter().map(|settings| {
        let node = gateway.instance(Some(settings), timeout);
        let url = settings.url.clone();
        let request = call(node);
        async move { (url, request.await) }
    });

    join_all(requests)
        .await
        .into_iter()
        .filter_map(|(url, result)| match result {
            Ok(answer) => Some(answer),
            Err(e) => {
                tracing::warn!(%url, method, error = %e, "quorum node failed");
                None
            }
        })
        .collect()
}

/// Element-wise agreement across `answers`.
pub(crate) fn agree<T>(
    quorum: &Quorum,
    answers: Vec<Vec<T>>,
    len: usize,
) -> Result<Vec<T>, ApiError>
where
    T: Clone + PartialEq,
{
    let required = quorum.required();
    let answers: Vec<Vec<T>> = answers.into_iter().filter(|a| a.len() == len).collect();
    if answers.len() < required {
        return Err(ApiError::QuorumNotReached(format!(
            "{} of {} nodes answered, {} needed",
            answers.len(),
            quorum.nodes().len(),
            required
        )));
    }

    let mut result = Vec::with_capacity(len);
    for position in 0..len {
        // (value, votes) in order of first appearance
        let mut tally: Vec<(&T, usize)> = Vec::new();
        for answer in &answers {
            let value = &answer[position];
            match tally.iter_mut().find(|(v, _)| *v == value) {
                Some((_, votes)) => *votes += 1,
                None => tally.push((value, 1)),
            }
        }
        let best = tally.iter().max_by_key(|(_, votes)| *votes);
        match best {
            Some((value, votes)) if *votes >= required => result.push((*value).clone()),
            _ => {
                return Err(ApiError::QuorumNotReached(format!(
                    "no agreement on element {position}"
                )))
            }
        }
    }

    Ok(result)
}
