//! Error type for everything that talks to a node.

use std::fmt;

use helix_core::{Hash, WireError};

/// Pipeline stages, named in errors so a failure says where it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CheckPromotable,
    FetchBundle,
    PrepareTransfers,
    SelectTips,
    Attach,
    Broadcast,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::CheckPromotable => "promotability check",
            Stage::FetchBundle => "bundle fetch",
            Stage::PrepareTransfers => "transfer preparation",
            Stage::SelectTips => "tip selection",
            Stage::Attach => "proof-of-work",
            Stage::Broadcast => "broadcast",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    /// The node answered with an error of its own.
    #[error("node error: {0}")]
    Node(String),

    #[error("unsupported node version {0}")]
    UnsupportedNode(String),

    #[error("node not synced (round gap {gap})")]
    NodeNotSynced { gap: i64 },

    #[error("invalid bundle constructed with local proof-of-work")]
    InvalidBundleLocalPow,

    #[error("invalid bundle constructed with remote proof-of-work")]
    InvalidBundleRemotePow,

    #[error("invalid bundle at tail {0}")]
    InvalidBundle(Hash),

    #[error("attachToTangle is not available on this node")]
    AttachToTangleUnavailable,

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("transaction {0} is not promotable")]
    NotPromotable(Hash),

    #[error("quorum not reached: {0}")]
    QuorumNotReached(String),

    #[error("proof-of-work failed: {0}")]
    ProofOfWork(String),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        source: Box<ApiError>,
    },
}

impl ApiError {
    /// The innermost error, with stage annotations peeled off.
    pub fn root(&self) -> &ApiError {
        match self {
            ApiError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// The outermost stage this error was reported from, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ApiError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), ApiError::Timeout)
    }
}

/// Tag a failed result with the stage it came from.
pub trait StageExt<T> {
    fn at(self, stage: Stage) -> Result<T, ApiError>;
}

impl<T> StageExt<T> for Result<T, ApiError> {
    fn at(self, stage: Stage) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::Stage {
            stage,
            source: Box::new(e),
        })
    }
}
