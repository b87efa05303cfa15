// Deployment errors
//
// Configuration problems are raised before any transaction is sent; chain
// failures are wrapped unchanged so callers can still inspect reverts.

use thiserror::Error;

use crate::chain::ChainError;

#[derive(Debug, Error)]
pub enum DeployError {
    /// The network table has no entry for the chain
    #[error("no network configuration for chain id {0}")]
    MissingNetworkConfig(u64),

    /// The chain is known but has no price feed to wire into FundMe
    #[error("network {name} (chain id {chain_id}) has no ETH/USD price feed configured")]
    UnconfiguredNetwork { name: String, chain_id: u64 },

    /// The runner configuration does not define the requested network
    #[error("unknown network {0}")]
    UnknownNetwork(String),

    /// The node answered with a different chain id than configured
    #[error("network {name} is configured for chain id {expected} but the node reports {actual}")]
    ChainIdMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error("no deployment named {0}")]
    MissingDeployment(String),

    #[error("no artifact for contract {0}")]
    MissingArtifact(String),

    #[error("invalid artifact: {0}")]
    Artifact(String),

    /// A named account index points past the available accounts
    #[error("named account {0} is not available on this network")]
    MissingAccount(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeployError {
    /// True for errors raised before anything was sent to the chain
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DeployError::MissingNetworkConfig(_)
                | DeployError::UnconfiguredNetwork { .. }
                | DeployError::UnknownNetwork(_)
                | DeployError::ChainIdMismatch { .. }
                | DeployError::MissingArtifact(_)
                | DeployError::Artifact(_)
                | DeployError::MissingAccount(_)
                | DeployError::Config(_)
        )
    }
}

pub type Result<T, E = DeployError> = std::result::Result<T, E>;
