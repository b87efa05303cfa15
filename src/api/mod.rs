// Deploy runner API
//
// Entry point used by the CLI: turns a `DeployConfig` and a network name into
// a ready `DeployEnvironment`, and summarises a network into a report.

mod config;
mod report;
mod types;

pub use config::*;
pub use report::*;
pub use types::*;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{info, warn};

use crate::chain::ChainClient;
use crate::contracts::{ArtifactStore, FUND_ME};
use crate::deploy::{DeployEnvironment, Deployments, SourceVerifier};
use crate::devnet::LocalChain;
use crate::error::{DeployError, Result};
use crate::ethereum::EthereumConnector;

/// Polling interval for confirmations on RPC networks
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Connect to `network` and load artifacts and previous deployments
///
/// Every check here happens before anything is sent to the chain.
pub async fn prepare(config: &DeployConfig, network: &str) -> Result<DeployEnvironment> {
    let settings = config.network(network)?;

    let client: Arc<dyn ChainClient> = if settings.in_process {
        Arc::new(LocalChain::with_chain_id(settings.chain_id))
    } else {
        let url = settings.url.as_deref().ok_or_else(|| {
            DeployError::Config(format!("network {} has no RPC URL", settings.name))
        })?;
        Arc::new(EthereumConnector::connect(url, &settings.accounts, Some(POLL_INTERVAL)).await?)
    };

    let actual = client.chain_id().await?;
    if actual != settings.chain_id {
        return Err(DeployError::ChainIdMismatch {
            name: settings.name.clone(),
            expected: settings.chain_id,
            actual,
        });
    }

    let mut artifacts = ArtifactStore::builtin()?;
    if let Some(dir) = config.artifacts_path() {
        let loaded = artifacts.load_dir(&dir)?;
        info!("Loaded {} artifacts from {}", loaded, dir.display());
    }
    if !settings.in_process && !artifacts.get(FUND_ME)?.has_bytecode() {
        warn!(
            "No compiled FundMe artifact loaded; deploying to {} needs Hardhat artifacts (artifactsDir)",
            settings.name
        );
    }

    let mut env = DeployEnvironment::new(settings.clone(), client, artifacts)
        .with_named_accounts(config.named_accounts.clone());
    // Fail on a misconfigured deployer before any script runs
    env.deployer().await?;

    if settings.save_deployments {
        let dir = config.deployments_path(&settings.name);
        let deployments = Deployments::load_dir(&dir)?;
        if !deployments.is_empty() {
            info!("Loaded {} deployments from {}", deployments.len(), dir.display());
        }
        env = env.with_deployments(deployments).with_deployments_dir(dir);
    }

    match SourceVerifier::from_settings(&config.etherscan, &settings.name) {
        Ok(Some(verifier)) => env = env.with_verifier(verifier),
        Ok(None) => {}
        Err(e) => warn!("Verification disabled: {:#}", e),
    }

    Ok(env)
}

/// Summarise the deployments on the environment's network
pub async fn report(env: &DeployEnvironment) -> Result<DeploymentReport> {
    let deployer = env.deployer().await?;

    let funding = match env.deployments().find(FUND_ME) {
        Some(_) => Some(env.fund_me(deployer)?.snapshot(&[]).await?),
        None => None,
    };

    Ok(DeploymentReport {
        timestamp: Utc::now(),
        network: env.network_name().to_string(),
        chain_id: env.client().chain_id().await?,
        deployer,
        deployments: env
            .deployments()
            .iter()
            .map(|(name, record)| ReportEntry {
                name: name.clone(),
                record: record.clone(),
            })
            .collect(),
        funding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_prepare_in_process() {
        let config = DeployConfig::default();
        let mut env = prepare(&config, HARDHAT).await.unwrap();
        assert!(env.is_development());
        assert!(env.verifier().is_none());

        env.run(&["all"]).await.unwrap();
        let report = report(&env).await.unwrap();
        assert_eq!(report.chain_id, 31337);
        assert_eq!(report.deployments.len(), 2);

        let funding = report.funding.unwrap();
        assert_eq!(funding.owner, report.deployer);
        assert!(funding.funders.is_empty());
    }

    #[tokio::test]
    async fn test_prepare_unknown_network() {
        let config = DeployConfig::default();
        assert!(matches!(
            prepare(&config, "mainnet").await,
            Err(DeployError::UnknownNetwork(_))
        ));
    }

    #[tokio::test]
    async fn test_prepare_custom_in_process_network() {
        let mut settings = NetworkSettings::hardhat();
        settings.name = "devnet".to_string();
        settings.chain_id = 1337;
        let config = ConfigManager::builder().network(settings).build();

        let env = prepare(&config, "devnet").await.unwrap();
        assert_eq!(env.client().chain_id().await.unwrap(), 1337);
        assert!(!env.is_development());
    }

    #[tokio::test]
    async fn test_prepare_missing_url() {
        let mut settings = NetworkSettings::remote("staging", 5, "http://unused");
        settings.url = None;
        let config = ConfigManager::builder().network(settings).build();

        let err = prepare(&config, "staging").await.err().unwrap();
        assert!(matches!(err, DeployError::Config(_)));
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_prepare_loads_artifacts_dir() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("contracts").join("FundMe.sol");
        std::fs::create_dir_all(&nested).unwrap();
        let builtin = ArtifactStore::builtin().unwrap();
        let artifact = serde_json::json!({
            "contractName": "FundMe",
            "sourceName": "contracts/FundMe.sol",
            "abi": builtin.get(FUND_ME).unwrap().abi,
            "bytecode": "0x6080"
        });
        std::fs::write(nested.join("FundMe.json"), artifact.to_string()).unwrap();

        let config = ConfigManager::builder().artifacts_dir(dir.path()).build();
        assert_eq!(config.artifacts_path(), Some(dir.path().to_path_buf()));

        let env = prepare(&config, HARDHAT).await.unwrap();
        assert!(env.artifacts().get(FUND_ME).unwrap().has_bytecode());
    }

    #[test]
    fn test_default_artifacts_dir_only_when_present() {
        // The crate root has no Hardhat build output
        assert_eq!(DeployConfig::default().artifacts_path(), None);
    }

    #[tokio::test]
    async fn test_prepare_missing_deployer() {
        let dir = tempdir().unwrap();
        let config = ConfigManager::builder()
            .named_account("deployer", 50)
            .deployments_dir(dir.path())
            .build();

        assert!(matches!(
            prepare(&config, HARDHAT).await,
            Err(DeployError::MissingAccount(_))
        ));
    }
}
