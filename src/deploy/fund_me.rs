use async_trait::async_trait;
use common::DeploymentRecord;
use ethers::abi::Token;
use ethers::types::Address;
use log::{debug, info, warn};

use super::{DeployEnvironment, DeployOptions, DeployScript};
use crate::contracts::{FUND_ME, MOCK_V3_AGGREGATOR};
use crate::error::Result;

/// FundMe wired to the network's ETH/USD price feed
pub struct DeployFundMe;

#[async_trait]
impl DeployScript for DeployFundMe {
    fn id(&self) -> &str {
        "01_deploy_FundMe"
    }

    fn tags(&self) -> &[&str] {
        &["all", "fundme"]
    }

    async fn run(&self, env: &mut DeployEnvironment) -> Result<()> {
        deploy_fund_me(env).await?;
        Ok(())
    }
}

/// Price feed FundMe is constructed with
///
/// Development networks use the mock deployment; every other network needs
/// an entry with a feed in the network table.
pub fn resolve_price_feed(env: &DeployEnvironment) -> Result<Address> {
    if env.is_development() {
        return Ok(env.get(MOCK_V3_AGGREGATOR)?.address);
    }
    env.table().price_feed(env.network().chain_id)
}

/// Deploy FundMe, then publish its source on public networks
///
/// Verification problems are logged and never fail the deployment.
pub async fn deploy_fund_me(env: &mut DeployEnvironment) -> Result<DeploymentRecord> {
    let price_feed = resolve_price_feed(env)?;
    let deployer = env.deployer().await?;
    let confirmations = env.network().block_confirmations;

    info!(
        "Deploying FundMe on {} with price feed {:?}",
        env.network_name(),
        price_feed
    );
    let options = DeployOptions::new(deployer)
        .args(vec![Token::Address(price_feed)])
        .confirmations(confirmations);
    let record = env.deploy(FUND_ME, options).await?;

    if env.is_development() {
        debug!("Skipping verification on development network {}", env.network_name());
    } else {
        match env.verifier() {
            Some(verifier) => {
                let artifact = env.artifacts().get(&record.contract_name)?;
                match verifier.verify(artifact, &record).await {
                    Ok(status) => info!("Verification of {:?}: {:?}", record.address, status),
                    Err(e) => warn!("Verification of {:?} failed: {:#}", record.address, e),
                }
            }
            None => debug!("No verification API key configured, skipping verification"),
        }
    }

    info!("FundMe deployed at {:?}", record.address);
    Ok(record)
}
