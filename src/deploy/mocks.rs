use async_trait::async_trait;
use common::DeploymentRecord;
use ethers::abi::Token;
use ethers::types::{I256, U256};
use log::info;

use super::{DeployEnvironment, DeployOptions, DeployScript};
use crate::contracts::MOCK_V3_AGGREGATOR;
use crate::error::Result;
use crate::ethereum::chain::{DECIMALS, INITIAL_ANSWER};

/// Mock price feed for development networks
pub struct DeployMocks;

#[async_trait]
impl DeployScript for DeployMocks {
    fn id(&self) -> &str {
        "00_deploy_mocks"
    }

    fn tags(&self) -> &[&str] {
        &["all", "mocks"]
    }

    async fn run(&self, env: &mut DeployEnvironment) -> Result<()> {
        deploy_mocks(env, DECIMALS, I256::from(INITIAL_ANSWER)).await?;
        Ok(())
    }
}

/// Deploy `MockV3Aggregator(decimals, initial_answer)` on development networks
///
/// Returns `None` without touching the chain anywhere else.
pub async fn deploy_mocks(
    env: &mut DeployEnvironment,
    decimals: u8,
    initial_answer: I256,
) -> Result<Option<DeploymentRecord>> {
    if !env.is_development() {
        info!(
            "{} is not a development network, skipping mocks",
            env.network_name()
        );
        return Ok(None);
    }

    info!("Local network detected! Deploying mocks...");
    let deployer = env.deployer().await?;
    let options = DeployOptions::new(deployer)
        .contract(MOCK_V3_AGGREGATOR)
        .args(vec![
            Token::Uint(U256::from(decimals)),
            Token::Int(initial_answer.into_raw()),
        ]);

    let record = env.deploy(MOCK_V3_AGGREGATOR, options).await?;
    info!("Mocks deployed!");
    Ok(Some(record))
}
