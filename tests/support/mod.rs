// Shared setup for the integration tests
//
// Every test gets its own in-process chain with the full stack deployed
// through the `all` fixture, the way the deploy scripts leave a development
// network.

#![allow(dead_code)]

use std::fs;

use ethers::types::{Address, U256};
use fundme_deploy::api::EtherscanSettings;
use fundme_deploy::contracts::{FundMeContract, PriceFeedContract};
use fundme_deploy::{ChainClient, DeployEnvironment};
use mockito::ServerGuard;
use tempfile::{tempdir, TempDir};

pub struct Harness {
    pub env: DeployEnvironment,
    pub deployer: Address,
    pub accounts: Vec<Address>,
    pub fund_me: FundMeContract,
    pub price_feed: PriceFeedContract,
}

/// Fresh development chain with the `all` fixture applied
pub async fn setup() -> Harness {
    let mut env = DeployEnvironment::in_process().unwrap();
    env.fixture(&["all"]).await.unwrap();

    let deployer = env.deployer().await.unwrap();
    let accounts = env.accounts().await.unwrap();
    let fund_me = env.fund_me(deployer).unwrap();
    let price_feed = env.price_feed(deployer).unwrap();

    Harness {
        env,
        deployer,
        accounts,
        fund_me,
        price_feed,
    }
}

/// One ether in wei
pub fn send_value() -> U256 {
    U256::exp10(18)
}

/// Smallest contribution accepted at the initial mock price, 50 USD at 2000 USD/ETH
pub fn minimum_value() -> U256 {
    U256::from(25) * U256::exp10(15)
}

/// Source tree holding `contracts/FundMe.sol`
pub fn source_tree() -> TempDir {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("contracts")).unwrap();
    fs::write(dir.path().join("contracts/FundMe.sol"), "contract FundMe {}").unwrap();
    dir
}

/// Verification settings that publish `sources` through `server`
pub fn etherscan_settings(server: &ServerGuard, sources: &TempDir) -> EtherscanSettings {
    EtherscanSettings {
        api_key: Some("key".to_string()),
        api_url: Some(format!("{}/api", server.url())),
        sources_root: sources.path().to_path_buf(),
        ..EtherscanSettings::default()
    }
}

impl Harness {
    pub async fn balance(&self, address: Address) -> U256 {
        self.env.client().balance(address).await.unwrap()
    }

    /// Fund from accounts `1..=count` with `value` each
    pub async fn fund_from_others(&self, count: usize, value: U256) -> Vec<Address> {
        let funders: Vec<Address> = self.accounts[1..=count].to_vec();
        for funder in &funders {
            self.fund_me.connect(*funder).fund(value).await.unwrap();
        }
        funders
    }
}
