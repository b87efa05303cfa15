mod support;

use std::sync::Arc;

use ethers::abi::Token;
use ethers::types::{Bytes, I256, U256};
use fundme_deploy::api::{self, ConfigManager, NetworkSettings, HARDHAT};
use fundme_deploy::contracts::{ArtifactStore, FUND_ME, MOCK_V3_AGGREGATOR};
use fundme_deploy::deploy::{deploy_fund_me, deploy_mocks, DeployOptions, Deployments, SourceVerifier};
use fundme_deploy::devnet::{LocalChain, NOT_OWNER};
use fundme_deploy::ethereum::chain::{NetworkConfigTable, NetworkEntry, DECIMALS, INITIAL_ANSWER};
use fundme_deploy::{DeployEnvironment, DeployError, Revert};
use mockito::{Matcher, Server};
use tempfile::tempdir;

use support::{etherscan_settings, send_value, setup, source_tree};

fn mock_options(env_deployer: ethers::types::Address) -> DeployOptions {
    DeployOptions::new(env_deployer).contract(MOCK_V3_AGGREGATOR).args(vec![
        Token::Uint(U256::from(DECIMALS)),
        Token::Int(I256::from(INITIAL_ANSWER).into_raw()),
    ])
}

#[tokio::test]
async fn test_mock_deployment_is_reused_within_fixture() {
    let mut h = setup().await;
    let mock = h.env.get(MOCK_V3_AGGREGATOR).unwrap().address;

    // Running the mock script again yields the same instance
    let again = deploy_mocks(&mut h.env, DECIMALS, I256::from(INITIAL_ANSWER))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again.address, mock);

    h.env.run(&["mocks"]).await.unwrap();
    assert_eq!(h.env.get(MOCK_V3_AGGREGATOR).unwrap().address, mock);
    assert_eq!(h.fund_me.get_price_feed().await.unwrap(), mock);
}

#[tokio::test]
async fn test_rerunning_all_sends_nothing() {
    let chain = Arc::new(LocalChain::new());
    let mut env = DeployEnvironment::new(
        NetworkSettings::hardhat(),
        chain.clone(),
        ArtifactStore::builtin().unwrap(),
    );

    env.run(&["all"]).await.unwrap();
    let block = chain.block_number();
    let fund_me = env.get(FUND_ME).unwrap().clone();

    env.run(&["all"]).await.unwrap();
    assert_eq!(chain.block_number(), block);
    assert_eq!(env.get(FUND_ME).unwrap(), &fund_me);
}

#[tokio::test]
async fn test_fixture_restores_chain_state() {
    let mut h = setup().await;
    h.fund_from_others(3, send_value()).await;
    assert_eq!(h.fund_me.balance().await.unwrap(), send_value() * 3);

    h.env.fixture(&["all"]).await.unwrap();

    // Same contract, state from right after deployment
    let fund_me = h.env.fund_me(h.deployer).unwrap();
    assert_eq!(fund_me.address(), h.fund_me.address());
    assert!(fund_me.balance().await.unwrap().is_zero());
    assert!(fund_me.funders().await.unwrap().is_empty());
    assert_eq!(h.balance(h.accounts[1]).await, U256::from(10_000) * U256::exp10(18));

    // The restored fixture can be restored again
    fund_me.fund(send_value()).await.unwrap();
    h.env.fixture(&["all"]).await.unwrap();
    assert!(fund_me.funders().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fixture_restores_registry() {
    let mut h = setup().await;
    let deployer = h.deployer;

    h.env.deploy("SecondFeed", mock_options(deployer)).await.unwrap();
    assert!(h.env.get("SecondFeed").is_ok());

    h.env.fixture(&["all"]).await.unwrap();
    assert!(matches!(
        h.env.get("SecondFeed"),
        Err(DeployError::MissingDeployment(_))
    ));
    assert_eq!(h.env.deployments().len(), 2);
}

#[tokio::test]
async fn test_fixture_restores_persisted_records() {
    let dir = tempdir().unwrap();
    let mut env = DeployEnvironment::in_process()
        .unwrap()
        .with_deployments_dir(dir.path());
    env.fixture(&["all"]).await.unwrap();

    let deployer = env.deployer().await.unwrap();
    env.deploy("SecondFeed", mock_options(deployer)).await.unwrap();
    assert!(dir.path().join("SecondFeed.json").is_file());

    env.fixture(&["all"]).await.unwrap();
    assert!(!dir.path().join("SecondFeed.json").exists());
    assert_eq!(&Deployments::load_dir(dir.path()).unwrap(), env.deployments());
}

#[tokio::test]
async fn test_records_persist_and_are_reused() {
    let dir = tempdir().unwrap();
    let network_dir = dir.path().join("localhost");
    let chain = Arc::new(LocalChain::new());

    let mut first = DeployEnvironment::new(
        NetworkSettings::hardhat(),
        chain.clone(),
        ArtifactStore::builtin().unwrap(),
    )
    .with_deployments_dir(&network_dir);
    first.run(&["all"]).await.unwrap();

    assert!(network_dir.join("FundMe.json").is_file());
    assert!(network_dir.join("MockV3Aggregator.json").is_file());

    let loaded = Deployments::load_dir(&network_dir).unwrap();
    assert_eq!(&loaded, first.deployments());

    // A later run against the same chain picks the records up
    let block = chain.block_number();
    let mut second = DeployEnvironment::new(
        NetworkSettings::hardhat(),
        chain.clone(),
        ArtifactStore::builtin().unwrap(),
    )
    .with_deployments(loaded);
    second.run(&["all"]).await.unwrap();
    assert_eq!(chain.block_number(), block);

    // On a fresh chain the recorded addresses hold no code, so it redeploys
    let fresh = Arc::new(LocalChain::new());
    let mut third = DeployEnvironment::new(
        NetworkSettings::hardhat(),
        fresh.clone(),
        ArtifactStore::builtin().unwrap(),
    )
    .with_deployments(Deployments::load_dir(&network_dir).unwrap());
    third.run(&["all"]).await.unwrap();
    assert!(fresh.block_number() > 0);
}

#[tokio::test]
async fn test_unknown_chain_fails_before_any_transaction() {
    let chain = Arc::new(LocalChain::with_chain_id(1));
    let mut env = DeployEnvironment::new(
        NetworkSettings::remote("mainnet", 1, "http://unused"),
        chain.clone(),
        ArtifactStore::builtin().unwrap(),
    );

    let err = env.run(&["all"]).await.unwrap_err();
    assert!(matches!(err, DeployError::MissingNetworkConfig(1)));
    assert!(env.deployments().is_empty());
    assert_eq!(chain.block_number(), 0);
}

#[tokio::test]
async fn test_verification_failure_does_not_fail_deployment() {
    let sources = source_tree();
    let mut server = Server::new_async().await;
    let lookup = server
        .mock("GET", "/api")
        .match_query(Matcher::UrlEncoded("action".into(), "getsourcecode".into()))
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let chain = Arc::new(LocalChain::new());
    let mut env = DeployEnvironment::new(
        NetworkSettings::remote("staging", 31337, "http://unused"),
        chain.clone(),
        ArtifactStore::builtin().unwrap(),
    );

    // A live-style network whose feed is an existing aggregator
    let deployer = env.deployer().await.unwrap();
    let feed = env.deploy(MOCK_V3_AGGREGATOR, mock_options(deployer)).await.unwrap();
    let mut table = NetworkConfigTable::empty();
    table.insert(NetworkEntry::new(31337, "staging").with_price_feed(feed.address));

    let verifier = SourceVerifier::from_settings(&etherscan_settings(&server, &sources), "staging")
        .unwrap()
        .unwrap();
    let mut env = env.with_table(table).with_verifier(verifier);

    let record = deploy_fund_me(&mut env).await.unwrap();
    lookup.assert_async().await;

    let fund_me = env.fund_me(deployer).unwrap();
    assert_eq!(fund_me.address(), record.address);
    assert_eq!(fund_me.get_price_feed().await.unwrap(), feed.address);
}

#[tokio::test]
async fn test_verification_skipped_on_development_network() {
    let sources = source_tree();
    let mut server = Server::new_async().await;
    let lookups = server.mock("GET", Matcher::Any).expect(0).create_async().await;
    let submissions = server.mock("POST", Matcher::Any).expect(0).create_async().await;

    let verifier = SourceVerifier::from_settings(&etherscan_settings(&server, &sources), HARDHAT)
        .unwrap()
        .unwrap();
    let mut env = DeployEnvironment::in_process().unwrap().with_verifier(verifier);
    env.run(&["all"]).await.unwrap();

    assert!(env.verifier().is_some());
    assert!(env.get(FUND_ME).is_ok());
    lookups.assert_async().await;
    submissions.assert_async().await;
}

#[tokio::test]
async fn test_verification_skipped_without_api_key() {
    let sources = source_tree();
    let mut server = Server::new_async().await;
    let lookups = server.mock("GET", Matcher::Any).expect(0).create_async().await;
    let submissions = server.mock("POST", Matcher::Any).expect(0).create_async().await;

    let mut settings = NetworkSettings::hardhat();
    settings.name = "goerli".to_string();
    settings.chain_id = 5;
    let mut config = ConfigManager::builder().network(settings).build();
    config.etherscan = etherscan_settings(&server, &sources);
    config.etherscan.api_key = Some(String::new());

    let mut env = api::prepare(&config, "goerli").await.unwrap();
    assert!(!env.is_development());
    assert!(env.verifier().is_none());

    env.run(&["all"]).await.unwrap();
    assert!(env.get(FUND_ME).is_ok());
    lookups.assert_async().await;
    submissions.assert_async().await;
}

#[tokio::test]
async fn test_fund_me_against_feed_without_code() {
    let mut settings = NetworkSettings::hardhat();
    settings.name = "goerli".to_string();
    settings.chain_id = 5;
    let config = ConfigManager::builder().network(settings).build();

    // Goerli's feed address holds no code on the in-process chain
    let mut env = api::prepare(&config, "goerli").await.unwrap();
    env.run(&["all"]).await.unwrap();
    assert!(env.get(MOCK_V3_AGGREGATOR).is_err());

    let deployer = env.deployer().await.unwrap();
    let feed = NetworkConfigTable::new().price_feed(5).unwrap();
    let fund_me = env.fund_me(deployer).unwrap();
    assert_eq!(fund_me.get_price_feed().await.unwrap(), feed);
    assert_eq!(fund_me.get_owner().await.unwrap(), deployer);
    assert!(fund_me.get_funder(0).await.unwrap_err().revert().unwrap().is_out_of_bounds());

    // Ownership is checked without touching the feed
    let other = env.accounts().await.unwrap()[1];
    let err = fund_me.connect(other).withdraw().await.unwrap_err();
    assert_eq!(err.revert(), Some(&Revert::CustomError(NOT_OWNER.to_string())));
    fund_me.cheaper_withdraw().await.unwrap();

    // Funding needs a price and reverts
    let err = fund_me.fund(send_value()).await.unwrap_err();
    assert_eq!(err.revert(), Some(&Revert::Unknown(Bytes::new())));

    let report = api::report(&env).await.unwrap();
    assert_eq!(report.chain_id, 5);
    assert!(report.funding.unwrap().funders.is_empty());
}
