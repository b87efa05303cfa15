// Deployment runtime
//
// Named accounts, a registry of deployments, tagged deployment scripts and
// fixtures. Scripts run in id order; a deployment whose contract and
// constructor arguments match the existing record of the same name is
// reused instead of sent again.

mod fund_me;
mod mocks;
mod registry;
mod verify;

pub use fund_me::{deploy_fund_me, resolve_price_feed, DeployFundMe};
pub use mocks::{deploy_mocks, DeployMocks};
pub use registry::Deployments;
pub use verify::SourceVerifier;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::DeploymentRecord;
use ethers::abi::Token;
use ethers::types::{Address, U256};
use log::{debug, info};

use crate::api::{NetworkSettings, DEPLOYER};
use crate::chain::{ChainClient, DeployRequest};
use crate::contracts::{
    ArtifactStore, ContractHandle, FundMeContract, PriceFeedContract, FUND_ME, MOCK_V3_AGGREGATOR,
};
use crate::devnet::LocalChain;
use crate::error::{DeployError, Result};
use crate::ethereum::chain::{is_development, NetworkConfigTable};

/// A deployment script, selected by its tags
#[async_trait]
pub trait DeployScript: Send + Sync {
    /// Scripts run in ascending id order
    fn id(&self) -> &str;

    fn tags(&self) -> &[&str];

    async fn run(&self, env: &mut DeployEnvironment) -> Result<()>;
}

/// Scripts every environment starts with
pub fn default_scripts() -> Vec<Arc<dyn DeployScript>> {
    vec![Arc::new(DeployMocks), Arc::new(DeployFundMe)]
}

/// Parameters of a single deployment
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Sending account
    pub from: Address,

    /// Artifact to deploy, defaults to the deployment name
    pub contract: Option<String>,

    /// Constructor arguments
    pub args: Vec<Token>,

    /// Confirmations to wait for
    pub confirmations: usize,
}

impl DeployOptions {
    pub fn new(from: Address) -> Self {
        Self {
            from,
            contract: None,
            args: Vec::new(),
            confirmations: 1,
        }
    }

    pub fn contract(mut self, contract: &str) -> Self {
        self.contract = Some(contract.to_string());
        self
    }

    pub fn args(mut self, args: Vec<Token>) -> Self {
        self.args = args;
        self
    }

    pub fn confirmations(mut self, confirmations: usize) -> Self {
        self.confirmations = confirmations.max(1);
        self
    }
}

struct Fixture {
    snapshot: U256,
    deployments: Deployments,
}

/// Everything deployment scripts and tests work against on one network
pub struct DeployEnvironment {
    network: NetworkSettings,
    client: Arc<dyn ChainClient>,
    artifacts: ArtifactStore,
    table: NetworkConfigTable,
    named_accounts: BTreeMap<String, usize>,
    deployments: Deployments,
    deployments_dir: Option<PathBuf>,
    verifier: Option<SourceVerifier>,
    scripts: Vec<Arc<dyn DeployScript>>,
    fixtures: HashMap<String, Fixture>,
}

impl DeployEnvironment {
    pub fn new(network: NetworkSettings, client: Arc<dyn ChainClient>, artifacts: ArtifactStore) -> Self {
        let mut named_accounts = BTreeMap::new();
        named_accounts.insert(DEPLOYER.to_string(), 0);

        Self {
            network,
            client,
            artifacts,
            table: NetworkConfigTable::new(),
            named_accounts,
            deployments: Deployments::new(),
            deployments_dir: None,
            verifier: None,
            scripts: default_scripts(),
            fixtures: HashMap::new(),
        }
    }

    /// Fresh in-process `hardhat` network with the built-in artifacts
    pub fn in_process() -> Result<Self> {
        Ok(Self::new(
            NetworkSettings::hardhat(),
            Arc::new(LocalChain::new()),
            ArtifactStore::builtin()?,
        ))
    }

    pub fn with_table(mut self, table: NetworkConfigTable) -> Self {
        self.table = table;
        self
    }

    pub fn with_named_accounts(mut self, named_accounts: BTreeMap<String, usize>) -> Self {
        self.named_accounts = named_accounts;
        self
    }

    /// Start from previously persisted records
    pub fn with_deployments(mut self, deployments: Deployments) -> Self {
        self.deployments = deployments;
        self
    }

    /// Persist every new deployment under `dir`
    pub fn with_deployments_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.deployments_dir = Some(dir.into());
        self
    }

    pub fn with_verifier(mut self, verifier: SourceVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_scripts(mut self, scripts: Vec<Arc<dyn DeployScript>>) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn network(&self) -> &NetworkSettings {
        &self.network
    }

    pub fn network_name(&self) -> &str {
        &self.network.name
    }

    /// Whether the network gets mocks instead of live price feeds
    pub fn is_development(&self) -> bool {
        is_development(&self.network.name)
    }

    pub fn client(&self) -> Arc<dyn ChainClient> {
        self.client.clone()
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn table(&self) -> &NetworkConfigTable {
        &self.table
    }

    pub fn deployments(&self) -> &Deployments {
        &self.deployments
    }

    pub fn verifier(&self) -> Option<&SourceVerifier> {
        self.verifier.as_ref()
    }

    pub async fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.client.accounts().await?)
    }

    /// Address behind a named account
    pub async fn named_account(&self, name: &str) -> Result<Address> {
        let index = *self
            .named_accounts
            .get(name)
            .ok_or_else(|| DeployError::MissingAccount(name.to_string()))?;

        self.accounts()
            .await?
            .get(index)
            .copied()
            .ok_or_else(|| DeployError::MissingAccount(name.to_string()))
    }

    /// Every named account resolved to its address
    pub async fn named_accounts(&self) -> Result<BTreeMap<String, Address>> {
        let accounts = self.accounts().await?;
        self.named_accounts
            .iter()
            .map(|(name, index)| {
                accounts
                    .get(*index)
                    .map(|address| (name.clone(), *address))
                    .ok_or_else(|| DeployError::MissingAccount(name.clone()))
            })
            .collect()
    }

    pub async fn deployer(&self) -> Result<Address> {
        self.named_account(DEPLOYER).await
    }

    /// Record saved under `name`
    pub fn get(&self, name: &str) -> Result<&DeploymentRecord> {
        self.deployments.get(name)
    }

    /// Deploy a contract under `name`, or reuse an identical deployment
    pub async fn deploy(&mut self, name: &str, options: DeployOptions) -> Result<DeploymentRecord> {
        let contract = options.contract.as_deref().unwrap_or(name);
        let artifact = self.artifacts.get(contract)?;

        let request = DeployRequest {
            from: options.from,
            contract_name: artifact.contract_name.clone(),
            abi: artifact.abi.clone(),
            bytecode: artifact.bytecode.clone(),
            args: options.args.clone(),
            confirmations: options.confirmations,
        };
        let encoded_args = request.encoded_args()?;

        if let Some(existing) = self.deployments.find(name) {
            if existing.matches(&artifact.contract_name, &encoded_args)
                && !self.client.code(existing.address).await?.is_empty()
            {
                info!("reusing \"{}\" at {:?}", name, existing.address);
                return Ok(existing.clone());
            }
        }

        let receipt = self.client.deploy(request).await?;
        let address = receipt
            .contract_address
            .ok_or_else(|| DeployError::Artifact(format!("{} creation returned no address", name)))?;

        info!(
            "deploying \"{}\" (tx: {:?})...: deployed at {:?} with {} gas",
            name, receipt.transaction_hash, address, receipt.gas_used
        );

        let record = DeploymentRecord {
            contract_name: artifact.contract_name.clone(),
            address,
            args: options.args.iter().map(render_token).collect(),
            encoded_args,
            transaction_hash: Some(receipt.transaction_hash),
            block_number: Some(receipt.block_number),
            deployed_at: Utc::now(),
        };

        if let Some(dir) = &self.deployments_dir {
            Deployments::write_record(dir, name, &record)?;
        }
        self.deployments.save(name, record.clone());
        Ok(record)
    }

    /// Run the scripts carrying any of `tags`, every script when empty
    pub async fn run(&mut self, tags: &[&str]) -> Result<()> {
        let mut scripts: Vec<Arc<dyn DeployScript>> = self
            .scripts
            .iter()
            .filter(|script| tags.is_empty() || script.tags().iter().any(|tag| tags.contains(tag)))
            .cloned()
            .collect();
        scripts.sort_by(|a, b| a.id().cmp(b.id()));

        for script in scripts {
            debug!("Running deploy script {}", script.id());
            script.run(self).await?;
        }
        Ok(())
    }

    /// Bring the chain and the registry to the state after running `tags`
    ///
    /// The first call runs the scripts and snapshots the result; later
    /// calls with the same tags revert to that snapshot instead.
    pub async fn fixture(&mut self, tags: &[&str]) -> Result<()> {
        let mut key: Vec<&str> = tags.to_vec();
        key.sort_unstable();
        let key = key.join(",");

        if let Some(fixture) = self.fixtures.remove(&key) {
            // Reverting consumes every snapshot taken after this one
            self.fixtures.retain(|_, other| other.snapshot < fixture.snapshot);
            self.client.revert_to(fixture.snapshot).await?;
            self.deployments = fixture.deployments;
            if let Some(dir) = &self.deployments_dir {
                self.deployments.write_dir(dir)?;
            }
            debug!("Restored fixture [{}]", key);
        } else {
            self.run(tags).await?;
        }

        let snapshot = self.client.snapshot().await?;
        self.fixtures.insert(
            key,
            Fixture {
                snapshot,
                deployments: self.deployments.clone(),
            },
        );
        Ok(())
    }

    /// Handle to a deployment, sending from `signer`
    pub fn contract(&self, name: &str, signer: Address) -> Result<ContractHandle> {
        let record = self.get(name)?;
        let artifact = self.artifacts.get(&record.contract_name)?;
        Ok(
            ContractHandle::new(record.address, artifact.abi.clone(), self.client(), signer)
                .with_confirmations(self.network.block_confirmations),
        )
    }

    /// The FundMe deployment, sending from `signer`
    pub fn fund_me(&self, signer: Address) -> Result<FundMeContract> {
        let record = self.get(FUND_ME)?;
        let artifact = self.artifacts.get(&record.contract_name)?;
        Ok(
            FundMeContract::new(record.address, artifact, self.client(), signer)
                .with_confirmations(self.network.block_confirmations),
        )
    }

    /// The mock price feed deployment, sending from `signer`
    pub fn price_feed(&self, signer: Address) -> Result<PriceFeedContract> {
        let record = self.get(MOCK_V3_AGGREGATOR)?;
        let artifact = self.artifacts.get(&record.contract_name)?;
        Ok(PriceFeedContract::new(
            record.address,
            artifact,
            self.client(),
            signer,
        ))
    }
}

/// Human-readable form of a constructor argument
fn render_token(token: &Token) -> String {
    match token {
        Token::Address(address) => format!("{:?}", address),
        Token::Int(value) => ethers::types::I256::from_raw(*value).to_string(),
        Token::Uint(value) => value.to_string(),
        Token::Bool(value) => value.to_string(),
        Token::String(value) => value.clone(),
        other => other.to_string(),
    }
}
