// Runner configuration and report types
//
// The deploy runner is configured the way a Hardhat project is: a set of
// named networks, named accounts and verification settings. Secrets are
// read from the environment and never written back to disk.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use common::{DeploymentRecord, FundingSnapshot};
use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::error::{DeployError, Result};
use crate::ethereum::chain::DEVELOPMENT_CHAIN_ID;

/// Name of the in-process development network
pub const HARDHAT: &str = "hardhat";

/// Named account that signs deployments
pub const DEPLOYER: &str = "deployer";

/// Where Hardhat writes compiled artifacts
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

fn default_confirmations() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_deployments_dir() -> PathBuf {
    PathBuf::from("deployments")
}

fn default_sources_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_compiler_version() -> String {
    "v0.8.8+commit.dddeac2f".to_string()
}

/// Settings of one network the runner can deploy to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSettings {
    /// Network name, taken from the key in `networks`
    #[serde(skip)]
    pub name: String,

    /// Chain ID the network is expected to report
    pub chain_id: u64,

    /// JSON-RPC endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Run against the in-process development chain
    #[serde(default)]
    pub in_process: bool,

    /// Private keys of the signing accounts
    #[serde(default, skip_serializing)]
    pub accounts: Vec<String>,

    /// Confirmations to wait for after each deployment
    #[serde(default = "default_confirmations")]
    pub block_confirmations: usize,

    /// Persist deployment records under the deployments directory
    #[serde(default = "default_true")]
    pub save_deployments: bool,
}

impl NetworkSettings {
    /// Built-in development network, reset with every run
    pub fn hardhat() -> Self {
        Self {
            name: HARDHAT.to_string(),
            chain_id: DEVELOPMENT_CHAIN_ID,
            url: None,
            in_process: true,
            accounts: Vec::new(),
            block_confirmations: 1,
            save_deployments: false,
        }
    }

    /// Network reached over JSON-RPC
    pub fn remote(name: impl Into<String>, chain_id: u64, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chain_id,
            url: Some(url.into()),
            in_process: false,
            accounts: Vec::new(),
            block_confirmations: 1,
            save_deployments: true,
        }
    }

    pub fn with_confirmations(mut self, confirmations: usize) -> Self {
        self.block_confirmations = confirmations;
        self
    }

    pub fn with_accounts(mut self, accounts: Vec<String>) -> Self {
        self.accounts = accounts;
        self
    }
}

/// Source verification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtherscanSettings {
    /// API key, read from `ETHERSCAN_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Override of the per-network API endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Compiler the deployed bytecode was built with
    #[serde(default = "default_compiler_version")]
    pub compiler_version: String,

    /// Optimizer runs, absent when the optimizer was off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimization_runs: Option<u32>,

    /// Directory artifact source names are relative to
    #[serde(default = "default_sources_root")]
    pub sources_root: PathBuf,

    /// Standard JSON input to submit instead of a single source file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_json_input: Option<PathBuf>,
}

impl Default for EtherscanSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: None,
            compiler_version: default_compiler_version(),
            optimization_runs: None,
            sources_root: default_sources_root(),
            standard_json_input: None,
        }
    }
}

/// Configuration of the deploy runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    /// Network used when none is given
    pub default_network: String,

    /// Networks by name
    pub networks: BTreeMap<String, NetworkSettings>,

    /// Account index per role
    pub named_accounts: BTreeMap<String, usize>,

    #[serde(default)]
    pub etherscan: EtherscanSettings,

    /// Hardhat artifacts overriding the built-in interfaces, `artifacts`
    /// when that directory exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts_dir: Option<PathBuf>,

    /// Root of the persisted deployment records
    #[serde(default = "default_deployments_dir")]
    pub deployments_dir: PathBuf,
}

impl DeployConfig {
    /// Settings of `name`, with the name filled in
    pub fn network(&self, name: &str) -> Result<NetworkSettings> {
        let mut settings = self
            .networks
            .get(name)
            .cloned()
            .ok_or_else(|| DeployError::UnknownNetwork(name.to_string()))?;
        settings.name = name.to_string();
        Ok(settings)
    }

    /// Artifacts directory to load, if any
    pub fn artifacts_path(&self) -> Option<PathBuf> {
        match &self.artifacts_dir {
            Some(dir) => Some(dir.clone()),
            None => Some(PathBuf::from(DEFAULT_ARTIFACTS_DIR)).filter(|dir| dir.is_dir()),
        }
    }

    /// Directory the records of `network` are written to
    pub fn deployments_path(&self, network: &str) -> PathBuf {
        self.deployments_dir.join(network)
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        let mut networks = BTreeMap::new();
        networks.insert(HARDHAT.to_string(), NetworkSettings::hardhat());
        networks.insert(
            "localhost".to_string(),
            NetworkSettings::remote("localhost", DEVELOPMENT_CHAIN_ID, "http://localhost:8545"),
        );
        networks.insert(
            "goerli".to_string(),
            NetworkSettings::remote("goerli", 5, "https://rpc.ankr.com/eth_goerli").with_confirmations(5),
        );

        let mut named_accounts = BTreeMap::new();
        named_accounts.insert(DEPLOYER.to_string(), 0);

        Self {
            default_network: HARDHAT.to_string(),
            networks,
            named_accounts,
            etherscan: EtherscanSettings::default(),
            artifacts_dir: None,
            deployments_dir: default_deployments_dir(),
        }
    }
}

/// One named deployment in a report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub name: String,
    pub record: DeploymentRecord,
}

/// State of a network after the deployment scripts ran
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentReport {
    /// Timestamp when the report was generated
    pub timestamp: DateTime<Utc>,

    pub network: String,

    pub chain_id: u64,

    /// Account the scripts deployed from
    pub deployer: Address,

    pub deployments: Vec<ReportEntry>,

    /// FundMe state, when FundMe is deployed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding: Option<FundingSnapshot>,
}
