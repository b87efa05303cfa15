// Contract artifacts and typed handles
//
// Artifacts carry the ABI (and creation code for RPC deployments) per
// contract name. Handles encode calls against a deployed instance.

mod fund_me;
mod handle;
mod price_feed;

pub use fund_me::FundMeContract;
pub use handle::ContractHandle;
pub use price_feed::{PriceFeedContract, RoundData};

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use ethers::abi::{parse_abi, Abi};
use ethers::types::Bytes;
use log::debug;
use serde::Deserialize;

use crate::error::{DeployError, Result};

/// Deployment and artifact name of the funding contract
pub const FUND_ME: &str = "FundMe";

/// Deployment and artifact name of the mock price feed
pub const MOCK_V3_AGGREGATOR: &str = "MockV3Aggregator";

/// Public interface of FundMe
pub const FUND_ME_ABI: &[&str] = &[
    "constructor(address priceFeed)",
    "function fund() external payable",
    "function withdraw() external",
    "function cheaperWithdraw() external",
    "function getOwner() external view returns (address)",
    "function getFunder(uint256 index) external view returns (address)",
    "function getAddressToAmountFunded(address funder) external view returns (uint256)",
    "function getPriceFeed() external view returns (address)",
    "function getVersion() external view returns (uint256)",
    "function MINIMUM_USD() external view returns (uint256)",
    "error FundMe__NotOwner()",
];

/// Public interface of Chainlink's MockV3Aggregator
pub const MOCK_V3_AGGREGATOR_ABI: &[&str] = &[
    "constructor(uint8 _decimals, int256 _initialAnswer)",
    "function decimals() external view returns (uint8)",
    "function description() external view returns (string)",
    "function version() external view returns (uint256)",
    "function latestAnswer() external view returns (int256)",
    "function latestTimestamp() external view returns (uint256)",
    "function latestRound() external view returns (uint256)",
    "function getRoundData(uint80 _roundId) external view returns (uint80, int256, uint256, uint256, uint80)",
    "function latestRoundData() external view returns (uint80, int256, uint256, uint256, uint80)",
    "function updateAnswer(int256 _answer) external",
];

/// Compiled contract, in the shape Hardhat writes to `artifacts/`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,

    /// Source file the contract was compiled from, e.g. `contracts/FundMe.sol`
    #[serde(default)]
    pub source_name: Option<String>,

    pub abi: Abi,

    /// Creation code, empty for interface-only artifacts
    #[serde(default)]
    pub bytecode: Bytes,
}

impl Artifact {
    /// Interface-only artifact from human-readable ABI lines
    pub fn from_human_readable(contract_name: &str, abi: &[&str]) -> Result<Self> {
        let abi = parse_abi(abi)
            .map_err(|e| DeployError::Artifact(format!("{}: {}", contract_name, e)))?;

        Ok(Self {
            contract_name: contract_name.to_string(),
            source_name: Some(format!("contracts/{}.sol", contract_name)),
            abi,
            bytecode: Bytes::new(),
        })
    }

    /// Load a Hardhat artifact JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let artifact = serde_json::from_str(&content)?;
        Ok(artifact)
    }

    /// Fully qualified name, `source:Contract`
    pub fn qualified_name(&self) -> String {
        match &self.source_name {
            Some(source) => format!("{}:{}", source, self.contract_name),
            None => self.contract_name.clone(),
        }
    }

    pub fn has_bytecode(&self) -> bool {
        !self.bytecode.is_empty()
    }
}

/// Artifacts by contract name
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    artifacts: HashMap<String, Artifact>,
}

impl ArtifactStore {
    /// Interface artifacts for FundMe and the mock price feed
    pub fn builtin() -> Result<Self> {
        let mut store = Self::default();
        store.insert(Artifact::from_human_readable(FUND_ME, FUND_ME_ABI)?);
        store.insert(Artifact::from_human_readable(
            MOCK_V3_AGGREGATOR,
            MOCK_V3_AGGREGATOR_ABI,
        )?);
        Ok(store)
    }

    /// Overlay every `*.json` artifact found below `dir`
    ///
    /// Hardhat nests artifacts as `<Source>.sol/<Contract>.json` next to
    /// `*.dbg.json` debug files, which are skipped.
    pub fn load_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize> {
        let mut loaded = 0;
        for entry in fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.is_dir() {
                loaded += self.load_dir(&path)?;
                continue;
            }

            let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if !file_name.ends_with(".json") || file_name.ends_with(".dbg.json") {
                continue;
            }

            let artifact = Artifact::load(&path)?;
            debug!("Loaded artifact {} from {}", artifact.contract_name, path.display());
            self.insert(artifact);
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn insert(&mut self, artifact: Artifact) {
        self.artifacts.insert(artifact.contract_name.clone(), artifact);
    }

    pub fn get(&self, contract_name: &str) -> Result<&Artifact> {
        self.artifacts
            .get(contract_name)
            .ok_or_else(|| DeployError::MissingArtifact(contract_name.to_string()))
    }
}
