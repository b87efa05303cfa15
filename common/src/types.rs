use chrono::{DateTime, Utc};
use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};

/// Record of a single contract deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// Name of the contract artifact that was deployed
    pub contract_name: String,
    /// Address the contract was deployed to
    pub address: Address,
    /// Constructor arguments, in order, rendered for humans
    pub args: Vec<String>,
    /// ABI-encoded constructor arguments
    pub encoded_args: Bytes,
    /// Hash of the creation transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<H256>,
    /// Block the creation transaction was included in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Time the deployment was recorded
    pub deployed_at: DateTime<Utc>,
}

impl DeploymentRecord {
    /// Whether this record was produced from the same contract and arguments
    pub fn matches(&self, contract_name: &str, encoded_args: &Bytes) -> bool {
        self.contract_name == contract_name && &self.encoded_args == encoded_args
    }
}

/// Observed state of a FundMe contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingSnapshot {
    /// Contract address
    pub address: Address,
    /// Only identity allowed to withdraw
    pub owner: Address,
    /// Price feed the contract converts contributions with
    pub price_feed: Address,
    /// Current contract balance in wei
    pub balance: U256,
    /// Contributor list, in funding order
    pub funders: Vec<Address>,
    /// Recorded amount per observed address
    pub amounts: Vec<(Address, U256)>,
}

impl FundingSnapshot {
    /// Recorded amount for `funder`, zero when the address was not observed
    pub fn amount_of(&self, funder: Address) -> U256 {
        self.amounts
            .iter()
            .find(|(address, _)| *address == funder)
            .map(|(_, amount)| *amount)
            .unwrap_or_default()
    }

    /// True once a withdrawal has cleared the contract
    pub fn is_cleared(&self) -> bool {
        self.balance.is_zero()
            && self.funders.is_empty()
            && self.amounts.iter().all(|(_, amount)| amount.is_zero())
    }
}
