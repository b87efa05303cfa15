// Network configuration table
//
// Static mapping from chain id to the parameters the deployment scripts need,
// plus the constants used when a mock price feed stands in for a real one.

use std::collections::HashMap;

use ethers::types::{Address, H160};
use serde::{Deserialize, Serialize};

use crate::error::{DeployError, Result};

/// Networks that get a mock price feed instead of a real one
pub const DEVELOPMENT_CHAINS: &[&str] = &["hardhat", "localhost"];

/// Decimals reported by the mock price feed
pub const DECIMALS: u8 = 8;

/// Initial mock answer, 2000 USD with 8 decimals
pub const INITIAL_ANSWER: i64 = 200_000_000_000;

/// Chain id of the local development networks
pub const DEVELOPMENT_CHAIN_ID: u64 = 31337;

/// Chainlink ETH/USD feed on Goerli, 0xD4a33860578De61DBAbDc8BFdb98FD742fA7028e
const GOERLI_ETH_USD_PRICE_FEED: Address = H160([
    0xd4, 0xa3, 0x38, 0x60, 0x57, 0x8d, 0xe6, 0x1d, 0xba, 0xbd, 0xc8, 0xbf, 0xdb, 0x98, 0xfd, 0x74,
    0x2f, 0xa7, 0x02, 0x8e,
]);

/// Chainlink ETH/USD feed on Sepolia, 0x694AA1769357215DE4FAC081bf1f309aDC325306
const SEPOLIA_ETH_USD_PRICE_FEED: Address = H160([
    0x69, 0x4a, 0xa1, 0x76, 0x93, 0x57, 0x21, 0x5d, 0xe4, 0xfa, 0xc0, 0x81, 0xbf, 0x1f, 0x30, 0x9a,
    0xdc, 0x32, 0x53, 0x06,
]);

/// Whether `network` is a development network
pub fn is_development(network: &str) -> bool {
    DEVELOPMENT_CHAINS.contains(&network)
}

/// Per-chain deployment parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEntry {
    /// Chain ID
    pub chain_id: u64,

    /// Display name
    pub name: String,

    /// ETH/USD price feed, required outside development networks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eth_usd_price_feed: Option<Address>,
}

impl NetworkEntry {
    /// Create an entry without a price feed
    pub fn new(chain_id: u64, name: impl Into<String>) -> Self {
        Self {
            chain_id,
            name: name.into(),
            eth_usd_price_feed: None,
        }
    }

    /// Attach an ETH/USD price feed
    pub fn with_price_feed(mut self, price_feed: Address) -> Self {
        self.eth_usd_price_feed = Some(price_feed);
        self
    }

    /// Local node
    pub fn localhost() -> Self {
        Self::new(DEVELOPMENT_CHAIN_ID, "localhost")
    }

    /// Goerli testnet
    pub fn goerli() -> Self {
        Self::new(5, "goerli").with_price_feed(GOERLI_ETH_USD_PRICE_FEED)
    }

    /// Sepolia testnet
    pub fn sepolia() -> Self {
        Self::new(11_155_111, "sepolia").with_price_feed(SEPOLIA_ETH_USD_PRICE_FEED)
    }
}

/// Lookup table from chain id to network entry
#[derive(Debug, Clone)]
pub struct NetworkConfigTable {
    entries: HashMap<u64, NetworkEntry>,
}

impl NetworkConfigTable {
    /// Table with the known networks
    pub fn new() -> Self {
        let mut table = Self::empty();

        table.insert(NetworkEntry::localhost());
        table.insert(NetworkEntry::goerli());
        table.insert(NetworkEntry::sepolia());

        table
    }

    /// Table without any entries
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Look up the entry for a chain
    pub fn get(&self, chain_id: u64) -> Result<&NetworkEntry> {
        self.entries
            .get(&chain_id)
            .ok_or(DeployError::MissingNetworkConfig(chain_id))
    }

    /// Add or replace an entry
    pub fn insert(&mut self, entry: NetworkEntry) {
        self.entries.insert(entry.chain_id, entry);
    }

    /// Price feed for a chain, failing when the chain or its feed is unknown
    pub fn price_feed(&self, chain_id: u64) -> Result<Address> {
        let entry = self.get(chain_id)?;
        entry
            .eth_usd_price_feed
            .ok_or_else(|| DeployError::UnconfiguredNetwork {
                name: entry.name.clone(),
                chain_id,
            })
    }

    /// Entries ordered by chain id
    pub fn entries(&self) -> Vec<&NetworkEntry> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by_key(|entry| entry.chain_id);
        entries
    }
}

impl Default for NetworkConfigTable {
    fn default() -> Self {
        Self::new()
    }
}
