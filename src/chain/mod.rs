// Chain client abstraction
//
// Deployment scripts, contract handles and tests talk to a chain through the
// `ChainClient` trait. `EthereumConnector` backs it with JSON-RPC and
// `LocalChain` with the in-process development chain.

mod revert;

pub use revert::Revert;

use async_trait::async_trait;
use ethers::abi::{Abi, Token};
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};
use thiserror::Error;

/// Errors surfaced by a chain client
#[derive(Debug, Error)]
pub enum ChainError {
    /// The contract rejected the call or transaction
    #[error("execution reverted: {0}")]
    Reverted(Revert),

    /// The sender cannot cover value plus fees
    #[error("sender {sender:?} cannot pay {required} wei, balance is {available}")]
    InsufficientFunds {
        sender: Address,
        required: U256,
        available: U256,
    },

    /// The client cannot sign for this account
    #[error("unknown account {0:?}")]
    UnknownAccount(Address),

    /// Nothing is deployed at the target address
    #[error("no contract deployed at {0:?}")]
    NoContract(Address),

    /// The chain cannot host this contract
    #[error("contract {0} cannot be deployed on this chain")]
    UnsupportedContract(String),

    /// The transaction disappeared while waiting for confirmations
    #[error("transaction {0:?} was dropped before it was confirmed")]
    Dropped(H256),

    /// Snapshot id was never taken or has already been consumed
    #[error("unknown snapshot {0}")]
    UnknownSnapshot(U256),

    #[error("ABI error: {0}")]
    Abi(#[from] ethers::abi::Error),

    #[error("RPC error: {0}")]
    Rpc(String),
}

impl ChainError {
    /// The decoded revert, if the contract rejected the request
    pub fn revert(&self) -> Option<&Revert> {
        match self {
            ChainError::Reverted(revert) => Some(revert),
            _ => None,
        }
    }

    /// Resolve custom error selectors against the target contract's ABI
    pub fn with_abi(self, abi: &Abi) -> Self {
        match self {
            ChainError::Reverted(revert) => ChainError::Reverted(revert.with_abi(abi)),
            other => other,
        }
    }
}

/// Contract creation request
#[derive(Debug, Clone)]
pub struct DeployRequest {
    /// Deploying account
    pub from: Address,

    /// Artifact name, used by chains that host contracts natively
    pub contract_name: String,

    /// Contract ABI, used to encode the constructor arguments
    pub abi: Abi,

    /// Creation bytecode, empty when the chain hosts the contract natively
    pub bytecode: Bytes,

    /// Constructor arguments
    pub args: Vec<Token>,

    /// Confirmations to wait for after inclusion
    pub confirmations: usize,
}

impl DeployRequest {
    /// ABI-encoded constructor arguments, without the creation code
    pub fn encoded_args(&self) -> Result<Bytes, ChainError> {
        match self.abi.constructor() {
            Some(constructor) => Ok(constructor.encode_input(Vec::new(), &self.args)?.into()),
            None if self.args.is_empty() => Ok(Bytes::new()),
            None => Err(ChainError::Abi(ethers::abi::Error::InvalidData)),
        }
    }

    /// Creation bytecode followed by the encoded constructor arguments
    pub fn creation_code(&self) -> Result<Bytes, ChainError> {
        let mut code = self.bytecode.to_vec();
        code.extend_from_slice(&self.encoded_args()?);
        Ok(code.into())
    }
}

/// State-changing call
#[derive(Debug, Clone)]
pub struct TxRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub confirmations: usize,
}

/// Read-only call
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
}

/// Outcome of an included transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_hash: H256,
    pub block_number: u64,
    pub from: Address,
    pub to: Option<Address>,
    pub contract_address: Option<Address>,
    pub gas_used: U256,
    pub effective_gas_price: U256,
}

impl TxReceipt {
    /// Fee paid by the sender
    pub fn gas_cost(&self) -> U256 {
        self.gas_used * self.effective_gas_price
    }
}

impl From<TransactionReceipt> for TxReceipt {
    fn from(receipt: TransactionReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number.map(|n| n.as_u64()).unwrap_or_default(),
            from: receipt.from,
            to: receipt.to,
            contract_address: receipt.contract_address,
            gas_used: receipt.gas_used.unwrap_or_default(),
            effective_gas_price: receipt.effective_gas_price.unwrap_or_default(),
        }
    }
}

/// A chain the tooling can deploy to and call into
///
/// Every method issues one request and waits for its outcome; callers never
/// have more than one transaction in flight.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain id reported by the chain
    async fn chain_id(&self) -> Result<u64, ChainError>;

    /// Accounts the client can send from, in index order
    async fn accounts(&self) -> Result<Vec<Address>, ChainError>;

    /// Native balance of an address
    async fn balance(&self, address: Address) -> Result<U256, ChainError>;

    /// Runtime code at an address, empty for accounts without code
    async fn code(&self, address: Address) -> Result<Bytes, ChainError>;

    /// Create a contract and wait for the requested confirmations
    async fn deploy(&self, request: DeployRequest) -> Result<TxReceipt, ChainError>;

    /// Send a transaction and wait for the requested confirmations
    async fn send(&self, request: TxRequest) -> Result<TxReceipt, ChainError>;

    /// Execute a read-only call against the latest state
    async fn call(&self, request: CallRequest) -> Result<Bytes, ChainError>;

    /// Capture the current chain state
    async fn snapshot(&self) -> Result<U256, ChainError>;

    /// Restore a state captured by `snapshot`, consuming the snapshot
    async fn revert_to(&self, snapshot: U256) -> Result<(), ChainError>;
}
