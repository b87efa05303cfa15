// In-process development chain
//
// An ephemeral chain that mines every transaction immediately, charges a
// fixed gas price and hosts native implementations of the contracts the
// deployment scripts create. Snapshots follow the `evm_snapshot` /
// `evm_revert` semantics of local development nodes: reverting to a
// snapshot consumes it and every snapshot taken after it.

mod aggregator;
mod fund_me;

pub use aggregator::MockV3Aggregator;
pub use fund_me::{conversion_rate, minimum_usd, FundMe, BELOW_MINIMUM, NOT_OWNER};

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use ethers::abi::{self, Abi, Function, Token};
use ethers::types::{Address, Bytes, H256, I256, U256};
use ethers::utils::{get_contract_address, keccak256};
use log::{debug, trace};
use parking_lot::Mutex;

use crate::chain::{
    CallRequest, ChainClient, ChainError, DeployRequest, Revert, TxReceipt, TxRequest,
};
use crate::contracts::{FUND_ME, MOCK_V3_AGGREGATOR};
use crate::ethereum::chain::DEVELOPMENT_CHAIN_ID;

/// Number of pre-funded accounts
pub const DEFAULT_ACCOUNTS: usize = 20;

/// Intrinsic cost of every transaction
const TX_BASE_GAS: u64 = 21_000;

/// Price feed values as seen by a consuming contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceReading {
    pub answer: I256,
    pub decimals: u8,
    pub version: U256,
}

/// Effect of a successful native call
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Outcome {
    /// Gas on top of the intrinsic transaction cost
    pub(crate) gas_used: u64,
    /// Receives the contract's whole balance
    pub(crate) payout: Option<Address>,
}

impl Outcome {
    pub(crate) fn gas(gas_used: u64) -> Self {
        Self {
            gas_used,
            payout: None,
        }
    }

    pub(crate) fn paying_out(mut self, recipient: Address) -> Self {
        self.payout = Some(recipient);
        self
    }
}

#[derive(Debug, Clone)]
enum Native {
    FundMe(FundMe),
    MockV3Aggregator(MockV3Aggregator),
}

#[derive(Debug, Clone)]
struct HostedContract {
    name: String,
    abi: Abi,
    native: Native,
}

#[derive(Debug, Clone)]
struct ChainState {
    block_number: u64,
    timestamp: u64,
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    contracts: HashMap<Address, HostedContract>,
}

struct Inner {
    state: ChainState,
    snapshots: BTreeMap<U256, ChainState>,
    next_snapshot: U256,
}

/// Ephemeral chain living inside the current process
pub struct LocalChain {
    chain_id: u64,
    gas_price: U256,
    accounts: Vec<Address>,
    inner: Mutex<Inner>,
}

impl LocalChain {
    /// Chain with the default id, accounts and gas price
    pub fn new() -> Self {
        Self::with_chain_id(DEVELOPMENT_CHAIN_ID)
    }

    pub fn with_chain_id(chain_id: u64) -> Self {
        Self::build(
            chain_id,
            DEFAULT_ACCOUNTS,
            U256::from(10_000) * U256::exp10(18),
            U256::exp10(9),
        )
    }

    /// Chain with `accounts` accounts each holding `balance` wei
    pub fn build(chain_id: u64, accounts: usize, balance: U256, gas_price: U256) -> Self {
        let accounts: Vec<Address> = (0..accounts).map(dev_account).collect();
        let balances = accounts.iter().map(|account| (*account, balance)).collect();

        Self {
            chain_id,
            gas_price,
            accounts,
            inner: Mutex::new(Inner {
                state: ChainState {
                    block_number: 0,
                    timestamp: chrono::Utc::now().timestamp().max(0) as u64,
                    balances,
                    nonces: HashMap::new(),
                    contracts: HashMap::new(),
                },
                snapshots: BTreeMap::new(),
                next_snapshot: U256::one(),
            }),
        }
    }

    pub fn gas_price(&self) -> U256 {
        self.gas_price
    }

    pub fn block_number(&self) -> u64 {
        self.inner.lock().state.block_number
    }

    fn require_account(&self, account: Address) -> Result<(), ChainError> {
        if self.accounts.contains(&account) {
            Ok(())
        } else {
            Err(ChainError::UnknownAccount(account))
        }
    }
}

impl Default for LocalChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic address of the `index`-th development account
fn dev_account(index: usize) -> Address {
    let seed = keccak256(format!("fundme-devnet-account-{}", index));
    Address::from_slice(&seed[12..])
}

fn malformed() -> ChainError {
    ChainError::Reverted(Revert::Unknown(Bytes::new()))
}

/// Resolve calldata to the function it selects and its decoded arguments
///
/// Empty calldata selects the receive function, reported as `""`.
fn decode_call<'a>(abi: &'a Abi, data: &[u8]) -> Result<(&'a str, Vec<Token>), ChainError> {
    if data.is_empty() {
        return Ok(("", Vec::new()));
    }
    if data.len() < 4 {
        return Err(malformed());
    }

    let function: &Function = abi
        .functions()
        .find(|function| function.short_signature() == data[..4])
        .ok_or_else(malformed)?;
    let args = function.decode_input(&data[4..]).map_err(|_| malformed())?;

    Ok((function.name.as_str(), args))
}

fn encode_output(abi: &Abi, function: &str, tokens: &[Token]) -> Result<Bytes, ChainError> {
    let function = abi.function(function)?;
    if function.outputs.len() != tokens.len() {
        return Err(ChainError::Abi(abi::Error::InvalidData));
    }
    Ok(abi::encode(tokens).into())
}

impl ChainState {
    fn balance(&self, address: Address) -> U256 {
        self.balances.get(&address).copied().unwrap_or_default()
    }

    /// Reading of the aggregator at `feed` as a consuming contract sees it
    fn price_reading(&self, feed: Address) -> Result<PriceReading, Revert> {
        match self.contracts.get(&feed).map(|c| &c.native) {
            Some(Native::MockV3Aggregator(aggregator)) => Ok(aggregator.reading()),
            // Calling into an address without code reverts without data
            _ => Err(Revert::Unknown(Bytes::new())),
        }
    }

    fn next_nonce(&mut self, account: Address) -> u64 {
        let nonce = self.nonces.entry(account).or_default();
        let current = *nonce;
        *nonce += 1;
        current
    }

    /// Charge `gas` and `value` to `from`, failing before any state change
    fn charge(
        &mut self,
        from: Address,
        gas: u64,
        gas_price: U256,
        value: U256,
    ) -> Result<U256, ChainError> {
        let fee = U256::from(gas) * gas_price;
        let required = fee + value;
        let available = self.balance(from);
        if available < required {
            return Err(ChainError::InsufficientFunds {
                sender: from,
                required,
                available,
            });
        }
        self.balances.insert(from, available - required);
        Ok(fee)
    }

    fn mine(
        &mut self,
        from: Address,
        to: Option<Address>,
        nonce: u64,
        gas_used: u64,
        gas_price: U256,
        contract_address: Option<Address>,
    ) -> TxReceipt {
        self.block_number += 1;
        self.timestamp += 1;

        let mut preimage = from.as_bytes().to_vec();
        preimage.extend_from_slice(&nonce.to_be_bytes());

        TxReceipt {
            transaction_hash: H256::from(keccak256(preimage)),
            block_number: self.block_number,
            from,
            to,
            contract_address,
            gas_used: U256::from(gas_used),
            effective_gas_price: gas_price,
        }
    }
}

#[async_trait]
impl ChainClient for LocalChain {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(self.chain_id)
    }

    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        Ok(self.accounts.clone())
    }

    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        Ok(self.inner.lock().state.balance(address))
    }

    async fn code(&self, address: Address) -> Result<Bytes, ChainError> {
        let inner = self.inner.lock();
        // Natively hosted contracts have no bytecode; report a stable marker
        Ok(match inner.state.contracts.get(&address) {
            Some(contract) => Bytes::from(keccak256(contract.name.as_bytes()).to_vec()),
            None => Bytes::new(),
        })
    }

    async fn deploy(&self, request: DeployRequest) -> Result<TxReceipt, ChainError> {
        self.require_account(request.from)?;
        let mut inner = self.inner.lock();
        let state = &mut inner.state;

        let (native, gas) = match request.contract_name.as_str() {
            FUND_ME => (
                FundMe::from_args(request.from, &request.args).map(Native::FundMe),
                1_050_000,
            ),
            MOCK_V3_AGGREGATOR => (
                MockV3Aggregator::from_args(&request.args, state.timestamp)
                    .map(Native::MockV3Aggregator),
                570_000,
            ),
            other => return Err(ChainError::UnsupportedContract(other.to_string())),
        };
        let native = native.ok_or(ChainError::Abi(abi::Error::InvalidData))?;
        let gas_used = TX_BASE_GAS + gas;

        state.charge(request.from, gas_used, self.gas_price, U256::zero())?;
        let nonce = state.next_nonce(request.from);
        let address = get_contract_address(request.from, nonce);

        state.contracts.insert(
            address,
            HostedContract {
                name: request.contract_name.clone(),
                abi: request.abi,
                native,
            },
        );
        let receipt = state.mine(
            request.from,
            None,
            nonce,
            gas_used,
            self.gas_price,
            Some(address),
        );
        if request.confirmations > 1 {
            state.block_number += request.confirmations as u64 - 1;
        }

        debug!(
            "devnet: deployed {} at {:?} (gas {})",
            request.contract_name, address, gas_used
        );
        Ok(receipt)
    }

    async fn send(&self, request: TxRequest) -> Result<TxReceipt, ChainError> {
        self.require_account(request.from)?;
        let mut inner = self.inner.lock();
        let state = &mut inner.state;

        let hosted = state
            .contracts
            .get(&request.to)
            .ok_or(ChainError::NoContract(request.to))?;
        let (function, args) = decode_call(&hosted.abi, &request.data)?;
        let function = function.to_string();
        trace!("devnet: {:?} -> {}({:?})", request.from, function, args);

        let now = state.timestamp + 1;

        // Execute against a copy so a revert or an unaffordable fee leaves
        // the contract untouched
        let mut native = hosted.native.clone();
        let current = &*state;
        let outcome = match &mut native {
            Native::FundMe(fund_me) => {
                let feed = fund_me.price_feed();
                fund_me.transact(request.from, request.value, &function, || {
                    current.price_reading(feed)
                })
            }
            Native::MockV3Aggregator(aggregator) if request.value.is_zero() => {
                aggregator.transact(&function, &args, now)
            }
            Native::MockV3Aggregator(_) => Err(Revert::Unknown(Bytes::new())),
        }
        .map_err(ChainError::Reverted)?;

        let gas_used = TX_BASE_GAS + outcome.gas_used;
        state.charge(request.from, gas_used, self.gas_price, request.value)?;

        let contract_balance = state.balance(request.to) + request.value;
        match outcome.payout {
            Some(recipient) => {
                state.balances.insert(request.to, U256::zero());
                let recipient_balance = state.balance(recipient);
                state
                    .balances
                    .insert(recipient, recipient_balance + contract_balance);
            }
            None => {
                state.balances.insert(request.to, contract_balance);
            }
        }

        if let Some(hosted) = state.contracts.get_mut(&request.to) {
            hosted.native = native;
        }

        let nonce = state.next_nonce(request.from);
        let receipt = state.mine(
            request.from,
            Some(request.to),
            nonce,
            gas_used,
            self.gas_price,
            None,
        );
        if request.confirmations > 1 {
            state.block_number += request.confirmations as u64 - 1;
        }
        Ok(receipt)
    }

    async fn call(&self, request: CallRequest) -> Result<Bytes, ChainError> {
        let inner = self.inner.lock();
        let state = &inner.state;

        let hosted = state
            .contracts
            .get(&request.to)
            .ok_or(ChainError::NoContract(request.to))?;
        let (function, args) = decode_call(&hosted.abi, &request.data)?;

        let output = match &hosted.native {
            Native::FundMe(fund_me) => {
                fund_me.view(function, &args, || state.price_reading(fund_me.price_feed()))
            }
            Native::MockV3Aggregator(aggregator) => aggregator.view(function, &args),
        }
        .map_err(ChainError::Reverted)?;

        encode_output(&hosted.abi, function, &output)
    }

    async fn snapshot(&self) -> Result<U256, ChainError> {
        let mut inner = self.inner.lock();
        let id = inner.next_snapshot;
        inner.next_snapshot = id + 1;
        let state = inner.state.clone();
        inner.snapshots.insert(id, state);
        debug!("devnet: snapshot {} at block {}", id, inner.state.block_number);
        Ok(id)
    }

    async fn revert_to(&self, snapshot: U256) -> Result<(), ChainError> {
        let mut inner = self.inner.lock();
        let state = inner
            .snapshots
            .remove(&snapshot)
            .ok_or(ChainError::UnknownSnapshot(snapshot))?;

        // Later snapshots describe a future that no longer exists
        let _ = inner.snapshots.split_off(&snapshot);
        inner.state = state;
        debug!("devnet: reverted to snapshot {}", snapshot);
        Ok(())
    }
}
