use std::sync::Arc;

use common::FundingSnapshot;
use ethers::abi::Token;
use ethers::types::{Address, U256};

use super::handle::{address_output, uint_output, ContractHandle};
use super::Artifact;
use crate::chain::{ChainClient, ChainError, TxReceipt};

/// Typed access to a deployed FundMe contract
#[derive(Clone)]
pub struct FundMeContract {
    inner: ContractHandle,
}

impl FundMeContract {
    pub fn new(
        address: Address,
        artifact: &Artifact,
        client: Arc<dyn ChainClient>,
        signer: Address,
    ) -> Self {
        Self {
            inner: ContractHandle::new(address, artifact.abi.clone(), client, signer),
        }
    }

    /// Same contract, sending from `signer`
    pub fn connect(&self, signer: Address) -> Self {
        Self {
            inner: self.inner.connect(signer),
        }
    }

    pub fn with_confirmations(self, confirmations: usize) -> Self {
        Self {
            inner: self.inner.with_confirmations(confirmations),
        }
    }

    pub fn address(&self) -> Address {
        self.inner.address()
    }

    pub fn signer(&self) -> Address {
        self.inner.signer()
    }

    pub fn handle(&self) -> &ContractHandle {
        &self.inner
    }

    /// Contribute `value` wei
    pub async fn fund(&self, value: U256) -> Result<TxReceipt, ChainError> {
        self.inner.send("fund", &[], value).await
    }

    pub async fn withdraw(&self) -> Result<TxReceipt, ChainError> {
        self.inner.send("withdraw", &[], U256::zero()).await
    }

    /// Withdrawal variant that reads the funder list into memory once
    pub async fn cheaper_withdraw(&self) -> Result<TxReceipt, ChainError> {
        self.inner.send("cheaperWithdraw", &[], U256::zero()).await
    }

    pub async fn get_owner(&self) -> Result<Address, ChainError> {
        address_output(self.inner.call("getOwner", &[]).await?)
    }

    pub async fn get_price_feed(&self) -> Result<Address, ChainError> {
        address_output(self.inner.call("getPriceFeed", &[]).await?)
    }

    pub async fn get_funder(&self, index: usize) -> Result<Address, ChainError> {
        let args = [Token::Uint(U256::from(index))];
        address_output(self.inner.call("getFunder", &args).await?)
    }

    pub async fn get_address_to_amount_funded(&self, funder: Address) -> Result<U256, ChainError> {
        let args = [Token::Address(funder)];
        uint_output(self.inner.call("getAddressToAmountFunded", &args).await?)
    }

    /// Version of the price feed the contract reads
    pub async fn get_version(&self) -> Result<U256, ChainError> {
        uint_output(self.inner.call("getVersion", &[]).await?)
    }

    /// Minimum contribution in USD with 18 decimals
    pub async fn minimum_usd(&self) -> Result<U256, ChainError> {
        uint_output(self.inner.call("MINIMUM_USD", &[]).await?)
    }

    pub async fn balance(&self) -> Result<U256, ChainError> {
        self.inner.balance().await
    }

    /// Every funder, read until `getFunder` runs past the end of the list
    pub async fn funders(&self) -> Result<Vec<Address>, ChainError> {
        let mut funders = Vec::new();
        loop {
            match self.get_funder(funders.len()).await {
                Ok(funder) => funders.push(funder),
                Err(ChainError::Reverted(revert)) if revert.is_out_of_bounds() => break,
                Err(e) => return Err(e),
            }
        }
        Ok(funders)
    }

    /// Observe the contract's funding state
    ///
    /// Amounts are read for every listed funder plus the addresses in
    /// `extra`, so cleared contributors can still be checked after a
    /// withdrawal.
    pub async fn snapshot(&self, extra: &[Address]) -> Result<FundingSnapshot, ChainError> {
        let funders = self.funders().await?;

        let mut observed: Vec<Address> = Vec::new();
        for address in funders.iter().chain(extra) {
            if !observed.contains(address) {
                observed.push(*address);
            }
        }

        let mut amounts = Vec::with_capacity(observed.len());
        for address in observed {
            amounts.push((address, self.get_address_to_amount_funded(address).await?));
        }

        Ok(FundingSnapshot {
            address: self.address(),
            owner: self.get_owner().await?,
            price_feed: self.get_price_feed().await?,
            balance: self.balance().await?,
            funders,
            amounts,
        })
    }
}
