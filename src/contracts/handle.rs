use std::sync::Arc;

use ethers::abi::{Abi, Token};
use ethers::types::{Address, U256};

use crate::chain::{CallRequest, ChainClient, ChainError, TxReceipt, TxRequest};

/// Deployed contract bound to a sending identity
#[derive(Clone)]
pub struct ContractHandle {
    address: Address,
    abi: Abi,
    client: Arc<dyn ChainClient>,
    signer: Address,
    confirmations: usize,
}

impl ContractHandle {
    pub fn new(address: Address, abi: Abi, client: Arc<dyn ChainClient>, signer: Address) -> Self {
        Self {
            address,
            abi,
            client,
            signer,
            confirmations: 1,
        }
    }

    /// Same contract, sending from another identity
    pub fn connect(&self, signer: Address) -> Self {
        Self {
            signer,
            ..self.clone()
        }
    }

    /// Wait for this many confirmations on every transaction
    pub fn with_confirmations(mut self, confirmations: usize) -> Self {
        self.confirmations = confirmations.max(1);
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer(&self) -> Address {
        self.signer
    }

    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    /// Read-only call, decoded with the function's outputs
    pub async fn call(&self, function: &str, args: &[Token]) -> Result<Vec<Token>, ChainError> {
        let function = self.abi.function(function)?;
        let data = function.encode_input(args)?;

        let output = self
            .client
            .call(CallRequest {
                from: Some(self.signer),
                to: self.address,
                data: data.into(),
            })
            .await
            .map_err(|e| e.with_abi(&self.abi))?;

        Ok(function.decode_output(&output)?)
    }

    /// State-changing call from the bound signer
    pub async fn send(
        &self,
        function: &str,
        args: &[Token],
        value: U256,
    ) -> Result<TxReceipt, ChainError> {
        let data = self.abi.function(function)?.encode_input(args)?;

        self.client
            .send(TxRequest {
                from: self.signer,
                to: self.address,
                data: data.into(),
                value,
                confirmations: self.confirmations,
            })
            .await
            .map_err(|e| e.with_abi(&self.abi))
    }

    /// Native balance held by the contract
    pub async fn balance(&self) -> Result<U256, ChainError> {
        self.client.balance(self.address).await
    }
}

/// First output of a call as an address
pub(crate) fn address_output(tokens: Vec<Token>) -> Result<Address, ChainError> {
    tokens
        .into_iter()
        .next()
        .and_then(Token::into_address)
        .ok_or(ChainError::Abi(ethers::abi::Error::InvalidData))
}

/// First output of a call as an unsigned integer
pub(crate) fn uint_output(tokens: Vec<Token>) -> Result<U256, ChainError> {
    tokens
        .into_iter()
        .next()
        .and_then(Token::into_uint)
        .ok_or(ChainError::Abi(ethers::abi::Error::InvalidData))
}
