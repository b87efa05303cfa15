use std::sync::Arc;

use ethers::abi::Token;
use ethers::types::{Address, I256, U256};

use super::handle::{uint_output, ContractHandle};
use super::Artifact;
use crate::chain::{ChainClient, ChainError, TxReceipt};

/// One price feed round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundData {
    pub round_id: U256,
    pub answer: I256,
    pub started_at: U256,
    pub updated_at: U256,
    pub answered_in_round: U256,
}

impl RoundData {
    fn from_tokens(tokens: Vec<Token>) -> Result<Self, ChainError> {
        match tokens.as_slice() {
            [Token::Uint(round_id), Token::Int(answer), Token::Uint(started_at), Token::Uint(updated_at), Token::Uint(answered_in_round)] => {
                Ok(Self {
                    round_id: *round_id,
                    answer: I256::from_raw(*answer),
                    started_at: *started_at,
                    updated_at: *updated_at,
                    answered_in_round: *answered_in_round,
                })
            }
            _ => Err(ChainError::Abi(ethers::abi::Error::InvalidData)),
        }
    }
}

/// Typed access to an AggregatorV3-style price feed
#[derive(Clone)]
pub struct PriceFeedContract {
    inner: ContractHandle,
}

impl PriceFeedContract {
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

    pub fn address(&self) -> Address {
        self.inner.address()
    }

    pub async fn decimals(&self) -> Result<u8, ChainError> {
        Ok(uint_output(self.inner.call("decimals", &[]).await?)?.low_u32() as u8)
    }

    pub async fn version(&self) -> Result<U256, ChainError> {
        uint_output(self.inner.call("version", &[]).await?)
    }

    pub async fn description(&self) -> Result<String, ChainError> {
        self.inner
            .call("description", &[])
            .await?
            .into_iter()
            .next()
            .and_then(Token::into_string)
            .ok_or(ChainError::Abi(ethers::abi::Error::InvalidData))
    }

    pub async fn latest_round_data(&self) -> Result<RoundData, ChainError> {
        RoundData::from_tokens(self.inner.call("latestRoundData", &[]).await?)
    }

    pub async fn get_round_data(&self, round_id: U256) -> Result<RoundData, ChainError> {
        RoundData::from_tokens(self.inner.call("getRoundData", &[Token::Uint(round_id)]).await?)
    }

    /// Push a new answer; only meaningful on the mock feed
    pub async fn update_answer(&self, answer: I256) -> Result<TxReceipt, ChainError> {
        self.inner
            .send("updateAnswer", &[Token::Int(answer.into_raw())], U256::zero())
            .await
    }
}
