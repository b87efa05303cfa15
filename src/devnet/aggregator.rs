// Mock price feed hosted by the development chain
//
// Mirrors Chainlink's MockV3Aggregator: a fixed number of decimals and an
// answer that only changes through `updateAnswer`, each update opening a
// new round.

use std::collections::HashMap;

use ethers::abi::Token;
use ethers::types::{I256, U256};

use super::{Outcome, PriceReading};
use crate::chain::Revert;

const DESCRIPTION: &str = "v0.6/tests/MockV3Aggregator.sol";

#[derive(Debug, Clone)]
struct Round {
    answer: I256,
    started_at: U256,
    updated_at: U256,
}

impl Default for Round {
    fn default() -> Self {
        Self {
            answer: I256::zero(),
            started_at: U256::zero(),
            updated_at: U256::zero(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockV3Aggregator {
    decimals: u8,
    latest_round: U256,
    rounds: HashMap<U256, Round>,
}

impl MockV3Aggregator {
    pub const VERSION: u64 = 0;

    /// Gas charged for `updateAnswer`
    const UPDATE_GAS: u64 = 67_000;

    pub fn new(decimals: u8, initial_answer: I256, now: u64) -> Self {
        let mut aggregator = Self {
            decimals,
            latest_round: U256::zero(),
            rounds: HashMap::new(),
        };
        aggregator.update_answer(initial_answer, now);
        aggregator
    }

    /// Constructor arguments: `(uint8 decimals, int256 initialAnswer)`
    pub fn from_args(args: &[Token], now: u64) -> Option<Self> {
        match args {
            [Token::Uint(decimals), Token::Int(answer)] if *decimals <= U256::from(u8::MAX) => {
                Some(Self::new(decimals.low_u32() as u8, I256::from_raw(*answer), now))
            }
            _ => None,
        }
    }

    pub fn update_answer(&mut self, answer: I256, now: u64) {
        self.latest_round += U256::one();
        self.rounds.insert(
            self.latest_round,
            Round {
                answer,
                started_at: U256::from(now),
                updated_at: U256::from(now),
            },
        );
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn latest_answer(&self) -> I256 {
        self.round(self.latest_round).answer
    }

    /// What a consumer sees when it reads the latest round
    pub fn reading(&self) -> PriceReading {
        PriceReading {
            answer: self.latest_answer(),
            decimals: self.decimals,
            version: U256::from(Self::VERSION),
        }
    }

    fn round(&self, round_id: U256) -> Round {
        self.rounds.get(&round_id).cloned().unwrap_or_default()
    }

    fn round_tokens(&self, round_id: U256) -> Vec<Token> {
        let round = self.round(round_id);
        vec![
            Token::Uint(round_id),
            Token::Int(round.answer.into_raw()),
            Token::Uint(round.started_at),
            Token::Uint(round.updated_at),
            Token::Uint(round_id),
        ]
    }

    pub(super) fn view(&self, function: &str, args: &[Token]) -> Result<Vec<Token>, Revert> {
        let output = match (function, args) {
            ("decimals", []) => vec![Token::Uint(U256::from(self.decimals))],
            ("description", []) => vec![Token::String(DESCRIPTION.to_string())],
            ("version", []) => vec![Token::Uint(U256::from(Self::VERSION))],
            ("latestAnswer", []) => vec![Token::Int(self.latest_answer().into_raw())],
            ("latestTimestamp", []) => vec![Token::Uint(self.round(self.latest_round).updated_at)],
            ("latestRound", []) => vec![Token::Uint(self.latest_round)],
            ("latestRoundData", []) => self.round_tokens(self.latest_round),
            ("getRoundData", [Token::Uint(round_id)]) => self.round_tokens(*round_id),
            _ => return Err(Revert::Unknown(Default::default())),
        };
        Ok(output)
    }

    pub(super) fn transact(
        &mut self,
        function: &str,
        args: &[Token],
        now: u64,
    ) -> Result<Outcome, Revert> {
        match (function, args) {
            ("updateAnswer", [Token::Int(answer)]) => {
                self.update_answer(I256::from_raw(*answer), now);
                Ok(Outcome::gas(Self::UPDATE_GAS))
            }
            _ => Err(Revert::Unknown(Default::default())),
        }
    }
}
