// FundMe reference behaviour hosted by the development chain

use std::collections::HashMap;

use ethers::abi::Token;
use ethers::types::{Address, I256, U256};

use super::{Outcome, PriceReading};
use crate::chain::Revert;

/// Custom error raised when someone other than the owner withdraws
pub const NOT_OWNER: &str = "FundMe__NotOwner";

/// Reason string raised when a contribution is too small
pub const BELOW_MINIMUM: &str = "Amount sent is below minimum.";

/// Minimum contribution, 50 USD with 18 decimals
pub fn minimum_usd() -> U256 {
    U256::from(50) * U256::exp10(18)
}

/// USD value (18 decimals) of `wei` at the feed's `answer`
///
/// The feed answer is scaled to 18 decimals first; negative or zero
/// answers value every amount at zero.
pub fn conversion_rate(wei: U256, answer: I256, decimals: u8) -> U256 {
    if answer <= I256::zero() {
        return U256::zero();
    }

    let answer = answer.into_raw();
    let price = if decimals <= 18 {
        answer.saturating_mul(U256::exp10(18 - decimals as usize))
    } else {
        answer / U256::exp10(decimals as usize - 18)
    };

    price.saturating_mul(wei) / U256::exp10(18)
}

#[derive(Debug, Clone)]
pub struct FundMe {
    owner: Address,
    price_feed: Address,
    funders: Vec<Address>,
    amounts: HashMap<Address, U256>,
}

impl FundMe {
    const FUND_GAS: u64 = 87_000;
    const WITHDRAW_BASE_GAS: u64 = 34_000;
    const WITHDRAW_PER_FUNDER_GAS: u64 = 7_700;
    const CHEAPER_WITHDRAW_BASE_GAS: u64 = 33_000;
    const CHEAPER_WITHDRAW_PER_FUNDER_GAS: u64 = 5_600;

    pub fn new(owner: Address, price_feed: Address) -> Self {
        Self {
            owner,
            price_feed,
            funders: Vec::new(),
            amounts: HashMap::new(),
        }
    }

    /// Constructor arguments: `(address priceFeed)`
    pub fn from_args(owner: Address, args: &[Token]) -> Option<Self> {
        match args {
            [Token::Address(price_feed)] => Some(Self::new(owner, *price_feed)),
            _ => None,
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn price_feed(&self) -> Address {
        self.price_feed
    }

    pub fn funders(&self) -> &[Address] {
        &self.funders
    }

    pub fn amount_funded(&self, funder: Address) -> U256 {
        self.amounts.get(&funder).copied().unwrap_or_default()
    }

    pub fn fund(&mut self, sender: Address, value: U256, feed: &PriceReading) -> Result<(), Revert> {
        if conversion_rate(value, feed.answer, feed.decimals) < minimum_usd() {
            return Err(Revert::Reason(BELOW_MINIMUM.to_string()));
        }

        *self.amounts.entry(sender).or_default() += value;
        self.funders.push(sender);
        Ok(())
    }

    /// Clear every recorded contribution; the caller moves the balance
    pub fn withdraw(&mut self, sender: Address) -> Result<(), Revert> {
        if sender != self.owner {
            return Err(Revert::CustomError(NOT_OWNER.to_string()));
        }

        for funder in self.funders.drain(..) {
            self.amounts.insert(funder, U256::zero());
        }
        Ok(())
    }

    fn withdraw_gas(&self, base: u64, per_funder: u64) -> u64 {
        base + per_funder * self.funders.len() as u64
    }

    /// Only `getVersion` reads the price feed
    pub(super) fn view<F>(&self, function: &str, args: &[Token], feed: F) -> Result<Vec<Token>, Revert>
    where
        F: FnOnce() -> Result<PriceReading, Revert>,
    {
        let output = match (function, args) {
            ("getOwner", []) => vec![Token::Address(self.owner)],
            ("getPriceFeed", []) => vec![Token::Address(self.price_feed)],
            ("getVersion", []) => vec![Token::Uint(feed()?.version)],
            ("MINIMUM_USD", []) => vec![Token::Uint(minimum_usd())],
            ("getAddressToAmountFunded", [Token::Address(funder)]) => {
                vec![Token::Uint(self.amount_funded(*funder))]
            }
            ("getFunder", [Token::Uint(index)]) => {
                let funder = usize::try_from(*index)
                    .ok()
                    .and_then(|index| self.funders.get(index))
                    .ok_or(Revert::Panic(U256::from(Revert::ARRAY_OUT_OF_BOUNDS)))?;
                vec![Token::Address(*funder)]
            }
            _ => return Err(Revert::Unknown(Default::default())),
        };
        Ok(output)
    }

    /// Only funding reads the price feed
    pub(super) fn transact<F>(
        &mut self,
        sender: Address,
        value: U256,
        function: &str,
        feed: F,
    ) -> Result<Outcome, Revert>
    where
        F: FnOnce() -> Result<PriceReading, Revert>,
    {
        match function {
            // receive() and fallback() both forward to fund()
            "fund" | "" => {
                self.fund(sender, value, &feed()?)?;
                Ok(Outcome::gas(Self::FUND_GAS))
            }
            "withdraw" | "cheaperWithdraw" if !value.is_zero() => {
                Err(Revert::Unknown(Default::default()))
            }
            "withdraw" => {
                let gas = self.withdraw_gas(Self::WITHDRAW_BASE_GAS, Self::WITHDRAW_PER_FUNDER_GAS);
                self.withdraw(sender)?;
                Ok(Outcome::gas(gas).paying_out(self.owner))
            }
            "cheaperWithdraw" => {
                let gas = self.withdraw_gas(
                    Self::CHEAPER_WITHDRAW_BASE_GAS,
                    Self::CHEAPER_WITHDRAW_PER_FUNDER_GAS,
                );
                self.withdraw(sender)?;
                Ok(Outcome::gas(gas).paying_out(self.owner))
            }
            _ => Err(Revert::Unknown(Default::default())),
        }
    }
}
