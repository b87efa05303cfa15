use std::fmt;

use ethers::abi::{self, Abi, ParamType, Token};
use ethers::types::{Bytes, U256};
use ethers::utils::id;

/// Selector of Solidity's `Error(string)`
const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Selector of Solidity's `Panic(uint256)`
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Reason a contract rejected a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revert {
    /// `require`/`revert` with a message
    Reason(String),
    /// Named custom error
    CustomError(String),
    /// Compiler-inserted check, e.g. array index out of bounds
    Panic(U256),
    /// Revert data that could not be decoded
    Unknown(Bytes),
}

impl Revert {
    /// Panic code for an out-of-bounds array access
    pub const ARRAY_OUT_OF_BOUNDS: u64 = 0x32;

    /// Decode raw revert data
    pub fn decode(data: &[u8]) -> Self {
        if data.len() >= 4 {
            let (selector, payload) = data.split_at(4);
            if selector == ERROR_SELECTOR {
                if let Ok(mut tokens) = abi::decode(&[ParamType::String], payload) {
                    if let Some(Token::String(reason)) = tokens.pop() {
                        return Revert::Reason(reason);
                    }
                }
            } else if selector == PANIC_SELECTOR {
                if let Ok(mut tokens) = abi::decode(&[ParamType::Uint(256)], payload) {
                    if let Some(Token::Uint(code)) = tokens.pop() {
                        return Revert::Panic(code);
                    }
                }
            }
        }
        Revert::Unknown(Bytes::from(data.to_vec()))
    }

    /// Encode the revert the way the EVM returns it
    pub fn encode(&self, abi: &Abi) -> Bytes {
        let mut data = Vec::new();
        match self {
            Revert::Reason(reason) => {
                data.extend_from_slice(&ERROR_SELECTOR);
                data.extend(abi::encode(&[Token::String(reason.clone())]));
            }
            Revert::Panic(code) => {
                data.extend_from_slice(&PANIC_SELECTOR);
                data.extend(abi::encode(&[Token::Uint(*code)]));
            }
            // Errors missing from the ABI are taken to have no parameters
            Revert::CustomError(name) => match abi.errors().find(|error| &error.name == name) {
                Some(error) => data.extend_from_slice(&error.signature().as_bytes()[..4]),
                None => data.extend_from_slice(&id(format!("{}()", name))),
            },
            Revert::Unknown(raw) => data.extend_from_slice(raw),
        }
        data.into()
    }

    /// Resolve an undecoded selector against the custom errors in `abi`
    pub fn with_abi(self, abi: &Abi) -> Self {
        match self {
            Revert::Unknown(data) if data.len() >= 4 => abi
                .errors()
                .find(|error| error.signature().as_bytes()[..4] == data[..4])
                .map(|error| Revert::CustomError(error.name.clone()))
                .unwrap_or(Revert::Unknown(data)),
            other => other,
        }
    }

    /// Out-of-bounds array read, the revert `getFunder` raises past the end
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, Revert::Panic(code) if *code == U256::from(Self::ARRAY_OUT_OF_BOUNDS))
    }
}

impl fmt::Display for Revert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revert::Reason(reason) => write!(f, "{}", reason),
            Revert::CustomError(name) => write!(f, "custom error {}", name),
            Revert::Panic(code) => write!(f, "panic code {:#x}", code),
            Revert::Unknown(data) => write!(f, "unrecognised revert data {}", data),
        }
    }
}
