// FundMe deployment tooling
//
// Network table, deployment scripts, chain clients and the in-process
// development chain the scripts and tests run against.

pub mod api;
pub mod chain;
pub mod contracts;
pub mod deploy;
pub mod devnet;
pub mod error;
pub mod ethereum;

pub use chain::{ChainClient, ChainError, Revert, TxReceipt};
pub use deploy::{DeployEnvironment, DeployScript};
pub use error::{DeployError, Result};
