//! Data shared between the deployment runtime, the development chain and
//! tooling that only needs to read deployment output.

pub mod types;

pub use types::*;
