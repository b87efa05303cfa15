// JSON-RPC chain client
//
// `EthereumConnector` drives a node over HTTP. Transactions are signed locally
// when private keys are configured, otherwise the node's unlocked accounts
// are used (a local development node).

pub mod chain;
pub mod etherscan;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, JsonRpcError, Middleware, MiddlewareError, PendingTransaction, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, Bytes, TransactionRequest, U256},
};
use log::{debug, info};
use serde_json::Value;

use crate::chain::{
    CallRequest, ChainClient, ChainError, DeployRequest, Revert, TxReceipt, TxRequest,
};

type SigningClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Interface to an Ethereum node
pub struct EthereumConnector {
    provider: Arc<Provider<Http>>,
    chain_id: u64,
    signers: Vec<Address>,
    clients: HashMap<Address, SigningClient>,
}

impl EthereumConnector {
    /// Connect to `rpc_url`, signing with `private_keys` when any are given
    pub async fn connect(
        rpc_url: &str,
        private_keys: &[String],
        poll_interval: Option<Duration>,
    ) -> Result<Self, ChainError> {
        let mut provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| ChainError::Rpc(format!("invalid RPC URL {}: {}", rpc_url, e)))?;
        if let Some(interval) = poll_interval {
            provider = provider.interval(interval);
        }
        let provider = Arc::new(provider);

        let chain_id = provider.get_chainid().await.map_err(rpc_error)?.as_u64();

        let mut signers = Vec::with_capacity(private_keys.len());
        let mut clients = HashMap::new();
        for (index, key) in private_keys.iter().enumerate() {
            let wallet = key
                .trim()
                .parse::<LocalWallet>()
                .map_err(|_| ChainError::Rpc(format!("account {} is not a valid private key", index)))?
                .with_chain_id(chain_id);
            let address = wallet.address();
            signers.push(address);
            clients.insert(address, SignerMiddleware::new((*provider).clone(), wallet));
        }

        info!(
            "Connected to chain {} at {} ({} local signers)",
            chain_id,
            rpc_url,
            signers.len()
        );

        Ok(Self {
            provider,
            chain_id,
            signers,
            clients,
        })
    }

    pub fn provider(&self) -> &Arc<Provider<Http>> {
        &self.provider
    }

    /// Submit a transaction and wait until it has `confirmations` blocks
    async fn submit(
        &self,
        tx: TransactionRequest,
        from: Address,
        confirmations: usize,
    ) -> Result<TxReceipt, ChainError> {
        let pending: PendingTransaction<'_, Http> = match self.clients.get(&from) {
            Some(client) => client.send_transaction(tx, None).await.map_err(rpc_error)?,
            None if self.signers.is_empty() => {
                self.provider.send_transaction(tx, None).await.map_err(rpc_error)?
            }
            None => return Err(ChainError::UnknownAccount(from)),
        };

        let hash = *pending;
        debug!("Waiting for {} confirmations of {:?}", confirmations, hash);

        let receipt = pending
            .confirmations(confirmations.max(1))
            .await
            .map_err(rpc_error)?
            .ok_or(ChainError::Dropped(hash))?;

        // Status 0 means the transaction was mined but reverted
        if receipt.status.map(|status| status.is_zero()).unwrap_or(false) {
            return Err(ChainError::Reverted(Revert::Unknown(Bytes::new())));
        }
        Ok(receipt.into())
    }
}

/// Convert a middleware error, decoding revert data when the node sent any
fn rpc_error<E: MiddlewareError>(err: E) -> ChainError {
    if let Some(response) = err.as_error_response() {
        if let Some(revert) = response_revert(response) {
            return ChainError::Reverted(revert);
        }
    }
    ChainError::Rpc(err.to_string())
}

fn response_revert(response: &JsonRpcError) -> Option<Revert> {
    if let Some(data) = response.data.as_ref().and_then(revert_data) {
        return Some(Revert::decode(&data));
    }

    let message = response.message.as_str();
    if let Some(reason) = message.strip_prefix("execution reverted: ") {
        return Some(Revert::Reason(reason.to_string()));
    }
    if message == "execution reverted" {
        return Some(Revert::Unknown(Bytes::new()));
    }
    None
}

/// Revert bytes from a JSON-RPC error payload
///
/// Nodes send either the hex string itself or an object with a `data` field.
fn revert_data(data: &Value) -> Option<Bytes> {
    match data {
        Value::String(hex_data) => hex_data
            .strip_prefix("0x")
            .and_then(|raw| hex::decode(raw).ok())
            .map(Bytes::from),
        Value::Object(object) => object.get("data").and_then(revert_data),
        _ => None,
    }
}

#[async_trait]
impl ChainClient for EthereumConnector {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(self.chain_id)
    }

    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        if !self.signers.is_empty() {
            return Ok(self.signers.clone());
        }
        self.provider.get_accounts().await.map_err(rpc_error)
    }

    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        self.provider
            .get_balance(address, None)
            .await
            .map_err(rpc_error)
    }

    async fn code(&self, address: Address) -> Result<Bytes, ChainError> {
        self.provider.get_code(address, None).await.map_err(rpc_error)
    }

    async fn deploy(&self, request: DeployRequest) -> Result<TxReceipt, ChainError> {
        if request.bytecode.is_empty() {
            return Err(ChainError::UnsupportedContract(request.contract_name));
        }

        let tx = TransactionRequest::new()
            .from(request.from)
            .data(request.creation_code()?);

        self.submit(tx, request.from, request.confirmations).await
    }

    async fn send(&self, request: TxRequest) -> Result<TxReceipt, ChainError> {
        let tx = TransactionRequest::new()
            .from(request.from)
            .to(request.to)
            .data(request.data)
            .value(request.value);

        self.submit(tx, request.from, request.confirmations).await
    }

    async fn call(&self, request: CallRequest) -> Result<Bytes, ChainError> {
        let mut tx = TransactionRequest::new().to(request.to).data(request.data);
        if let Some(from) = request.from {
            tx = tx.from(from);
        }

        self.provider
            .call(&tx.into(), None)
            .await
            .map_err(rpc_error)
    }

    async fn snapshot(&self) -> Result<U256, ChainError> {
        self.provider
            .request::<_, U256>("evm_snapshot", ())
            .await
            .map_err(rpc_error)
    }

    async fn revert_to(&self, snapshot: U256) -> Result<(), ChainError> {
        let reverted = self
            .provider
            .request::<_, bool>("evm_revert", [snapshot])
            .await
            .map_err(rpc_error)?;

        if reverted {
            Ok(())
        } else {
            Err(ChainError::UnknownSnapshot(snapshot))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn error(message: &str, data: Option<Value>) -> JsonRpcError {
        JsonRpcError {
            code: 3,
            message: message.to_string(),
            data,
        }
    }

    #[test]
    fn test_revert_from_data_string() {
        let data = Revert::Reason("Amount sent is below minimum.".to_string())
            .encode(&Default::default());
        let response = error(
            "execution reverted",
            Some(Value::String(format!("0x{}", hex::encode(&data)))),
        );

        assert_eq!(
            response_revert(&response),
            Some(Revert::Reason("Amount sent is below minimum.".to_string()))
        );
    }

    #[test]
    fn test_revert_from_nested_data() {
        let response = error(
            "VM Exception while processing transaction",
            Some(json!({ "message": "revert", "data": "0x30cd7471" })),
        );

        assert_eq!(
            response_revert(&response),
            Some(Revert::Unknown(Bytes::from(vec![0x30, 0xcd, 0x74, 0x71])))
        );
    }

    #[test]
    fn test_revert_from_message() {
        let response = error("execution reverted: Amount sent is below minimum.", None);
        assert_eq!(
            response_revert(&response),
            Some(Revert::Reason("Amount sent is below minimum.".to_string()))
        );
    }

    #[test]
    fn test_non_revert_error() {
        let response = error("nonce too low", None);
        assert_eq!(response_revert(&response), None);
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let result = EthereumConnector::connect("not a url", &[], None).await;
        assert!(matches!(result, Err(ChainError::Rpc(_))));
    }
}
