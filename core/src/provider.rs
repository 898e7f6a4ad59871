/// Wallet-provider boundary: an EIP-1193 style `request({method, params})`
/// object plus typed helpers for the handful of methods the dashboard needs.
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use anyhow::Context;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

/// EIP-1193: the user rejected the request.
const USER_REJECTED: i64 = 4001;
/// JSON-RPC: method does not exist.
const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Request rejected by the user")]
    UserRejected,
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Provider transport error: {0}")]
    Transport(String),
    #[error("Malformed provider response: {0}")]
    Decode(String),
}

/// An injected wallet provider. Implementations forward requests to whatever
/// holds the keys (browser extension bridge, unlocked dev node, test mock).
pub trait WalletProvider: Send + Sync {
    fn request<'a>(
        &'a self,
        method: &'a str,
        params: Value,
    ) -> BoxFuture<'a, Result<Value, ProviderError>>;

    /// Whether the provider currently has a live connection to its backend.
    fn is_connected(&self) -> bool {
        true
    }
}

/// Minimal transaction receipt view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub hash: B256,
    pub success: bool,
    pub block_number: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    status: Option<U256>,
    block_number: Option<U256>,
}

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T, ProviderError> {
    serde_json::from_value(value).map_err(|e| ProviderError::Decode(format!("{method}: {e}")))
}

/// Accounts the user has already authorised. Never prompts.
pub async fn accounts(provider: &dyn WalletProvider) -> Result<Vec<Address>, ProviderError> {
    let value = provider.request("eth_accounts", json!([])).await?;
    decode("eth_accounts", value)
}

/// Ask the user to authorise accounts. May open a wallet prompt.
pub async fn request_accounts(provider: &dyn WalletProvider) -> Result<Vec<Address>, ProviderError> {
    let value = provider.request("eth_requestAccounts", json!([])).await?;
    decode("eth_requestAccounts", value)
}

/// Native-currency balance of `address` in wei.
pub async fn balance(provider: &dyn WalletProvider, address: Address) -> Result<U256, ProviderError> {
    let value = provider
        .request("eth_getBalance", json!([address, "latest"]))
        .await?;
    decode("eth_getBalance", value)
}

/// Read-only contract call.
pub async fn call(
    provider: &dyn WalletProvider,
    to: Address,
    data: Bytes,
) -> Result<Bytes, ProviderError> {
    let value = provider
        .request("eth_call", json!([{ "to": to, "data": data }, "latest"]))
        .await?;
    decode("eth_call", value)
}

/// Submit a state-changing call signed by `from`. Returns the transaction hash.
pub async fn send_transaction(
    provider: &dyn WalletProvider,
    from: Address,
    to: Address,
    data: Bytes,
) -> Result<B256, ProviderError> {
    let value = provider
        .request(
            "eth_sendTransaction",
            json!([{ "from": from, "to": to, "data": data }]),
        )
        .await?;
    decode("eth_sendTransaction", value)
}

/// Receipt for `hash`, or `None` while the transaction is still pending.
pub async fn transaction_receipt(
    provider: &dyn WalletProvider,
    hash: B256,
) -> Result<Option<TxReceipt>, ProviderError> {
    let value = provider
        .request("eth_getTransactionReceipt", json!([hash]))
        .await?;
    if value.is_null() {
        return Ok(None);
    }
    let raw: RawReceipt = decode("eth_getTransactionReceipt", value)?;
    Ok(Some(TxReceipt {
        hash,
        // Pre-Byzantium receipts have no status; treat as success.
        success: raw.status.map(|s| s == U256::from(1)).unwrap_or(true),
        block_number: raw.block_number.map(|n| n.saturating_to::<u64>()),
    }))
}

/// Provider backed by a JSON-RPC node over HTTP (an unlocked dev node or a
/// signing proxy). `eth_requestAccounts` falls back to `eth_accounts` when
/// the node does not know it, since there is no prompt to show.
pub struct HttpProvider {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpProvider {
    /// Every request fails with a transport error once `timeout` elapses, so
    /// a node that accepts but never answers cannot stall a fetch cycle.
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build RPC HTTP client")?;
        Ok(Self {
            client,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, method: &str, params: &Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let payload: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        parse_rpc_response(payload)
    }
}

/// Split a JSON-RPC response envelope into its result or a typed error.
fn parse_rpc_response(mut payload: Value) -> Result<Value, ProviderError> {
    if let Some(err) = payload.get("error").filter(|e| !e.is_null()) {
        let code = err.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        if code == USER_REJECTED {
            return Err(ProviderError::UserRejected);
        }
        return Err(ProviderError::Rpc { code, message });
    }
    match payload.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(ProviderError::Decode("response has neither result nor error".into())),
    }
}

impl WalletProvider for HttpProvider {
    fn request<'a>(
        &'a self,
        method: &'a str,
        params: Value,
    ) -> BoxFuture<'a, Result<Value, ProviderError>> {
        Box::pin(async move {
            match self.post(method, &params).await {
                Err(ProviderError::Rpc { code, .. })
                    if code == METHOD_NOT_FOUND && method == "eth_requestAccounts" =>
                {
                    self.post("eth_accounts", &params).await
                }
                other => other,
            }
        })
    }
}
