//! Scriptable in-memory wallet provider shared by the unit tests.
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use futures::future::BoxFuture;
use serde_json::{json, Value};

use crate::contract::{x10Call, x14Call, x8Call};
use crate::provider::{ProviderError, WalletProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SentTx {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
}

#[derive(Default)]
pub(crate) struct MockProvider {
    pub accounts: Vec<Address>,
    /// Replaces `accounts` once set, as when the user switches in the wallet.
    pub switched_accounts: Mutex<Option<Vec<Address>>>,
    pub reject_connect: bool,
    pub offline: bool,
    pub managed: Vec<Address>,
    pub nonzero: Vec<Address>,
    pub admins: Vec<Address>,
    pub balances: HashMap<Address, U256>,
    pub failing_balances: HashSet<Address>,
    pub fail_list: bool,
    pub list_delay: Option<Duration>,
    pub reject_writes: bool,
    pub revert_writes: bool,
    pub never_confirm: bool,
    pub sent: Mutex<Vec<SentTx>>,
    pub list_calls: AtomicUsize,
    pub balance_calls: AtomicUsize,
}

fn param<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T, ProviderError> {
    serde_json::from_value(value.clone()).map_err(|e| ProviderError::Decode(e.to_string()))
}

fn rpc_error(message: &str) -> ProviderError {
    ProviderError::Rpc {
        code: -32000,
        message: message.to_string(),
    }
}

impl MockProvider {
    pub fn switch_accounts(&self, accounts: Vec<Address>) {
        *self.switched_accounts.lock().unwrap() = Some(accounts);
    }

    fn current_accounts(&self) -> Vec<Address> {
        self.switched_accounts
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| self.accounts.clone())
    }

    async fn handle(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        match method {
            "eth_accounts" => Ok(json!(self.current_accounts())),
            "eth_requestAccounts" => {
                if self.reject_connect {
                    Err(ProviderError::UserRejected)
                } else {
                    Ok(json!(self.current_accounts()))
                }
            }
            "eth_getBalance" => {
                self.balance_calls.fetch_add(1, Ordering::SeqCst);
                let address: Address = param(&params[0])?;
                if self.failing_balances.contains(&address) {
                    return Err(rpc_error("balance lookup failed"));
                }
                let wei = self.balances.get(&address).copied().unwrap_or(U256::ZERO);
                Ok(json!(wei))
            }
            "eth_call" => {
                let data: Bytes = param(&params[0]["data"])?;
                let selector: [u8; 4] = data
                    .get(..4)
                    .and_then(|s| s.try_into().ok())
                    .ok_or_else(|| rpc_error("short calldata"))?;
                let out = if selector == x8Call::SELECTOR {
                    self.list_calls.fetch_add(1, Ordering::SeqCst);
                    if let Some(delay) = self.list_delay {
                        tokio::time::sleep(delay).await;
                    }
                    if self.fail_list {
                        return Err(rpc_error("execution reverted"));
                    }
                    self.managed.abi_encode()
                } else if selector == x10Call::SELECTOR {
                    self.nonzero.abi_encode()
                } else if selector == x14Call::SELECTOR {
                    let call = x14Call::abi_decode(&data).map_err(|e| rpc_error(&e.to_string()))?;
                    self.admins.contains(&call.account).abi_encode()
                } else {
                    return Err(rpc_error("unknown selector"));
                };
                Ok(json!(Bytes::from(out)))
            }
            "eth_sendTransaction" => {
                if self.reject_writes {
                    return Err(ProviderError::UserRejected);
                }
                let tx = &params[0];
                let mut sent = self.sent.lock().unwrap();
                sent.push(SentTx {
                    from: param(&tx["from"])?,
                    to: param(&tx["to"])?,
                    data: param(&tx["data"])?,
                });
                Ok(json!(B256::repeat_byte(sent.len() as u8)))
            }
            "eth_getTransactionReceipt" => {
                if self.never_confirm {
                    return Ok(Value::Null);
                }
                let status = if self.revert_writes { "0x0" } else { "0x1" };
                Ok(json!({ "status": status, "blockNumber": "0x2a" }))
            }
            other => Err(ProviderError::Rpc {
                code: -32601,
                message: format!("method {other} not found"),
            }),
        }
    }
}

impl WalletProvider for MockProvider {
    fn request<'a>(
        &'a self,
        method: &'a str,
        params: Value,
    ) -> BoxFuture<'a, Result<Value, ProviderError>> {
        Box::pin(self.handle(method, params))
    }

    fn is_connected(&self) -> bool {
        !self.offline
    }
}
