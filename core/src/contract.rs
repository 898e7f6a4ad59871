/// The management contract: one ABI definition shared by every caller, and a
/// session that binds it to a connected signer.
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall, SolValue};
use anyhow::Context;

use crate::error::{DashboardError, Result};
use crate::provider::{self, ProviderError, TxReceipt, WalletProvider};

sol! {
    /// Management contract interface. The deployed contract exposes
    /// obfuscated identifiers; the comments give their meaning.
    interface IStorageManager {
        /// All managed storage contract addresses.
        function x8() external view returns (address[] memory);
        /// Managed addresses currently holding a non-zero balance.
        function x10() external view returns (address[] memory);
        /// Whether `account` is on the admin allow-list.
        function x14(address account) external view returns (bool);
        /// Add `account` to the admin allow-list.
        function x3(address account) external;
        /// Remove `account` from the admin allow-list.
        function x4(address account) external;
        /// Sweep one storage contract's balance to `recipient`.
        function x6(address target, address recipient) external;
        /// Sweep every storage contract's balance to `recipient`.
        function x7(address recipient) external;
    }
}

pub use IStorageManager::{x10Call, x14Call, x3Call, x4Call, x6Call, x7Call, x8Call};

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Fixed contract address + ABI. Built once from config and handed to every
/// session, so there is a single place the binding is described.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractBinding {
    address: Address,
    confirmation_timeout: Duration,
}

impl ContractBinding {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            confirmation_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Bind to a connected signer. `accounts` is what the provider handed back
    /// from the connection handshake; the first entry signs.
    pub fn session(
        &self,
        provider: Arc<dyn WalletProvider>,
        accounts: &[Address],
    ) -> Result<ContractSession> {
        if !provider.is_connected() {
            return Err(DashboardError::ContractInit(
                "Wallet provider is not connected to a network.".into(),
            ));
        }
        let signer = *accounts.first().ok_or_else(|| {
            DashboardError::ContractInit("Wallet returned no accounts to sign with.".into())
        })?;
        if self.address == Address::ZERO {
            return Err(DashboardError::ContractInit(
                "No management contract address configured.".into(),
            ));
        }
        Ok(ContractSession {
            provider,
            signer,
            binding: *self,
        })
    }
}

/// A contract handle bound to one signer. Cheap to clone; replaced whenever
/// the connected account changes.
#[derive(Clone)]
pub struct ContractSession {
    provider: Arc<dyn WalletProvider>,
    signer: Address,
    binding: ContractBinding,
}

impl std::fmt::Debug for ContractSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractSession")
            .field("signer", &self.signer)
            .field("contract", &self.binding.address)
            .finish_non_exhaustive()
    }
}

impl ContractSession {
    pub fn signer(&self) -> Address {
        self.signer
    }

    pub fn contract_address(&self) -> Address {
        self.binding.address
    }

    pub fn provider(&self) -> &dyn WalletProvider {
        self.provider.as_ref()
    }

    async fn read<C: SolCall>(&self, call: C) -> anyhow::Result<Bytes> {
        let data = provider::call(
            self.provider.as_ref(),
            self.binding.address,
            call.abi_encode().into(),
        )
        .await?;
        Ok(data)
    }

    /// List every managed storage contract address.
    pub async fn managed_addresses(&self) -> anyhow::Result<Vec<Address>> {
        let data = self
            .read(x8Call {})
            .await
            .context("Failed to call address list")?;
        Vec::<Address>::abi_decode(&data).context("Failed to decode address list")
    }

    /// List managed addresses the contract reports as holding a balance.
    pub async fn nonzero_addresses(&self) -> anyhow::Result<Vec<Address>> {
        let data = self
            .read(x10Call {})
            .await
            .context("Failed to call non-zero address list")?;
        Vec::<Address>::abi_decode(&data).context("Failed to decode non-zero address list")
    }

    pub async fn is_admin(&self, account: Address) -> anyhow::Result<bool> {
        let data = self
            .read(x14Call { account })
            .await
            .context("Failed to call admin check")?;
        bool::abi_decode(&data).context("Failed to decode admin check")
    }

    /// Native balance of any address, in wei.
    pub async fn balance_of(&self, address: Address) -> std::result::Result<U256, ProviderError> {
        provider::balance(self.provider.as_ref(), address).await
    }

    async fn write<C: SolCall>(&self, call: C) -> Result<PendingTransaction> {
        let hash = provider::send_transaction(
            self.provider.as_ref(),
            self.signer,
            self.binding.address,
            call.abi_encode().into(),
        )
        .await
        .map_err(|e| match e {
            ProviderError::UserRejected => {
                DashboardError::Write("Transaction rejected in wallet.".into())
            }
            other => DashboardError::Write(format!("Failed to submit transaction: {other}")),
        })?;
        Ok(PendingTransaction {
            provider: Arc::clone(&self.provider),
            hash,
            timeout: self.binding.confirmation_timeout,
        })
    }

    pub async fn add_admin(&self, account: Address) -> Result<PendingTransaction> {
        self.write(x3Call { account }).await
    }

    pub async fn remove_admin(&self, account: Address) -> Result<PendingTransaction> {
        self.write(x4Call { account }).await
    }

    pub async fn withdraw_one(
        &self,
        target: Address,
        recipient: Address,
    ) -> Result<PendingTransaction> {
        self.write(x6Call { target, recipient }).await
    }

    pub async fn withdraw_all(&self, recipient: Address) -> Result<PendingTransaction> {
        self.write(x7Call { recipient }).await
    }
}

/// A submitted transaction. Nothing counts as done until [`confirm`](Self::confirm)
/// returns a successful receipt.
pub struct PendingTransaction {
    provider: Arc<dyn WalletProvider>,
    hash: B256,
    timeout: Duration,
}

impl PendingTransaction {
    pub fn hash(&self) -> B256 {
        self.hash
    }

    /// Poll for the receipt until it lands or the timeout elapses.
    pub async fn confirm(self) -> Result<TxReceipt> {
        let hash = self.hash;
        let poll = async {
            loop {
                match provider::transaction_receipt(self.provider.as_ref(), hash).await {
                    Ok(Some(receipt)) => return Ok(receipt),
                    Ok(None) => tokio::time::sleep(RECEIPT_POLL_INTERVAL).await,
                    Err(e) => {
                        return Err(DashboardError::Write(format!(
                            "Failed to fetch receipt for {hash}: {e}"
                        )))
                    }
                }
            }
        };
        let receipt = tokio::time::timeout(self.timeout, poll)
            .await
            .map_err(|_| {
                DashboardError::Write(format!(
                    "Transaction {hash} not confirmed within {}s.",
                    self.timeout.as_secs()
                ))
            })??;
        if !receipt.success {
            return Err(DashboardError::Write(format!("Transaction {hash} reverted.")));
        }
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;

    fn addr(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    fn binding() -> ContractBinding {
        ContractBinding::new(addr(0xcc))
    }

    #[test]
    fn session_needs_an_account() {
        let provider: Arc<dyn WalletProvider> = Arc::new(MockProvider::default());
        let err = binding().session(provider, &[]).unwrap_err();
        assert!(matches!(err, DashboardError::ContractInit(_)));
    }

    #[test]
    fn session_needs_a_contract_address() {
        let provider: Arc<dyn WalletProvider> = Arc::new(MockProvider::default());
        let err = ContractBinding::new(Address::ZERO)
            .session(provider, &[addr(1)])
            .unwrap_err();
        assert!(matches!(err, DashboardError::ContractInit(_)));
    }

    #[test]
    fn session_rejects_disconnected_provider() {
        let provider: Arc<dyn WalletProvider> = Arc::new(MockProvider {
            offline: true,
            ..Default::default()
        });
        assert!(binding().session(provider, &[addr(1)]).is_err());
    }

    #[tokio::test]
    async fn reads_decode_contract_results() {
        let mock = MockProvider {
            managed: vec![addr(1), addr(2)],
            nonzero: vec![addr(2)],
            admins: vec![addr(9)],
            ..Default::default()
        };
        let session = binding().session(Arc::new(mock), &[addr(9)]).unwrap();
        assert_eq!(session.managed_addresses().await.unwrap(), vec![addr(1), addr(2)]);
        assert_eq!(session.nonzero_addresses().await.unwrap(), vec![addr(2)]);
        assert!(session.is_admin(addr(9)).await.unwrap());
        assert!(!session.is_admin(addr(3)).await.unwrap());
    }

    #[tokio::test]
    async fn write_is_sent_from_signer_to_contract() {
        let mock = Arc::new(MockProvider::default());
        let session = binding().session(mock.clone(), &[addr(9)]).unwrap();
        let pending = session.withdraw_one(addr(1), addr(7)).await.unwrap();
        pending.confirm().await.unwrap();

        let sent = mock.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, addr(9));
        assert_eq!(sent[0].to, addr(0xcc));
        assert_eq!(&sent[0].data[..4], &x6Call::SELECTOR[..]);
    }

    #[tokio::test]
    async fn rejected_write_is_write_failure() {
        let mock = MockProvider {
            reject_writes: true,
            ..Default::default()
        };
        let session = binding().session(Arc::new(mock), &[addr(9)]).unwrap();
        let err = session.add_admin(addr(3)).await.err().unwrap();
        match err {
            DashboardError::Write(msg) => assert!(msg.contains("rejected")),
            other => panic!("expected Write, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reverted_write_fails_on_confirm() {
        let mock = MockProvider {
            revert_writes: true,
            ..Default::default()
        };
        let session = binding().session(Arc::new(mock), &[addr(9)]).unwrap();
        let pending = session.withdraw_all(addr(7)).await.unwrap();
        let err = pending.confirm().await.unwrap_err();
        assert!(matches!(err, DashboardError::Write(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn unconfirmed_write_times_out() {
        let mock = MockProvider {
            never_confirm: true,
            ..Default::default()
        };
        let session = ContractBinding::new(addr(0xcc))
            .with_confirmation_timeout(Duration::from_secs(5))
            .session(Arc::new(mock), &[addr(9)])
            .unwrap();
        let pending = session.remove_admin(addr(3)).await.unwrap();
        let err = pending.confirm().await.unwrap_err();
        match err {
            DashboardError::Write(msg) => assert!(msg.contains("not confirmed")),
            other => panic!("expected Write, got {other:?}"),
        }
    }
}
