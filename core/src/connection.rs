/// Wallet connection handshake and the resulting connection state.
use alloy_primitives::Address;
use log::error;

use crate::error::{DashboardError, Result};
use crate::provider::{self, ProviderError, WalletProvider};

/// Which account (if any) the wallet has authorised. Holding the address in an
/// `Option` keeps "has an address" and "is connected" from ever disagreeing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionState {
    address: Option<Address>,
}

impl ConnectionState {
    pub fn connected(address: Address) -> Self {
        Self {
            address: Some(address),
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn is_connected(&self) -> bool {
        self.address.is_some()
    }
}

const NO_PROVIDER: &str = "Please connect a wallet: no wallet provider found.";

fn require(provider: Option<&dyn WalletProvider>) -> Result<&dyn WalletProvider> {
    provider.ok_or_else(|| DashboardError::Connection(NO_PROVIDER.into()))
}

/// Prompt the wallet for accounts. Fails if there is no provider, the user
/// declines, or the wallet hands back nothing to sign with.
pub async fn request_connection(provider: Option<&dyn WalletProvider>) -> Result<Vec<Address>> {
    let provider = require(provider)?;
    let accounts = provider::request_accounts(provider).await.map_err(|e| match e {
        ProviderError::UserRejected => {
            DashboardError::Connection("Connection request rejected in wallet.".into())
        }
        other => {
            error!("eth_requestAccounts failed: {other}");
            DashboardError::Connection("Error connecting wallet.".into())
        }
    })?;
    if accounts.is_empty() {
        return Err(DashboardError::Connection(
            "Wallet returned no accounts.".into(),
        ));
    }
    Ok(accounts)
}

/// Accounts already authorised, without prompting. Empty when the user has
/// not connected before.
pub async fn existing_connection(provider: Option<&dyn WalletProvider>) -> Result<Vec<Address>> {
    let provider = require(provider)?;
    provider::accounts(provider).await.map_err(|e| {
        error!("eth_accounts failed: {e}");
        DashboardError::Connection("Error checking wallet connection.".into())
    })
}
