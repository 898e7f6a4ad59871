use std::path::PathBuf;

use anyhow::Context;

pub mod commands;
pub mod config;
pub mod connection;
pub mod contract;
pub mod display;
pub mod error;
pub mod fetcher;
pub mod history;
pub mod price;
pub mod provider;
pub mod service;
pub mod store;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

pub use commands::Command;
pub use config::DashboardConfig;
pub use connection::ConnectionState;
pub use contract::{ContractBinding, ContractSession};
pub use error::DashboardError;
pub use fetcher::{Aggregate, ManagedAddress};
pub use history::{BalanceSnapshot, HistoryCache, TimeWindow};
pub use provider::{HttpProvider, WalletProvider};
pub use service::{DashboardService, RefreshOutcome, WithdrawTarget};
pub use store::SnapshotStore;
pub use view::ViewFilter;

pub use alloy_primitives::{Address, U256};

/// XDG-compliant data directory for the snapshot store.
/// Linux: `~/.local/share/stashboard/`, macOS: `~/Library/Application Support/stashboard/`
pub fn data_dir() -> anyhow::Result<PathBuf> {
    let dir = dirs::data_dir()
        .context("Cannot determine data directory")?
        .join("stashboard");
    Ok(dir)
}
