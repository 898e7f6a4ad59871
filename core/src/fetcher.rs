/// Aggregate fetcher: list managed addresses, then fan out one balance query
/// per address and join them all.
use alloy_primitives::{Address, U256};
use futures::future::join_all;
use log::{debug, error, warn};
use serde::Serialize;

use crate::contract::ContractSession;
use crate::display;
use crate::error::{DashboardError, Result};

/// One managed storage contract and its native balance at fetch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagedAddress {
    pub address: Address,
    pub balance_wei: U256,
    /// The balance query failed and `balance_wei` is a substituted zero.
    pub balance_failed: bool,
}

impl ManagedAddress {
    pub fn new(address: Address, balance_wei: U256) -> Self {
        Self {
            address,
            balance_wei,
            balance_failed: false,
        }
    }

    /// Balance in whole native units.
    pub fn balance_display(&self) -> f64 {
        display::wei_to_f64(self.balance_wei)
    }
}

/// Result of one fetch cycle, in contract order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aggregate {
    pub entries: Vec<ManagedAddress>,
    pub total_wei: U256,
}

impl Aggregate {
    /// Build from entries, summing the total.
    pub fn from_entries(entries: Vec<ManagedAddress>) -> Self {
        let total_wei = entries
            .iter()
            .fold(U256::ZERO, |acc, e| acc.saturating_add(e.balance_wei));
        Self { entries, total_wei }
    }

    /// Total in whole native units.
    pub fn total_display(&self) -> f64 {
        display::wei_to_f64(self.total_wei)
    }

    pub fn failed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.balance_failed).count()
    }

    /// Every balance query failed, so the total is meaningless.
    pub fn all_failed(&self) -> bool {
        !self.entries.is_empty() && self.failed_count() == self.entries.len()
    }
}

/// Fetch every managed address with its balance.
///
/// A failing balance query is recorded as zero and does not abort the batch.
/// A failing address list fails the whole fetch; the raw cause is logged and
/// the caller gets a generic message.
pub async fn fetch_aggregate(session: &ContractSession) -> Result<Aggregate> {
    let addresses = session.managed_addresses().await.map_err(|e| {
        error!("address list read failed: {e:#}");
        DashboardError::Read("Failed to fetch contract data.".into())
    })?;
    debug!("fetching balances for {} managed addresses", addresses.len());

    let entries = fetch_balances(session, &addresses).await;
    let aggregate = Aggregate::from_entries(entries);
    if aggregate.failed_count() > 0 {
        warn!(
            "{} of {} balance queries failed; substituted zero",
            aggregate.failed_count(),
            aggregate.entries.len()
        );
    }
    Ok(aggregate)
}

/// Query balances for `addresses` concurrently, preserving input order.
pub async fn fetch_balances(session: &ContractSession, addresses: &[Address]) -> Vec<ManagedAddress> {
    let lookups = addresses.iter().map(|&address| async move {
        match session.balance_of(address).await {
            Ok(balance_wei) => ManagedAddress::new(address, balance_wei),
            Err(e) => {
                warn!("balance query for {address} failed: {e}");
                ManagedAddress {
                    address,
                    balance_wei: U256::ZERO,
                    balance_failed: true,
                }
            }
        }
    });
    join_all(lookups).await
}

/// The contract's own view of which managed addresses hold a balance,
/// with their current balances.
pub async fn fetch_nonzero(session: &ContractSession) -> Result<Vec<ManagedAddress>> {
    let addresses = session.nonzero_addresses().await.map_err(|e| {
        error!("non-zero address list read failed: {e:#}");
        DashboardError::Read("Failed to fetch contract data.".into())
    })?;
    Ok(fetch_balances(session, &addresses).await)
}
