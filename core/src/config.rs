/// Dashboard configuration. The core never reads the environment; front ends
/// build this from flags and env vars.
use std::path::PathBuf;
use std::time::Duration;

use alloy_primitives::Address;
use anyhow::{bail, Context, Result};

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_PRICE_URL: &str = "https://api.coingecko.com/api/v3/simple/price";
pub const DEFAULT_PRICE_COIN: &str = "binancecoin";
pub const DEFAULT_SYMBOL: &str = "BNB";

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub rpc_url: String,
    pub contract_address: Address,
    pub price_url: String,
    pub price_coin_id: String,
    pub symbol: String,
    pub refresh_interval: Duration,
    pub confirmation_timeout: Duration,
    /// Upper bound on a single JSON-RPC round trip.
    pub request_timeout: Duration,
    /// Where the snapshot store lives. `None` keeps history in memory only.
    pub data_dir: Option<PathBuf>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            contract_address: Address::ZERO,
            price_url: DEFAULT_PRICE_URL.to_string(),
            price_coin_id: DEFAULT_PRICE_COIN.to_string(),
            symbol: DEFAULT_SYMBOL.to_string(),
            refresh_interval: Duration::from_secs(5 * 60),
            confirmation_timeout: Duration::from_secs(120),
            request_timeout: Duration::from_secs(30),
            data_dir: None,
        }
    }
}

impl DashboardConfig {
    /// Path of the snapshot database, if persistence is enabled.
    pub fn store_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join("state.db"))
    }

    pub fn validate(&self, allow_insecure: bool) -> Result<()> {
        validate_url(&self.rpc_url, allow_insecure).context("Invalid RPC URL")?;
        validate_url(&self.price_url, allow_insecure).context("Invalid price URL")?;
        if self.refresh_interval < Duration::from_secs(10) {
            bail!("Refresh interval must be at least 10 seconds.");
        }
        if self.request_timeout.is_zero() {
            bail!("Request timeout must be greater than zero.");
        }
        Ok(())
    }
}

fn is_loopback(url: &str) -> bool {
    let rest = url.trim_start_matches("http://");
    if rest.starts_with("[::1]") {
        return true;
    }
    let host = rest.split(['/', ':']).next().unwrap_or("");
    matches!(host, "localhost" | "127.0.0.1")
}

/// Reject non-HTTPS URLs unless `allow_insecure` is set. Loopback HTTP is
/// always allowed since dev nodes rarely terminate TLS.
pub fn validate_url(url: &str, allow_insecure: bool) -> Result<()> {
    if url.starts_with("https://") {
        return Ok(());
    }
    if url.starts_with("http://") {
        if allow_insecure || is_loopback(url) {
            return Ok(());
        }
        bail!("Refusing to connect over plain HTTP: {url}\nUse --insecure to allow unencrypted connections.");
    }
    bail!("Invalid URL scheme: {url}\nExpected an https:// URL.");
}

/// Parse a hex address, accepting any letter case.
pub fn parse_address(input: &str) -> crate::error::Result<Address> {
    let trimmed = input.trim();
    trimmed.parse::<Address>().map_err(|_| {
        crate::error::DashboardError::InvalidAddress(format!(
            "Invalid address '{trimmed}'. Expected a 0x-prefixed 20-byte hex address."
        ))
    })
}
