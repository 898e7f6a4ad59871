mod repl;

use anyhow::{Context, Result};
use clap::Parser;
use stashboard_core::commands::Command;
use stashboard_core::config::{self, DashboardConfig};
use stashboard_core::provider::{HttpProvider, WalletProvider};
use stashboard_core::service::DashboardService;
use stashboard_core::view::ViewFilter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "stashboard", about = "Stashboard: storage contract dashboard REPL", version)]
pub(crate) struct Cli {
    /// JSON-RPC endpoint of a node with an unlocked signing account
    #[arg(long, env = "STASHBOARD_RPC_URL", default_value = config::DEFAULT_RPC_URL)]
    rpc_url: String,

    /// Address of the storage management contract
    #[arg(long, env = "STASHBOARD_CONTRACT")]
    contract: Option<String>,

    /// CoinGecko-compatible simple/price endpoint
    #[arg(long, default_value = config::DEFAULT_PRICE_URL)]
    price_url: String,

    /// Coin id to price (CoinGecko naming)
    #[arg(long, default_value = config::DEFAULT_PRICE_COIN)]
    coin: String,

    /// Native currency symbol used in output
    #[arg(long, default_value = config::DEFAULT_SYMBOL)]
    symbol: String,

    /// Seconds between background refreshes in the REPL
    #[arg(long, default_value_t = 300)]
    refresh_secs: u64,

    /// Seconds to wait for a transaction to be mined
    #[arg(long, default_value_t = 120)]
    confirm_secs: u64,

    /// Seconds before a single RPC request is abandoned
    #[arg(long, default_value_t = 30)]
    rpc_timeout_secs: u64,

    /// Directory for the history database (default: platform data dir)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Keep balance history in memory only
    #[arg(long)]
    no_persist: bool,

    /// Run a single command and exit
    #[arg(long)]
    cmd: Option<String>,

    /// Output in JSON format (useful with --cmd)
    #[arg(long)]
    json: bool,

    /// Allow non-HTTPS RPC and price URLs
    #[arg(long)]
    insecure: bool,
}

impl Cli {
    fn dashboard_config(&self) -> Result<DashboardConfig> {
        let contract_address = match &self.contract {
            Some(s) => config::parse_address(s).context("Invalid --contract")?,
            None => stashboard_core::Address::ZERO,
        };
        let data_dir = if self.no_persist {
            None
        } else {
            match &self.data_dir {
                Some(dir) => Some(dir.clone()),
                None => Some(stashboard_core::data_dir()?),
            }
        };
        let config = DashboardConfig {
            rpc_url: self.rpc_url.clone(),
            contract_address,
            price_url: self.price_url.clone(),
            price_coin_id: self.coin.clone(),
            symbol: self.symbol.clone(),
            refresh_interval: Duration::from_secs(self.refresh_secs),
            confirmation_timeout: Duration::from_secs(self.confirm_secs),
            request_timeout: Duration::from_secs(self.rpc_timeout_secs),
            data_dir,
        };
        config.validate(self.insecure)?;
        Ok(config)
    }

    fn service(&self) -> Result<DashboardService> {
        let config = self.dashboard_config()?;
        let provider: Arc<dyn WalletProvider> =
            Arc::new(HttpProvider::new(&config.rpc_url, config.request_timeout)?);
        Ok(DashboardService::new(config, Some(provider)))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if let Some(cmd_str) = &cli.cmd {
        // One-shot mode
        run_oneshot(&cli, cmd_str).await
    } else {
        // REPL mode
        repl::run_repl(&cli).await
    }
}

async fn run_oneshot(cli: &Cli, cmd_str: &str) -> Result<()> {
    let command = Command::parse(cmd_str)?;
    if command == Command::Exit {
        return Ok(());
    }

    let service = cli.service()?;
    if command.needs_session() {
        // Prefer an already-authorised account; prompt only if there is none.
        if service.restore_connection().await?.is_none() {
            service.connect().await?;
        }
    }

    let mut view = ViewFilter::default();
    let output = command.execute(&service, &mut view, cli.json).await?;
    if !output.is_empty() {
        println!("{output}");
    }

    Ok(())
}
