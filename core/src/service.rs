use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::Address;
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::config::DashboardConfig;
use crate::connection::{self, ConnectionState};
use crate::contract::{ContractBinding, ContractSession};
use crate::error::{DashboardError, Result};
use crate::fetcher::{self, Aggregate, ManagedAddress};
use crate::history::{self, BalanceSnapshot, HistoryCache, TimeWindow};
use crate::price::PriceClient;
use crate::provider::{TxReceipt, WalletProvider};
use crate::store::SnapshotStore;
use crate::view::{self, ViewFilter};

const ALL_BALANCES_FAILED: &str =
    "Balances could not be loaded. Totals may be understated until the next refresh.";
const NOT_CONNECTED: &str = "Please connect a wallet.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleState {
    Idle,
    Fetching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerLevel {
    Warning,
    Error,
}

/// User-facing notice shown above the dashboard until the next good cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Banner {
    pub level: BannerLevel,
    pub message: String,
}

impl Banner {
    fn warning(message: &str) -> Self {
        Self {
            level: BannerLevel::Warning,
            message: message.to_string(),
        }
    }

    fn error(err: &DashboardError) -> Self {
        Self {
            level: BannerLevel::Error,
            message: err.to_string(),
        }
    }
}

/// What a refresh cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New data was applied; `appended` says whether history grew.
    Updated { appended: bool },
    /// Another cycle or a write was already running.
    Skipped,
    /// The connection changed while fetching; results were dropped.
    Stale,
}

/// Which balances a withdrawal drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawTarget {
    One(Address),
    All,
}

/// Point-in-time summary for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStatus {
    pub address: Option<String>,
    pub contract: String,
    pub cycle: CycleState,
    pub banner: Option<Banner>,
    pub contracts: Option<usize>,
    pub last_updated_ms: Option<i64>,
    pub history_points: usize,
    pub usd_price: Option<f64>,
}

struct DashboardState {
    connection: ConnectionState,
    session: Option<ContractSession>,
    aggregate: Option<Aggregate>,
    history: HistoryCache,
    cycle: CycleState,
    banner: Option<Banner>,
    usd_price: Option<f64>,
    last_updated_ms: Option<i64>,
}

/// Owns the connection, the last-known aggregate and the balance history,
/// and runs the fetch cycle and contract writes against them.
///
/// Refreshes never overlap: a second call while one is running returns
/// [`RefreshOutcome::Skipped`]. Writes take the operation lock for their whole
/// duration, so a refresh that starts mid-write is skipped too. Every
/// connection change bumps a generation counter; a fetch that finishes under
/// an older generation is discarded.
pub struct DashboardService {
    config: DashboardConfig,
    provider: Option<Arc<dyn WalletProvider>>,
    binding: ContractBinding,
    price: Option<PriceClient>,
    store_path: Option<PathBuf>,
    state: tokio::sync::Mutex<DashboardState>,
    generation: AtomicU64,
    in_flight: AtomicBool,
    op_lock: tokio::sync::Mutex<()>,
}

/// Clears the in-flight flag when a refresh returns, on every path.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn load_history(store_path: Option<&PathBuf>, now: i64) -> HistoryCache {
    let Some(path) = store_path else {
        return HistoryCache::seed(now);
    };
    match SnapshotStore::open_at(path).and_then(|store| HistoryCache::load(&store, now)) {
        Ok(history) => history,
        Err(e) => {
            warn!("balance history unavailable, using in-memory seed: {e:#}");
            HistoryCache::seed(now)
        }
    }
}

impl DashboardService {
    /// `provider` is `None` when no wallet is available; the dashboard then
    /// stays in the "please connect" state.
    pub fn new(config: DashboardConfig, provider: Option<Arc<dyn WalletProvider>>) -> Self {
        let binding = ContractBinding::new(config.contract_address)
            .with_confirmation_timeout(config.confirmation_timeout);
        let price = match PriceClient::new(&config.price_url, &config.price_coin_id) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("price lookups disabled: {e:#}");
                None
            }
        };
        let store_path = config.store_path();
        let history = load_history(store_path.as_ref(), history::now_ms());
        Self {
            config,
            provider,
            binding,
            price,
            store_path,
            state: tokio::sync::Mutex::new(DashboardState {
                connection: ConnectionState::disconnected(),
                session: None,
                aggregate: None,
                history,
                cycle: CycleState::Idle,
                banner: None,
                usd_price: None,
                last_updated_ms: None,
            }),
            generation: AtomicU64::new(0),
            in_flight: AtomicBool::new(false),
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn contract_address(&self) -> Address {
        self.binding.address()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn provider(&self) -> Option<&dyn WalletProvider> {
        self.provider.as_deref()
    }

    // -- Connection --

    /// Prompt the wallet and bind the contract to the first account.
    pub async fn connect(&self) -> Result<Address> {
        let accounts = connection::request_connection(self.provider()).await?;
        self.bind(&accounts).await
    }

    /// Pick up a connection the user already authorised, without prompting.
    /// Returns `None` when there is none.
    pub async fn restore_connection(&self) -> Result<Option<Address>> {
        let accounts = connection::existing_connection(self.provider()).await?;
        if accounts.is_empty() {
            return Ok(None);
        }
        self.bind(&accounts).await.map(Some)
    }

    /// React to the wallet switching or revoking accounts.
    pub async fn accounts_changed(&self, accounts: &[Address]) -> Result<Option<Address>> {
        if accounts.is_empty() {
            self.disconnect().await;
            return Ok(None);
        }
        self.bind(accounts).await.map(Some)
    }

    /// Compare the wallet's current accounts with the bound signer and rebind
    /// or disconnect when they differ. Does nothing while disconnected.
    /// Returns whether the connection changed.
    pub async fn sync_accounts(&self) -> Result<bool> {
        let Some(current) = self.connection().await.address() else {
            return Ok(false);
        };
        let accounts = connection::existing_connection(self.provider()).await?;
        if accounts.first() == Some(&current) {
            return Ok(false);
        }
        info!("wallet accounts changed");
        self.accounts_changed(&accounts).await?;
        Ok(true)
    }

    async fn bind(&self, accounts: &[Address]) -> Result<Address> {
        let provider = self
            .provider
            .clone()
            .ok_or_else(|| DashboardError::Connection(NOT_CONNECTED.into()))?;
        let mut state = self.state.lock().await;
        self.bump_generation();
        state.aggregate = None;
        state.last_updated_ms = None;
        match self.binding.session(provider, accounts) {
            Ok(session) => {
                let signer = session.signer();
                info!("connected as {signer:#x}");
                state.connection = ConnectionState::connected(signer);
                state.session = Some(session);
                state.banner = None;
                Ok(signer)
            }
            Err(e) => {
                error!("contract session setup failed: {e}");
                state.connection = ConnectionState::disconnected();
                state.session = None;
                state.banner = Some(Banner::error(&e));
                Err(e)
            }
        }
    }

    /// Forget the connection and all data fetched under it. A fetch still in
    /// flight is discarded when it lands.
    pub async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        self.bump_generation();
        state.connection = ConnectionState::disconnected();
        state.session = None;
        state.aggregate = None;
        state.banner = None;
        state.last_updated_ms = None;
        info!("disconnected");
    }

    /// Drop the results of any in-flight cycle without touching the
    /// connection. Called when the front end shuts down.
    pub fn invalidate(&self) {
        self.bump_generation();
    }

    pub async fn connection(&self) -> ConnectionState {
        self.state.lock().await.connection
    }

    async fn session(&self) -> Result<ContractSession> {
        self.state
            .lock()
            .await
            .session
            .clone()
            .ok_or_else(|| DashboardError::Connection(NOT_CONNECTED.into()))
    }

    // -- Fetch cycle --

    /// Fetch the address list and every balance, then update the last-known
    /// aggregate and history.
    ///
    /// On failure the previous aggregate is kept, a banner is set, and the
    /// error is returned.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("refresh skipped: cycle already running");
            return Ok(RefreshOutcome::Skipped);
        }
        let _in_flight = InFlight(&self.in_flight);
        let Ok(_op) = self.op_lock.try_lock() else {
            debug!("refresh skipped: write in progress");
            return Ok(RefreshOutcome::Skipped);
        };

        let (session, generation) = {
            let mut state = self.state.lock().await;
            let session = state
                .session
                .clone()
                .ok_or_else(|| DashboardError::Connection(NOT_CONNECTED.into()))?;
            state.cycle = CycleState::Fetching;
            (session, self.bump_generation())
        };

        let fetched = fetcher::fetch_aggregate(&session).await;

        let mut state = self.state.lock().await;
        state.cycle = CycleState::Idle;
        if self.generation() != generation {
            debug!("discarding results of stale cycle {generation}");
            return Ok(RefreshOutcome::Stale);
        }
        match fetched {
            Ok(aggregate) => {
                let now = history::now_ms();
                state.banner = aggregate
                    .all_failed()
                    .then(|| Banner::warning(ALL_BALANCES_FAILED));
                // A zero substituted for failed lookups is not an observation.
                let appended = !aggregate.all_failed()
                    && state.history.record(aggregate.total_display(), now);
                if appended {
                    self.persist(&state.history);
                }
                debug!(
                    "cycle {generation}: {} contracts, total {}",
                    aggregate.entries.len(),
                    aggregate.total_display()
                );
                state.aggregate = Some(aggregate);
                state.last_updated_ms = Some(now);
                Ok(RefreshOutcome::Updated { appended })
            }
            Err(e) => {
                state.banner = Some(Banner::error(&e));
                Err(e)
            }
        }
    }

    fn persist(&self, history: &HistoryCache) {
        let Some(path) = &self.store_path else {
            return;
        };
        if let Err(e) = SnapshotStore::open_at(path).and_then(|store| history.persist(&store)) {
            warn!("failed to persist balance history: {e:#}");
        }
    }

    /// Refresh the USD price. The last good price is kept on failure.
    pub async fn refresh_price(&self) -> Result<f64> {
        let client = self
            .price
            .as_ref()
            .ok_or_else(|| DashboardError::PriceFetch("Failed to load price.".into()))?;
        let price = client.fetch_usd().await?;
        self.state.lock().await.usd_price = Some(price);
        Ok(price)
    }

    pub async fn usd_price(&self) -> Option<f64> {
        self.state.lock().await.usd_price
    }

    // -- Reads over last-known data --

    pub async fn aggregate(&self) -> Option<Aggregate> {
        self.state.lock().await.aggregate.clone()
    }

    /// Last-known entries after filter, search and sort.
    pub async fn addresses(&self, filter: &ViewFilter) -> Vec<ManagedAddress> {
        let state = self.state.lock().await;
        state
            .aggregate
            .as_ref()
            .map(|agg| view::apply(&agg.entries, filter))
            .unwrap_or_default()
    }

    pub async fn history_window(&self, window: TimeWindow) -> Vec<BalanceSnapshot> {
        self.state
            .lock()
            .await
            .history
            .window(window, history::now_ms())
    }

    /// Wipe persisted history and start over from a fresh seed.
    pub async fn reset_history(&self) -> Result<usize> {
        let now = history::now_ms();
        let mut state = self.state.lock().await;
        if let Some(path) = &self.store_path {
            let store = SnapshotStore::open_at(path)
                .map_err(|e| DashboardError::Storage(format!("{e:#}")))?;
            store
                .clear_snapshots()
                .map_err(|e| DashboardError::Storage(format!("{e:#}")))?;
            state.history = HistoryCache::load(&store, now)
                .map_err(|e| DashboardError::Storage(format!("{e:#}")))?;
        } else {
            state.history = HistoryCache::seed(now);
        }
        Ok(state.history.len())
    }

    pub async fn banner(&self) -> Option<Banner> {
        self.state.lock().await.banner.clone()
    }

    pub async fn status(&self) -> DashboardStatus {
        let state = self.state.lock().await;
        DashboardStatus {
            address: state.connection.address().map(|a| format!("{a:#x}")),
            contract: format!("{:#x}", self.binding.address()),
            cycle: state.cycle,
            banner: state.banner.clone(),
            contracts: state.aggregate.as_ref().map(|a| a.entries.len()),
            last_updated_ms: state.last_updated_ms,
            history_points: state.history.len(),
            usd_price: state.usd_price,
        }
    }

    // -- Live contract reads --

    /// Ask the contract which managed addresses currently hold a balance.
    pub async fn onchain_nonzero(&self) -> Result<Vec<ManagedAddress>> {
        let session = self.session().await?;
        fetcher::fetch_nonzero(&session).await
    }

    pub async fn is_admin(&self, account: Address) -> Result<bool> {
        let session = self.session().await?;
        session.is_admin(account).await.map_err(|e| {
            error!("admin check failed: {e:#}");
            DashboardError::Read("Failed to check admin status.".into())
        })
    }

    // -- Writes --

    pub async fn add_admin(&self, account: Address) -> Result<TxReceipt> {
        let _op = self.op_lock.lock().await;
        let session = self.session().await?;
        let pending = self.record(session.add_admin(account).await).await?;
        info!("add admin {account:#x}: tx {:#x}", pending.hash());
        self.record(pending.confirm().await).await
    }

    pub async fn remove_admin(&self, account: Address) -> Result<TxReceipt> {
        let _op = self.op_lock.lock().await;
        let session = self.session().await?;
        let pending = self.record(session.remove_admin(account).await).await?;
        info!("remove admin {account:#x}: tx {:#x}", pending.hash());
        self.record(pending.confirm().await).await
    }

    /// Withdraw to `recipient` and wait for confirmation, then refresh so the
    /// drained balances show up.
    pub async fn withdraw(&self, target: WithdrawTarget, recipient: Address) -> Result<TxReceipt> {
        if recipient == Address::ZERO {
            return Err(DashboardError::InvalidAddress(
                "Refusing to withdraw to the zero address.".into(),
            ));
        }
        let receipt = {
            let _op = self.op_lock.lock().await;
            let session = self.session().await?;
            let pending = match target {
                WithdrawTarget::One(address) => session.withdraw_one(address, recipient).await,
                WithdrawTarget::All => session.withdraw_all(recipient).await,
            };
            let pending = self.record(pending).await?;
            info!("withdraw {target:?} to {recipient:#x}: tx {:#x}", pending.hash());
            self.record(pending.confirm().await).await?
        };
        if let Err(e) = self.refresh().await {
            warn!("refresh after withdrawal failed: {e}");
        }
        Ok(receipt)
    }

    /// Surface a write failure on the banner before handing it back.
    async fn record<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.state.lock().await.banner = Some(Banner::error(e));
        }
        result
    }
}
