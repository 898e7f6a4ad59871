/// Integration tests that hit a live local node (anvil, hardhat, geth --dev).
/// Run with: cargo test -- --ignored
///
/// STASHBOARD_RPC_URL overrides the node URL; STASHBOARD_CONTRACT names a
/// deployed management contract for the contract-level tests.
use stashboard_core::commands::Command;
use stashboard_core::config::{self, DashboardConfig};
use stashboard_core::price::PriceClient;
use stashboard_core::provider::{self, HttpProvider, WalletProvider};
use stashboard_core::service::{DashboardService, RefreshOutcome};
use stashboard_core::view::ViewFilter;
use stashboard_core::{Address, DashboardError, TimeWindow};
use std::sync::Arc;
use std::time::Duration;

fn rpc_url() -> String {
    std::env::var("STASHBOARD_RPC_URL").unwrap_or_else(|_| config::DEFAULT_RPC_URL.to_string())
}

fn contract() -> Option<Address> {
    let raw = std::env::var("STASHBOARD_CONTRACT").ok()?;
    Some(config::parse_address(&raw).expect("STASHBOARD_CONTRACT is not a valid address"))
}

fn live_service(contract: Address, data_dir: Option<std::path::PathBuf>) -> DashboardService {
    let config = DashboardConfig {
        rpc_url: rpc_url(),
        contract_address: contract,
        data_dir,
        ..Default::default()
    };
    let provider: Arc<dyn WalletProvider> = Arc::new(
        HttpProvider::new(&config.rpc_url, config.request_timeout).expect("failed to build provider"),
    );
    DashboardService::new(config, Some(provider))
}

#[tokio::test]
#[ignore]
async fn local_node_lists_unlocked_accounts() {
    let node = HttpProvider::new(&rpc_url(), Duration::from_secs(10)).unwrap();
    let accounts = provider::accounts(&node)
        .await
        .expect("failed to query accounts");
    assert!(!accounts.is_empty(), "dev node should expose unlocked accounts");

    let balance = provider::balance(&node, accounts[0])
        .await
        .expect("failed to query balance");
    assert!(!balance.is_zero(), "dev accounts are pre-funded");
}

#[tokio::test]
#[ignore]
async fn local_node_balance_of_fresh_address_is_zero() {
    let node = HttpProvider::new(&rpc_url(), Duration::from_secs(10)).unwrap();
    let balance = provider::balance(&node, Address::repeat_byte(0x5a))
        .await
        .expect("failed to query balance");
    assert!(balance.is_zero());
}

#[tokio::test]
#[ignore]
async fn live_dashboard_refresh_and_history() {
    let Some(contract) = contract() else {
        eprintln!("STASHBOARD_CONTRACT not set; skipping");
        return;
    };
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let service = live_service(contract, Some(dir.path().to_path_buf()));

    let signer = service
        .restore_connection()
        .await
        .expect("failed to check connection")
        .expect("dev node should have an authorised account");
    assert_eq!(service.connection().await.address(), Some(signer));

    let outcome = service.refresh().await.expect("refresh failed");
    assert!(matches!(outcome, RefreshOutcome::Updated { .. }));
    let aggregate = service.aggregate().await.expect("aggregate missing");
    let summed = aggregate
        .entries
        .iter()
        .fold(stashboard_core::U256::ZERO, |acc, e| acc + e.balance_wei);
    assert_eq!(summed, aggregate.total_wei);

    let points = service.history_window(TimeWindow::Day).await;
    assert!(points.len() >= 2);
    assert!(points.iter().any(|p| !p.synthetic));
}

#[tokio::test]
#[ignore]
async fn live_admin_check_for_signer() {
    let Some(contract) = contract() else {
        eprintln!("STASHBOARD_CONTRACT not set; skipping");
        return;
    };
    let service = live_service(contract, None);
    let signer = service.connect().await.expect("connect failed");
    // Whatever the answer, the read itself must succeed.
    service.is_admin(signer).await.expect("admin check failed");
}

#[tokio::test]
#[ignore]
async fn live_usd_price() {
    let client = PriceClient::new(config::DEFAULT_PRICE_URL, config::DEFAULT_PRICE_COIN)
        .expect("failed to build price client");
    let price = client.fetch_usd().await.expect("price lookup failed");
    assert!(price > 0.0);
}

#[tokio::test]
async fn unreachable_node_is_connection_error() {
    let config = DashboardConfig {
        rpc_url: "http://127.0.0.1:9".into(),
        contract_address: Address::repeat_byte(0xcc),
        ..Default::default()
    };
    let provider: Arc<dyn WalletProvider> = Arc::new(
        HttpProvider::new(&config.rpc_url, config.request_timeout).expect("failed to build provider"),
    );
    let offline = DashboardService::new(config, Some(provider));

    let err = offline.connect().await.unwrap_err();
    assert!(matches!(err, DashboardError::Connection(_)));
    assert!(!offline.connection().await.is_connected());
}

#[tokio::test]
async fn oneshot_commands_without_wallet() {
    let service = DashboardService::new(
        DashboardConfig {
            contract_address: Address::repeat_byte(0xcc),
            ..Default::default()
        },
        None,
    );
    let mut view = ViewFilter::default();

    let help = Command::parse("help")
        .unwrap()
        .execute(&service, &mut view, false)
        .await
        .unwrap();
    assert!(help.contains("Available commands"));

    let chart = Command::parse("history 1W")
        .unwrap()
        .execute(&service, &mut view, false)
        .await
        .unwrap();
    assert!(chart.starts_with("1W"));

    let err = Command::parse("refresh")
        .unwrap()
        .execute(&service, &mut view, false)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Please connect a wallet"));
}

/// Accepts connections and never answers them.
async fn silent_node() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind listener");
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    url
}

#[tokio::test]
async fn silent_node_times_out_instead_of_hanging() {
    let url = silent_node().await;
    let node = HttpProvider::new(&url, Duration::from_millis(200)).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), provider::accounts(&node))
        .await
        .expect("request outlived its timeout");
    assert!(matches!(result, Err(provider::ProviderError::Transport(_))));

    let config = DashboardConfig {
        rpc_url: url,
        contract_address: Address::repeat_byte(0xcc),
        request_timeout: Duration::from_millis(200),
        ..Default::default()
    };
    let provider: Arc<dyn WalletProvider> =
        Arc::new(HttpProvider::new(&config.rpc_url, config.request_timeout).unwrap());
    let service = DashboardService::new(config, Some(provider));
    let err = tokio::time::timeout(Duration::from_secs(5), service.connect())
        .await
        .expect("connect outlived the request timeout")
        .unwrap_err();
    assert!(matches!(err, DashboardError::Connection(_)));
}
