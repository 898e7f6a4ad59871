//! REPL shell: Reedline-based interactive dashboard session with a
//! background refresh timer.
use crate::Cli;
use anyhow::Result;
use log::{debug, warn};
use reedline::{DefaultCompleter, DefaultPrompt, DefaultPromptSegment, Reedline, Signal};
use stashboard_core::commands::Command;
use stashboard_core::display;
use stashboard_core::service::{Banner, DashboardService, RefreshOutcome};
use stashboard_core::view::ViewFilter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

fn make_prompt(address: Option<stashboard_core::Address>) -> DefaultPrompt {
    let label = match address {
        Some(a) => format!("[stashboard {}]", display::short_address(&a)),
        None => "[stashboard]".to_string(),
    };
    DefaultPrompt::new(DefaultPromptSegment::Basic(label), DefaultPromptSegment::Empty)
}

/// The banner to print, if it is not the one last shown.
fn unseen_banner(current: Option<Banner>, shown: &mut Option<Banner>) -> Option<Banner> {
    if current == *shown {
        return None;
    }
    shown.clone_from(&current);
    current
}

/// Refresh on a fixed interval while connected, first following any account
/// switch in the wallet. Overlapping or mid-write ticks are skipped by the
/// service itself.
fn spawn_refresher(service: Arc<DashboardService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; startup already refreshed.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if !service.connection().await.is_connected() {
                continue;
            }
            match service.sync_accounts().await {
                Ok(true) => debug!("wallet accounts changed"),
                Ok(false) => {}
                Err(e) => warn!("account check failed: {e}"),
            }
            if !service.connection().await.is_connected() {
                continue;
            }
            match service.refresh().await {
                Ok(RefreshOutcome::Updated { appended }) => {
                    debug!("background refresh done (history appended: {appended})")
                }
                Ok(outcome) => debug!("background refresh: {outcome:?}"),
                Err(e) => warn!("background refresh failed: {e}"),
            }
        }
    })
}

pub async fn run_repl(cli: &Cli) -> Result<()> {
    println!("Stashboard v{}", env!("CARGO_PKG_VERSION"));

    let service = Arc::new(cli.service()?);
    println!("Node:     {}", service.config().rpc_url);
    println!("Contract: {:#x}", service.contract_address());
    println!();

    match service.restore_connection().await {
        Ok(Some(address)) => {
            println!("Connected as {address:#x}");
            if let Err(e) = service.refresh().await {
                eprintln!("Error: {e}");
            }
        }
        Ok(None) => println!("No wallet connected. Type 'connect' to connect."),
        Err(e) => eprintln!("Error: {e}"),
    }
    println!("Type 'help' for a list of commands.");
    println!();

    let refresher = spawn_refresher(Arc::clone(&service), service.config().refresh_interval);

    let mut prompt_address = service.connection().await.address();
    let mut prompt = make_prompt(prompt_address);
    let mut view = ViewFilter::default();
    let mut shown_banner = None;

    let commands: Vec<String> = vec![
        "connect".into(),
        "disconnect".into(),
        "status".into(),
        "refresh".into(),
        "balance".into(),
        "bal".into(),
        "price".into(),
        "addresses".into(),
        "addrs".into(),
        "ls".into(),
        "search".into(),
        "find".into(),
        "onchain_nonzero".into(),
        "nonzero".into(),
        "history".into(),
        "chart".into(),
        "history_reset".into(),
        "admin".into(),
        "withdraw".into(),
        "help".into(),
        "exit".into(),
        "quit".into(),
        "q".into(),
    ];
    let completer = Box::new(DefaultCompleter::new(commands));
    let mut line_editor = Reedline::create().with_completer(completer);

    loop {
        let address = service.connection().await.address();
        if address != prompt_address {
            if let Some(a) = address {
                println!("Wallet account changed to {a:#x}");
            } else if prompt_address.is_some() {
                println!("Wallet disconnected.");
            }
            prompt_address = address;
            prompt = make_prompt(address);
        }
        if let Some(b) = unseen_banner(service.banner().await, &mut shown_banner) {
            eprintln!("[{:?}] {}", b.level, b.message);
        }
        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match Command::parse(line) {
                    Ok(Command::Exit) => {
                        println!("Goodbye.");
                        break;
                    }
                    Ok(cmd) => {
                        if let Some(prompt_msg) = cmd.confirmation_prompt() {
                            if !prompt_confirm(&prompt_msg) {
                                println!("Cancelled.");
                                continue;
                            }
                        }
                        if cmd.is_write() {
                            println!("Waiting for the transaction to be confirmed...");
                        }
                        match cmd.execute(&service, &mut view, false).await {
                            Ok(output) => {
                                if !output.is_empty() {
                                    println!("{output}");
                                }
                            }
                            Err(e) => {
                                eprintln!("Error: {e}");
                                // The banner for this failure was just shown.
                                shown_banner = service.banner().await;
                            }
                        }
                        if matches!(cmd, Command::Connect | Command::Disconnect) {
                            prompt_address = service.connection().await.address();
                            prompt = make_prompt(prompt_address);
                        }
                    }
                    Err(e) => {
                        eprintln!("{e}");
                    }
                }
            }
            Ok(Signal::CtrlD) | Ok(Signal::CtrlC) => {
                println!("Goodbye.");
                break;
            }
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        }
    }

    service.invalidate();
    refresher.abort();
    Ok(())
}

fn prompt_confirm(prompt: &str) -> bool {
    use std::io::Write;
    print!("{prompt} [y/N]: ");
    std::io::stdout().flush().ok();
    let mut input = String::new();
    std::io::stdin().read_line(&mut input).is_ok() && input.trim().eq_ignore_ascii_case("y")
}

#[cfg(test)]
mod tests {
    use super::*;
    use stashboard_core::service::BannerLevel;

    fn error(message: &str) -> Banner {
        Banner {
            level: BannerLevel::Error,
            message: message.to_string(),
        }
    }

    #[test]
    fn banner_is_printed_once() {
        let mut shown = None;
        let failed = error("Failed to fetch contract data.");
        assert_eq!(unseen_banner(Some(failed.clone()), &mut shown), Some(failed.clone()));
        assert_eq!(unseen_banner(Some(failed.clone()), &mut shown), None);
        assert_eq!(unseen_banner(None, &mut shown), None);
        assert_eq!(unseen_banner(Some(failed.clone()), &mut shown), Some(failed));
    }

    #[test]
    fn banner_of_a_reported_command_error_is_not_repeated() {
        // The command loop records the banner after printing "Error: ...".
        let mut shown = Some(error("Transaction failed."));
        assert_eq!(unseen_banner(Some(error("Transaction failed.")), &mut shown), None);
    }
}
