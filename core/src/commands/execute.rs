use anyhow::{bail, Result};

use super::help::help_text;
use super::{AdminAction, Command};
use crate::display;
use crate::fetcher::Aggregate;
use crate::history;
use crate::provider::TxReceipt;
use crate::service::{DashboardService, RefreshOutcome, WithdrawTarget};
use crate::view::ViewFilter;

fn receipt_json(receipt: &TxReceipt) -> serde_json::Value {
    serde_json::json!({
        "hash": format!("{:#x}", receipt.hash),
        "success": receipt.success,
        "block_number": receipt.block_number,
    })
}

fn receipt_text(title: &str, receipt: &TxReceipt) -> String {
    let block = receipt
        .block_number
        .map(|b| b.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("{title}\n  Hash:  {:#x}\n  Block: {block}", receipt.hash)
}

impl Command {
    /// Execute a command and return the output string. `view` is the REPL's
    /// filter state; list commands update it in place.
    pub async fn execute(
        &self,
        service: &DashboardService,
        view: &mut ViewFilter,
        json_output: bool,
    ) -> Result<String> {
        let symbol = service.symbol();
        match self {
            Command::Connect => {
                let signer = service.connect().await?;
                view.reset();
                if json_output {
                    Ok(serde_json::json!({ "address": format!("{signer:#x}") }).to_string())
                } else {
                    Ok(format!("Connected as {signer:#x}"))
                }
            }

            Command::Disconnect => {
                service.disconnect().await;
                view.reset();
                if json_output {
                    Ok(serde_json::json!({ "connected": false }).to_string())
                } else {
                    Ok("Disconnected.".to_string())
                }
            }

            Command::Status => {
                let status = service.status().await;
                if json_output {
                    return Ok(serde_json::to_string(&status)?);
                }
                let mut out = format!(
                    "Account:   {}\n  Contract:  {}\n  Cycle:     {:?}\n  Contracts: {}\n  History:   {} points",
                    status.address.as_deref().unwrap_or("not connected"),
                    status.contract,
                    status.cycle,
                    status
                        .contracts
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    status.history_points,
                );
                if let Some(updated) = status.last_updated_ms {
                    let age_s = (history::now_ms() - updated).max(0) / 1000;
                    out.push_str(&format!("\n  Updated:   {age_s}s ago"));
                }
                if let Some(banner) = status.banner {
                    out.push_str(&format!("\n  [{:?}] {}", banner.level, banner.message));
                }
                Ok(out)
            }

            Command::Refresh => {
                let outcome = service.refresh().await?;
                let text = match outcome {
                    RefreshOutcome::Updated { appended: true } => "Refreshed. History updated.",
                    RefreshOutcome::Updated { appended: false } => "Refreshed.",
                    RefreshOutcome::Skipped => "A refresh is already running.",
                    RefreshOutcome::Stale => "Connection changed during refresh; results dropped.",
                };
                if json_output {
                    Ok(serde_json::json!({ "result": format!("{outcome:?}") }).to_string())
                } else {
                    Ok(text.to_string())
                }
            }

            Command::Balance { usd } => {
                let aggregate = last_known_or_fetch(service).await?;
                let price = if *usd { current_price(service).await } else { None };
                if json_output {
                    Ok(display::format_total_json(&aggregate, price))
                } else {
                    Ok(display::format_total(&aggregate, symbol, price, *usd))
                }
            }

            Command::Price => {
                let price = service.refresh_price().await?;
                if json_output {
                    Ok(serde_json::json!({ "symbol": symbol, "usd": price }).to_string())
                } else {
                    Ok(format!("1 {symbol} = {}", display::format_usd(price)))
                }
            }

            Command::Addresses { mode, sort } => {
                if let Some(mode) = mode {
                    view.mode = *mode;
                }
                if let Some(sort) = sort {
                    view.sort = *sort;
                }
                last_known_or_fetch(service).await?;
                list_view(service, view, json_output).await
            }

            Command::Search { query } => {
                view.search = query.clone();
                last_known_or_fetch(service).await?;
                list_view(service, view, json_output).await
            }

            Command::OnchainNonzero => {
                let entries = service.onchain_nonzero().await?;
                if json_output {
                    Ok(display::format_addresses_json(&entries))
                } else {
                    Ok(display::format_addresses(&entries, symbol))
                }
            }

            Command::History { window } => {
                let points = service.history_window(*window).await;
                if json_output {
                    Ok(serde_json::to_string(&points)?)
                } else {
                    Ok(display::format_history(&points, *window, symbol))
                }
            }

            Command::HistoryReset => {
                let points = service.reset_history().await?;
                if json_output {
                    Ok(serde_json::json!({ "points": points }).to_string())
                } else {
                    Ok(format!("Balance history reset ({points} estimated points)."))
                }
            }

            Command::Admin { action } => match action {
                AdminAction::Check(account) => {
                    let is_admin = service.is_admin(*account).await?;
                    if json_output {
                        Ok(serde_json::json!({
                            "address": format!("{account:#x}"),
                            "admin": is_admin,
                        })
                        .to_string())
                    } else if is_admin {
                        Ok(format!("{account:#x} is an admin."))
                    } else {
                        Ok(format!("{account:#x} is not an admin."))
                    }
                }
                AdminAction::Add(account) => {
                    let receipt = service.add_admin(*account).await?;
                    if json_output {
                        Ok(receipt_json(&receipt).to_string())
                    } else {
                        Ok(receipt_text(&format!("Admin {account:#x} added."), &receipt))
                    }
                }
                AdminAction::Remove(account) => {
                    let receipt = service.remove_admin(*account).await?;
                    if json_output {
                        Ok(receipt_json(&receipt).to_string())
                    } else {
                        Ok(receipt_text(&format!("Admin {account:#x} removed."), &receipt))
                    }
                }
            },

            Command::Withdraw { target, recipient } => {
                let receipt = service.withdraw(*target, *recipient).await?;
                if json_output {
                    return Ok(receipt_json(&receipt).to_string());
                }
                let title = match target {
                    WithdrawTarget::One(address) => {
                        format!("Withdrew {address:#x} to {recipient:#x}.")
                    }
                    WithdrawTarget::All => format!("Withdrew all balances to {recipient:#x}."),
                };
                Ok(receipt_text(&title, &receipt))
            }

            Command::Help { command } => Ok(help_text(command.as_deref())),

            Command::Exit => Ok(String::new()),
        }
    }
}

/// The last fetched aggregate, running a cycle first if there is none yet.
async fn last_known_or_fetch(service: &DashboardService) -> Result<Aggregate> {
    if let Some(aggregate) = service.aggregate().await {
        return Ok(aggregate);
    }
    match service.refresh().await? {
        RefreshOutcome::Skipped => bail!("A refresh is in progress. Try again in a moment."),
        RefreshOutcome::Stale => bail!("Connection changed during refresh. Try again."),
        RefreshOutcome::Updated { .. } => {}
    }
    service
        .aggregate()
        .await
        .ok_or_else(|| anyhow::anyhow!("No data yet. Try 'refresh'."))
}

/// Refresh the price, falling back to the last good one.
async fn current_price(service: &DashboardService) -> Option<f64> {
    match service.refresh_price().await {
        Ok(price) => Some(price),
        Err(_) => service.usd_price().await,
    }
}

async fn list_view(service: &DashboardService, view: &ViewFilter, json_output: bool) -> Result<String> {
    let entries = service.addresses(view).await;
    if json_output {
        return Ok(display::format_addresses_json(&entries));
    }
    let mut out = format!("Showing {} ({})", view.mode, view.sort);
    if !view.search.is_empty() {
        out.push_str(&format!(", matching '{}'", view.search));
    }
    out.push('\n');
    out.push_str(&display::format_addresses(&entries, service.symbol()));
    Ok(out)
}
