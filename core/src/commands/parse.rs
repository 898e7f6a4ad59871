use anyhow::{bail, Context, Result};

use super::{AdminAction, Command};
use crate::config::parse_address;
use crate::history::TimeWindow;
use crate::service::WithdrawTarget;
use crate::view::{FilterMode, SortDirection};

impl Command {
    /// Parse a command from a raw input string.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            bail!("No command entered. Type 'help' for a list of commands.");
        }

        let mut parts = input.splitn(3, char::is_whitespace);
        let cmd = parts.next().unwrap_or_default().to_lowercase();
        let arg1 = parts.next().map(str::trim).filter(|s| !s.is_empty());
        let arg2 = parts.next().map(str::trim).filter(|s| !s.is_empty());

        match cmd.as_str() {
            "connect" => Ok(Command::Connect),

            "disconnect" => Ok(Command::Disconnect),

            "status" => Ok(Command::Status),

            "refresh" | "r" => Ok(Command::Refresh),

            "balance" | "bal" => match arg1.map(str::to_lowercase).as_deref() {
                None => Ok(Command::Balance { usd: false }),
                Some("usd") => Ok(Command::Balance { usd: true }),
                Some(other) => bail!("Unknown balance option '{other}'. Usage: balance [usd]"),
            },

            "price" => Ok(Command::Price),

            "addresses" | "addrs" | "ls" => {
                let mut mode = None;
                let mut sort = None;
                for word in [arg1, arg2].into_iter().flatten().flat_map(str::split_whitespace) {
                    if let Ok(m) = word.parse::<FilterMode>() {
                        mode = Some(m);
                    } else if let Ok(s) = word.parse::<SortDirection>() {
                        sort = Some(s);
                    } else {
                        bail!(
                            "Unknown option '{word}'. Usage: addresses [all|nonzero] [asc|desc]"
                        );
                    }
                }
                Ok(Command::Addresses { mode, sort })
            }

            "onchain_nonzero" | "nonzero" => Ok(Command::OnchainNonzero),

            "search" | "find" => {
                // Rejoin arg1 + arg2 so the query keeps its inner spacing
                let query = match (arg1, arg2) {
                    (Some(a), Some(b)) => format!("{a} {b}"),
                    (Some(a), None) => a.to_string(),
                    _ => String::new(),
                };
                Ok(Command::Search { query })
            }

            "history" | "chart" => {
                let window = match arg1 {
                    Some(w) => w.parse::<TimeWindow>().map_err(anyhow::Error::msg)?,
                    None => TimeWindow::default(),
                };
                Ok(Command::History { window })
            }

            "history_reset" => Ok(Command::HistoryReset),

            "admin" => {
                let action = arg1.ok_or_else(|| {
                    anyhow::anyhow!("Missing action. Usage: admin check|add|remove <address>")
                })?;
                let addr_str = arg2.ok_or_else(|| {
                    anyhow::anyhow!("Missing address. Usage: admin {action} <address>")
                })?;
                let account = parse_address(addr_str)?;
                let action = match action.to_lowercase().as_str() {
                    "check" | "is" => AdminAction::Check(account),
                    "add" | "grant" => AdminAction::Add(account),
                    "remove" | "rm" | "revoke" => AdminAction::Remove(account),
                    other => bail!("Unknown admin action '{other}'. Expected check, add or remove."),
                };
                Ok(Command::Admin { action })
            }

            "withdraw" => {
                let target_str = arg1.ok_or_else(|| {
                    anyhow::anyhow!("Missing target. Usage: withdraw <address|all> <recipient>")
                })?;
                let recipient_str = arg2.ok_or_else(|| {
                    anyhow::anyhow!("Missing recipient. Usage: withdraw <address|all> <recipient>")
                })?;
                let target = if target_str.eq_ignore_ascii_case("all") {
                    WithdrawTarget::All
                } else {
                    WithdrawTarget::One(parse_address(target_str).context("Invalid target")?)
                };
                let recipient = parse_address(recipient_str).context("Invalid recipient")?;
                Ok(Command::Withdraw { target, recipient })
            }

            "help" | "h" | "?" => Ok(Command::Help {
                command: arg1.map(|s| s.to_lowercase()),
            }),

            "exit" | "quit" | "q" => Ok(Command::Exit),

            other => bail!("Unknown command: '{other}'. Type 'help' for a list of commands."),
        }
    }
}
