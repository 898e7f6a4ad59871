/// Command definitions and parsing for the dashboard REPL and one-shot mode.
mod execute;
mod help;
mod parse;

pub use help::help_text;

use alloy_primitives::Address;

use crate::history::TimeWindow;
use crate::service::WithdrawTarget;
use crate::view::{FilterMode, SortDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Check(Address),
    Add(Address),
    Remove(Address),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Prompt the wallet for a connection
    Connect,
    /// Drop the connection and fetched data
    Disconnect,
    /// Show connection, cycle and banner state
    Status,
    /// Run a fetch cycle now
    Refresh,
    /// Show the aggregate balance: balance [usd]
    Balance { usd: bool },
    /// Show the native currency's USD price
    Price,
    /// List managed contracts: addresses [all|nonzero] [asc|desc]
    Addresses {
        mode: Option<FilterMode>,
        sort: Option<SortDirection>,
    },
    /// Ask the contract which addresses hold a balance
    OnchainNonzero,
    /// Set the address search text; empty clears it
    Search { query: String },
    /// Show the balance chart: history [1D|1W|1M|1Y|ALL]
    History { window: TimeWindow },
    /// Wipe and reseed stored history
    HistoryReset,
    /// admin check|add|remove <address>
    Admin { action: AdminAction },
    /// withdraw <address|all> <recipient>
    Withdraw {
        target: WithdrawTarget,
        recipient: Address,
    },
    /// Print help
    Help { command: Option<String> },
    /// Exit the dashboard
    Exit,
}

impl Command {
    /// Returns a confirmation prompt if this command should ask before executing.
    pub fn confirmation_prompt(&self) -> Option<String> {
        match self {
            Command::Admin {
                action: AdminAction::Add(account),
            } => Some(format!("Grant admin rights to {account:#x}?")),
            Command::Admin {
                action: AdminAction::Remove(account),
            } => Some(format!("Revoke admin rights from {account:#x}?")),
            Command::Withdraw {
                target: WithdrawTarget::One(address),
                recipient,
            } => Some(format!(
                "Withdraw the balance of {address:#x} to {recipient:#x}?"
            )),
            Command::Withdraw {
                target: WithdrawTarget::All,
                recipient,
            } => Some(format!(
                "Withdraw ALL managed balances to {recipient:#x}?"
            )),
            Command::HistoryReset => {
                Some("Delete stored balance history and start over?".to_string())
            }
            _ => None,
        }
    }

    /// True for commands that read from or write to the contract.
    pub fn needs_session(&self) -> bool {
        !matches!(
            self,
            Command::Connect
                | Command::Disconnect
                | Command::Status
                | Command::Price
                | Command::History { .. }
                | Command::HistoryReset
                | Command::Help { .. }
                | Command::Exit
        )
    }

    /// True for commands that send a transaction.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Command::Withdraw { .. }
                | Command::Admin {
                    action: AdminAction::Add(_) | AdminAction::Remove(_)
                }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    #[test]
    fn withdraw_requires_confirmation() {
        let cmd = Command::Withdraw {
            target: WithdrawTarget::One(addr(0x0a)),
            recipient: addr(0x77),
        };
        let prompt = cmd.confirmation_prompt().unwrap();
        assert!(prompt.contains("0x0a0a"));
        assert!(prompt.contains("0x7777"));
        assert!(cmd.is_write());
    }

    #[test]
    fn withdraw_all_prompt_is_explicit() {
        let cmd = Command::Withdraw {
            target: WithdrawTarget::All,
            recipient: addr(0x77),
        };
        assert!(cmd.confirmation_prompt().unwrap().contains("ALL"));
    }

    #[test]
    fn admin_changes_require_confirmation() {
        let add = Command::Admin {
            action: AdminAction::Add(addr(1)),
        };
        let remove = Command::Admin {
            action: AdminAction::Remove(addr(1)),
        };
        let check = Command::Admin {
            action: AdminAction::Check(addr(1)),
        };
        assert!(add.confirmation_prompt().is_some());
        assert!(remove.confirmation_prompt().is_some());
        assert!(check.confirmation_prompt().is_none());
        assert!(!check.is_write());
    }

    #[test]
    fn reads_do_not_confirm() {
        assert!(Command::Refresh.confirmation_prompt().is_none());
        assert!(Command::Balance { usd: true }.confirmation_prompt().is_none());
        assert!(Command::HistoryReset.confirmation_prompt().is_some());
        assert!(!Command::HistoryReset.is_write());
        assert!(!Command::HistoryReset.needs_session());
        assert!(Command::Refresh.needs_session());
    }
}
