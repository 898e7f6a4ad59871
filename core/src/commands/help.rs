#[must_use]
pub fn help_text(command: Option<&str>) -> String {
    match command {
        Some("connect") => {
            "connect\n  Ask the wallet for access and bind the management contract\n  to the first account it returns.".to_string()
        }
        Some("disconnect") => {
            "disconnect\n  Forget the connection and all fetched data.\n  A refresh still running is discarded.".to_string()
        }
        Some("status") => {
            "status\n  Show the connected account, contract, refresh state,\n  history size, and any warning banner.".to_string()
        }
        Some("refresh") | Some("r") => {
            "refresh\n  Fetch every managed address and its balance now.\n  Skipped if a refresh or a transaction is already running.\n  Alias: r".to_string()
        }
        Some("balance") | Some("bal") => {
            "balance [usd]\n  Show the total balance across all managed contracts.\n  With 'usd', also fetch the current USD price.\n  Alias: bal".to_string()
        }
        Some("price") => "price\n  Show the USD price of the native currency.".to_string(),
        Some("addresses") | Some("addrs") | Some("ls") => {
            "addresses [all|nonzero] [asc|desc]\n  List managed contracts with their balances.\n  Filter and sort persist until you disconnect.\n  Default: all, highest first.\n  Aliases: addrs, ls".to_string()
        }
        Some("search") | Some("find") => {
            "search <text>\n  Show addresses containing <text> (case-insensitive).\n  'search' with no text clears the search.\n  Alias: find".to_string()
        }
        Some("onchain_nonzero") | Some("nonzero") => {
            "onchain_nonzero\n  Ask the contract itself which addresses hold a balance.\n  Alias: nonzero".to_string()
        }
        Some("history") | Some("chart") => {
            "history [1D|1W|1M|1Y|ALL]\n  Chart the total balance over a time window.\n  Estimated points are counted separately.\n  Default: ALL.\n  Alias: chart".to_string()
        }
        Some("history_reset") => {
            "history_reset\n  Delete stored balance history and start from a fresh estimate.".to_string()
        }
        Some("admin") => {
            "admin check|add|remove <address>\n  Check, grant, or revoke admin rights on the management contract.\n  add and remove send a transaction and ask for confirmation.".to_string()
        }
        Some("withdraw") => {
            "withdraw <address|all> <recipient>\n  Withdraw one managed contract's balance, or all of them,\n  to <recipient>. Waits for confirmation, then refreshes.\n  Examples: withdraw 0x12…ab 0x34…cd\n           withdraw all 0x34…cd".to_string()
        }
        Some("exit") | Some("quit") | Some("q") => {
            "exit\n  Exit the dashboard.\n  Aliases: quit, q".to_string()
        }
        Some(other) => format!("Unknown command: '{other}'. Type 'help' for a list."),
        None => {
            "Available commands:\n\
             \n\
             \x20 connect          Connect a wallet\n\
             \x20 disconnect       Drop the connection\n\
             \x20 status           Show connection and refresh state\n\
             \x20 refresh          Fetch balances now\n\
             \x20 balance [usd]    Show total balance\n\
             \x20 price            Show USD price\n\
             \x20 addresses        List managed contracts\n\
             \x20 search <text>    Filter addresses by text\n\
             \x20 onchain_nonzero  Contract's list of funded addresses\n\
             \x20 history [window] Chart total balance\n\
             \x20 history_reset    Start history over\n\
             \x20 admin            Check, add, or remove admins\n\
             \x20 withdraw         Withdraw balances to a recipient\n\
             \x20 help [cmd]       Show help for a command\n\
             \x20 exit             Exit the dashboard\n\
             \n\
             Type 'help <command>' for detailed help on a specific command."
                .to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_text_general() {
        let text = help_text(None);
        assert!(text.contains("balance"));
        assert!(text.contains("withdraw"));
        assert!(text.contains("history_reset"));
    }

    #[test]
    fn help_text_specific() {
        let text = help_text(Some("withdraw"));
        assert!(text.contains("<address|all>"));
        assert!(text.contains("<recipient>"));
    }

    #[test]
    fn help_text_alias() {
        assert_eq!(help_text(Some("ls")), help_text(Some("addresses")));
    }

    #[test]
    fn help_text_unknown() {
        let text = help_text(Some("nonexistent"));
        assert!(text.contains("Unknown command"));
    }
}
