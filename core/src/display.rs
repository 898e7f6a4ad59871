/// Output formatting: wei conversion, balances, address tables, history charts.
///
/// Native currency uses 18 decimal places. 1 unit = 10^18 wei.
use alloy_primitives::{Address, U256};
use num_format::{Locale, ToFormattedString};

use crate::fetcher::{Aggregate, ManagedAddress};
use crate::history::{BalanceSnapshot, TimeWindow};

const WEI_PER_UNIT: u64 = 1_000_000_000_000_000_000;
const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

fn split_wei(wei: U256) -> (U256, u64) {
    let unit = U256::from(WEI_PER_UNIT);
    (wei / unit, (wei % unit).to::<u64>())
}

/// Convert wei to a full-precision decimal string.
/// Examples: 1_500_000_000_000_000_000 -> "1.500000000000000000", 0 -> "0.000000000000000000"
#[must_use]
pub fn wei_to_ether(wei: U256) -> String {
    let (whole, frac) = split_wei(wei);
    format!("{whole}.{frac:018}")
}

/// Approximate whole-unit value, for totals, charts and USD conversion.
#[must_use]
pub fn wei_to_f64(wei: U256) -> f64 {
    let (whole, frac) = split_wei(wei);
    whole.saturating_to::<u128>() as f64 + frac as f64 / WEI_PER_UNIT as f64
}

/// Human amount with 2 to 8 decimals, rounded half up.
/// Examples: 1.5 units -> "1.50", 0.123456789 units -> "0.12345679"
#[must_use]
pub fn format_amount(wei: U256) -> String {
    // Half of the smallest shown digit (1e-8 units = 1e10 wei).
    let (whole, frac) = split_wei(wei.saturating_add(U256::from(5_000_000_000u64)));
    let digits = format!("{frac:018}");
    let shown = digits[..8].trim_end_matches('0');
    let shown = if shown.len() < 2 {
        &digits[..2]
    } else {
        shown
    };
    format!("{whole}.{shown}")
}

/// Format a balance with its currency symbol.
#[must_use]
pub fn format_balance(wei: U256, symbol: &str) -> String {
    format!("{} {symbol}", format_amount(wei))
}

/// US dollar amount with thousands separators: "$1,234.56".
#[must_use]
pub fn format_usd(value: f64) -> String {
    if !value.is_finite() || value < 0.0 {
        return "$-".to_string();
    }
    let cents = (value * 100.0).round() as u128;
    format!(
        "${}.{:02}",
        (cents / 100).to_formatted_string(&Locale::en),
        cents % 100
    )
}

/// `0x1234…abcd`
#[must_use]
pub fn short_address(address: &Address) -> String {
    let full = format!("{address:#x}");
    format!("{}…{}", &full[..6], &full[full.len() - 4..])
}

/// Total balance line, with USD when a price is known.
#[must_use]
pub fn format_total(aggregate: &Aggregate, symbol: &str, usd_price: Option<f64>, show_usd: bool) -> String {
    let native = format_balance(aggregate.total_wei, symbol);
    let mut out = match (show_usd, usd_price) {
        (true, Some(price)) => format!(
            "Total balance: {}  ({native})",
            format_usd(aggregate.total_display() * price)
        ),
        (true, None) => format!("Total balance: {native}  (price unavailable)"),
        (false, _) => format!("Total balance: {native}"),
    };
    if let Some(price) = usd_price {
        out.push_str(&format!("\n  1 {symbol} = {}", format_usd(price)));
    }
    out.push_str(&format!("\n  Contracts: {}", aggregate.entries.len()));
    out
}

/// Address table, one line per managed contract.
#[must_use]
pub fn format_addresses(entries: &[ManagedAddress], symbol: &str) -> String {
    if entries.is_empty() {
        return "No contracts found.".to_string();
    }
    entries
        .iter()
        .map(|e| {
            let flag = if e.balance_failed { "  [balance unavailable]" } else { "" };
            format!("  {:#x}  {}{flag}", e.address, format_balance(e.balance_wei, symbol))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compact Y-axis label.
#[must_use]
pub fn format_chart_label(value: f64) -> String {
    if value.abs() >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if value.abs() >= 1_000.0 {
        format!("{:.1}K", value / 1_000.0)
    } else {
        format!("{value:.2}")
    }
}

/// One-line sparkline of the window plus min/max labels.
/// Synthetic points are counted separately so placeholder data is visible as such.
#[must_use]
pub fn format_history(points: &[BalanceSnapshot], window: TimeWindow, symbol: &str) -> String {
    if points.is_empty() {
        return format!("No balance history for {window}.");
    }
    let min = points.iter().map(|p| p.total_balance).fold(f64::INFINITY, f64::min);
    let max = points.iter().map(|p| p.total_balance).fold(f64::NEG_INFINITY, f64::max);
    let range = (max - min).max(f64::EPSILON);
    let line: String = points
        .iter()
        .map(|p| {
            let idx = (((p.total_balance - min) / range) * (SPARK.len() - 1) as f64).round() as usize;
            SPARK[idx.min(SPARK.len() - 1)]
        })
        .collect();
    let synthetic = points.iter().filter(|p| p.synthetic).count();
    let mut out = format!(
        "{window}  {line}\n  low {} {symbol}  high {} {symbol}  points {}",
        format_chart_label(min),
        format_chart_label(max),
        points.len()
    );
    if synthetic > 0 {
        out.push_str(&format!("  ({synthetic} estimated)"));
    }
    out
}

/// Total balance as JSON.
#[must_use]
pub fn format_total_json(aggregate: &Aggregate, usd_price: Option<f64>) -> String {
    serde_json::json!({
        "total_wei": aggregate.total_wei.to_string(),
        "total": wei_to_ether(aggregate.total_wei),
        "usd_price": usd_price,
        "usd_value": usd_price.map(|p| p * aggregate.total_display()),
        "contracts": aggregate.entries.len(),
        "failed_balances": aggregate.failed_count(),
    })
    .to_string()
}

/// Address list as JSON.
#[must_use]
pub fn format_addresses_json(entries: &[ManagedAddress]) -> String {
    let rows: Vec<serde_json::Value> = entries
        .iter()
        .map(|e| {
            serde_json::json!({
                "address": format!("{:#x}", e.address),
                "balance_wei": e.balance_wei.to_string(),
                "balance": wei_to_ether(e.balance_wei),
                "balance_failed": e.balance_failed,
            })
        })
        .collect();
    serde_json::Value::Array(rows).to_string()
}
