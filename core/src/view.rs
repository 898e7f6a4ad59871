/// View state reducer: derive the displayed list from fetched data without
/// touching the network.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::fetcher::ManagedAddress;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterMode {
    #[default]
    All,
    NonZeroOnly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Desc,
    Asc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            Self::Desc => Self::Asc,
            Self::Asc => Self::Desc,
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::NonZeroOnly => write!(f, "nonzero"),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Desc => write!(f, "highest first"),
            Self::Asc => write!(f, "lowest first"),
        }
    }
}

impl FromStr for FilterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" | "contract" => Ok(Self::All),
            "nonzero" | "balance" | "funded" => Ok(Self::NonZeroOnly),
            other => Err(format!("Unknown filter '{other}'. Use 'all' or 'nonzero'.")),
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "desc" | "highest" => Ok(Self::Desc),
            "asc" | "lowest" => Ok(Self::Asc),
            other => Err(format!("Unknown sort '{other}'. Use 'asc' or 'desc'.")),
        }
    }
}

/// Per-screen filter state. `Default` is the reset-on-navigation state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewFilter {
    pub mode: FilterMode,
    pub sort: SortDirection,
    pub search: String,
}

impl ViewFilter {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Keep entries that pass `mode`.
pub fn filter(entries: &[ManagedAddress], mode: FilterMode) -> Vec<ManagedAddress> {
    match mode {
        FilterMode::All => entries.to_vec(),
        FilterMode::NonZeroOnly => entries
            .iter()
            .filter(|e| !e.balance_wei.is_zero())
            .cloned()
            .collect(),
    }
}

/// Case-insensitive substring match on the hex address. Empty query matches all.
pub fn search(entries: &[ManagedAddress], query: &str) -> Vec<ManagedAddress> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return entries.to_vec();
    }
    entries
        .iter()
        .filter(|e| format!("{:#x}", e.address).contains(&needle))
        .cloned()
        .collect()
}

/// Stable sort by balance; equal balances keep fetch order.
pub fn sort(entries: &mut [ManagedAddress], direction: SortDirection) {
    match direction {
        SortDirection::Desc => entries.sort_by(|a, b| b.balance_wei.cmp(&a.balance_wei)),
        SortDirection::Asc => entries.sort_by(|a, b| a.balance_wei.cmp(&b.balance_wei)),
    }
}

/// Filter, search, then sort.
pub fn apply(entries: &[ManagedAddress], view: &ViewFilter) -> Vec<ManagedAddress> {
    let mut out = search(&filter(entries, view.mode), &view.search);
    sort(&mut out, view.sort);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};

    fn entry(n: u8, wei: u64) -> ManagedAddress {
        ManagedAddress::new(Address::repeat_byte(n), U256::from(wei))
    }

    fn sample() -> Vec<ManagedAddress> {
        vec![entry(1, 5), entry(2, 0), entry(3, 9), entry(4, 5), entry(5, 0)]
    }

    fn ids(entries: &[ManagedAddress]) -> Vec<u8> {
        entries.iter().map(|e| e.address[0]).collect()
    }

    #[test]
    fn nonzero_drops_empty_balances() {
        assert_eq!(ids(&filter(&sample(), FilterMode::NonZeroOnly)), vec![1, 3, 4]);
        assert_eq!(filter(&sample(), FilterMode::All), sample());
    }

    #[test]
    fn nonzero_is_idempotent() {
        let once = filter(&sample(), FilterMode::NonZeroOnly);
        let twice = filter(&once, FilterMode::NonZeroOnly);
        assert_eq!(once, twice);
    }

    #[test]
    fn desc_sort_is_stable() {
        let mut entries = sample();
        sort(&mut entries, SortDirection::Desc);
        // 1 and 4 tie at 5, 2 and 5 tie at 0: fetch order kept.
        assert_eq!(ids(&entries), vec![3, 1, 4, 2, 5]);
    }

    #[test]
    fn asc_sort_is_stable() {
        let mut entries = sample();
        sort(&mut entries, SortDirection::Asc);
        assert_eq!(ids(&entries), vec![2, 5, 1, 4, 3]);
    }

    #[test]
    fn sort_respects_order_for_unequal_balances() {
        let mut entries = sample();
        sort(&mut entries, SortDirection::Desc);
        for pair in entries.windows(2) {
            assert!(pair[0].balance_wei >= pair[1].balance_wei);
        }
        sort(&mut entries, SortDirection::Asc);
        for pair in entries.windows(2) {
            assert!(pair[0].balance_wei <= pair[1].balance_wei);
        }
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let entries = vec![entry(0xab, 1), entry(0x12, 1)];
        assert_eq!(ids(&search(&entries, "ABAB")), vec![0xab]);
        assert_eq!(ids(&search(&entries, "0x1212")), vec![0x12]);
        assert!(search(&entries, "zz").is_empty());
    }

    #[test]
    fn empty_search_matches_all() {
        assert_eq!(search(&sample(), ""), sample());
        assert_eq!(search(&sample(), "   "), sample());
    }

    #[test]
    fn apply_combines_all_steps() {
        let view = ViewFilter {
            mode: FilterMode::NonZeroOnly,
            sort: SortDirection::Asc,
            search: String::new(),
        };
        assert_eq!(ids(&apply(&sample(), &view)), vec![1, 4, 3]);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut view = ViewFilter {
            mode: FilterMode::NonZeroOnly,
            sort: SortDirection::Asc,
            search: "ab".into(),
        };
        view.reset();
        assert_eq!(view, ViewFilter::default());
        assert_eq!(view.sort.toggled(), SortDirection::Asc);
    }

    #[test]
    fn parse_filter_and_sort() {
        assert_eq!("NONZERO".parse::<FilterMode>().unwrap(), FilterMode::NonZeroOnly);
        assert_eq!("asc".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert!("sideways".parse::<SortDirection>().is_err());
    }
}
