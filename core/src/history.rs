/// Balance history: a capped, append-only series of total-balance snapshots
/// with window queries for charting.
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::store::SnapshotStore;

/// Maximum retained snapshots; the oldest is evicted first.
pub const MAX_SNAPSHOTS: usize = 1000;
/// Totals closer than this to the last snapshot count as unchanged.
pub const CHANGE_EPSILON: f64 = 1e-9;
/// An unchanged total is still recorded once this much time has passed.
pub const SNAPSHOT_INTERVAL_MS: i64 = 60 * 60 * 1000;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
const SEED_POINTS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub timestamp_ms: i64,
    pub total_balance: f64,
    /// Seeded or interpolated, not an observed total.
    #[serde(default)]
    pub synthetic: bool,
}

impl BalanceSnapshot {
    pub fn real(timestamp_ms: i64, total_balance: f64) -> Self {
        Self {
            timestamp_ms,
            total_balance,
            synthetic: false,
        }
    }

    pub fn synthetic(timestamp_ms: i64, total_balance: f64) -> Self {
        Self {
            timestamp_ms,
            total_balance,
            synthetic: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeWindow {
    Day,
    Week,
    Month,
    Year,
    #[default]
    All,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 5] = [Self::Day, Self::Week, Self::Month, Self::Year, Self::All];

    /// Window length, `None` for unbounded.
    pub fn duration_ms(self) -> Option<i64> {
        match self {
            Self::Day => Some(DAY_MS),
            Self::Week => Some(7 * DAY_MS),
            Self::Month => Some(30 * DAY_MS),
            Self::Year => Some(365 * DAY_MS),
            Self::All => None,
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Day => "1D",
            Self::Week => "1W",
            Self::Month => "1M",
            Self::Year => "1Y",
            Self::All => "ALL",
        };
        write!(f, "{label}")
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "1D" | "D" | "DAY" => Ok(Self::Day),
            "1W" | "W" | "WEEK" => Ok(Self::Week),
            "1M" | "M" | "MONTH" => Ok(Self::Month),
            "1Y" | "Y" | "YEAR" => Ok(Self::Year),
            "ALL" => Ok(Self::All),
            other => Err(format!("Unknown window '{other}'. Use 1D, 1W, 1M, 1Y or ALL.")),
        }
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryCache {
    snapshots: VecDeque<BalanceSnapshot>,
}

impl HistoryCache {
    /// Build from a persisted sequence: ordered by time, trimmed to the cap.
    pub fn new(mut snapshots: Vec<BalanceSnapshot>) -> Self {
        snapshots.sort_by_key(|s| s.timestamp_ms);
        let excess = snapshots.len().saturating_sub(MAX_SNAPSHOTS);
        Self {
            snapshots: snapshots.into_iter().skip(excess).collect(),
        }
    }

    /// Deterministic upward-trending placeholder series ending at `now_ms`.
    /// Every point is marked synthetic.
    pub fn seed(now_ms: i64) -> Self {
        let snapshots = (0..SEED_POINTS)
            .map(|k| {
                let t = now_ms - (SEED_POINTS - 1 - k) * DAY_MS;
                let trend = 1.0 + 0.02 * k as f64;
                let wiggle = 0.05 * (k as f64 * 0.7).sin();
                BalanceSnapshot::synthetic(t, (trend + wiggle).max(0.0))
            })
            .collect();
        Self { snapshots }
    }

    /// Load the persisted series, seeding and persisting one if none exists
    /// or the stored one cannot be decoded.
    pub fn load(store: &SnapshotStore, now_ms: i64) -> anyhow::Result<Self> {
        match store.load_snapshots() {
            Ok(Some(snapshots)) => {
                debug!("loaded {} balance snapshots", snapshots.len());
                return Ok(Self::new(snapshots));
            }
            Ok(None) => debug!("no balance history stored; seeding"),
            Err(e) => warn!("stored balance history unreadable, reseeding: {e:#}"),
        }
        let seeded = Self::seed(now_ms);
        seeded.persist(store)?;
        Ok(seeded)
    }

    pub fn persist(&self, store: &SnapshotStore) -> anyhow::Result<()> {
        store.save_snapshots(&self.to_vec())
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn last(&self) -> Option<&BalanceSnapshot> {
        self.snapshots.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BalanceSnapshot> {
        self.snapshots.iter()
    }

    pub fn to_vec(&self) -> Vec<BalanceSnapshot> {
        self.snapshots.iter().copied().collect()
    }

    /// Observed samples only.
    pub fn real_points(&self) -> Vec<BalanceSnapshot> {
        self.snapshots.iter().filter(|s| !s.synthetic).copied().collect()
    }

    /// Record a fetched total if it changed or the last snapshot is stale.
    /// Returns whether a snapshot was appended.
    pub fn record(&mut self, total_balance: f64, now_ms: i64) -> bool {
        let total_balance = total_balance.max(0.0);
        let due = match self.snapshots.back() {
            None => true,
            Some(last) => {
                (total_balance - last.total_balance).abs() > CHANGE_EPSILON
                    || now_ms - last.timestamp_ms > SNAPSHOT_INTERVAL_MS
            }
        };
        if due {
            self.push(BalanceSnapshot::real(now_ms, total_balance));
        }
        due
    }

    /// Append, clamping the timestamp so the series never goes backwards,
    /// and evict from the front past the cap.
    fn push(&mut self, mut snapshot: BalanceSnapshot) {
        if let Some(last) = self.snapshots.back() {
            snapshot.timestamp_ms = snapshot.timestamp_ms.max(last.timestamp_ms);
        }
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > MAX_SNAPSHOTS {
            self.snapshots.pop_front();
        }
    }

    /// Linear interpolation of the series at `t`, flat beyond either end.
    pub fn value_at(&self, t: i64) -> Option<f64> {
        let after_idx = self.snapshots.partition_point(|s| s.timestamp_ms < t);
        let next = self.snapshots.get(after_idx);
        let prev = after_idx
            .checked_sub(1)
            .and_then(|i| self.snapshots.get(i));
        match (prev, next) {
            (Some(p), Some(n)) if n.timestamp_ms > p.timestamp_ms => {
                let frac = (t - p.timestamp_ms) as f64 / (n.timestamp_ms - p.timestamp_ms) as f64;
                Some(p.total_balance + frac * (n.total_balance - p.total_balance))
            }
            (_, Some(n)) => Some(n.total_balance),
            (Some(p), None) => Some(p.total_balance),
            (None, None) => None,
        }
    }

    /// Points within `window` of `now_ms`. When fewer than two remain, the
    /// series is interpolated at the window edges so a line can be drawn;
    /// those edge points are marked synthetic.
    pub fn window(&self, window: TimeWindow, now_ms: i64) -> Vec<BalanceSnapshot> {
        self.window_span(window.duration_ms(), now_ms)
    }

    pub fn window_span(&self, span_ms: Option<i64>, now_ms: i64) -> Vec<BalanceSnapshot> {
        let Some(span) = span_ms else {
            return self.to_vec();
        };
        let points: Vec<BalanceSnapshot> = self
            .snapshots
            .iter()
            .filter(|s| (0..=span).contains(&(now_ms - s.timestamp_ms)))
            .copied()
            .collect();
        if points.len() >= 2 || self.snapshots.is_empty() {
            return points;
        }

        let start = now_ms - span;
        let mut out = Vec::with_capacity(3);
        if let Some(v) = self.value_at(start) {
            out.push(BalanceSnapshot::synthetic(start, v));
        }
        out.extend(points);
        let ends_before_now = out.last().map(|s| s.timestamp_ms < now_ms).unwrap_or(true);
        if out.len() < 2 || ends_before_now {
            if let Some(v) = self.value_at(now_ms) {
                out.push(BalanceSnapshot::synthetic(now_ms, v));
            }
        }
        out
    }
}
