//! Domain error type for dashboard operations.

use thiserror::Error;

/// Typed error enum for dashboard operations, allowing callers to match on
/// specific failure modes instead of inspecting opaque `anyhow::Error` messages.
///
/// Per-address balance failures are deliberately absent: the fetcher recovers
/// those locally by substituting a zero balance.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Wallet provider missing, or the user declined the connection prompt.
    #[error("{0}")]
    Connection(String),

    /// Signer acquisition or contract handle construction failed.
    #[error("{0}")]
    ContractInit(String),

    /// A contract read (address list, admin check) failed.
    #[error("{0}")]
    Read(String),

    /// A state-changing call was rejected, reverted, or never confirmed.
    #[error("{0}")]
    Write(String),

    /// USD price lookup failed. Only degrades the USD display.
    #[error("{0}")]
    PriceFetch(String),

    /// Snapshot store error (SQLite, JSON encoding).
    #[error("{0}")]
    Storage(String),

    /// Malformed address input.
    #[error("{0}")]
    InvalidAddress(String),

    /// Unexpected error from internal subsystems.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DashboardError {
    /// True when the user has to act (connect, retry) before anything else works.
    pub fn needs_connection(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::ContractInit(_))
    }
}

/// Alias for `std::result::Result<T, DashboardError>`.
pub type Result<T> = std::result::Result<T, DashboardError>;
