//! Error types for the sequenced swap client
//!
//! Every fallible operation in the crate returns [`ContinuumError`]. The
//! taxonomy mirrors how the ordering program and the network can fail:
//! - Retryable: `OrdinalConflict`, `StaleTransportReference`
//! - Fatal remote: `AuthorizationFailure`, `InsufficientFundsOrSlippage`, `Rejected`
//! - Fatal local: `Configuration`, `Decode`, `Signing`
//! - Bounded waits: `Timeout`, `RetryBudgetExhausted`
//!
//! Remote failures keep the program log lines verbatim so callers can tell
//! protocol noise from a genuine liquidity or configuration problem.

use thiserror::Error;

/// Crate-wide result alias
pub type ContinuumResult<T> = std::result::Result<T, ContinuumError>;

/// Comprehensive error type for all client protocol operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContinuumError {
    /// The claimed ordinal no longer matches `counter + 1` on the ledger
    #[error("Ordinal conflict: claimed {claimed}, counter observed at {observed:?}")]
    OrdinalConflict {
        /// Ordinal embedded in the rejected request
        claimed: u64,
        /// Counter value observed when the conflict was classified, if known
        observed: Option<u64>,
        /// Program log lines returned with the rejection
        logs: Vec<String>,
    },

    /// The blockhash used for signing expired before inclusion
    #[error("Stale transport reference: {0}")]
    StaleTransportReference(String),

    /// The delegate or pool authority handle was not accepted by the venue
    #[error("Authorization failure: {reason}")]
    AuthorizationFailure {
        reason: String,
        logs: Vec<String>,
    },

    /// Caller-side precondition violated (balance, fee payer funds, minimum output)
    #[error("Insufficient funds or slippage: {reason}")]
    InsufficientFundsOrSlippage {
        reason: String,
        logs: Vec<String>,
    },

    /// A bounded wait elapsed
    #[error("Timeout after {elapsed_ms}ms in {operation} (target: {target:?}, last observed: {last_observed:?})")]
    Timeout {
        operation: String,
        elapsed_ms: u64,
        target: Option<u64>,
        last_observed: Option<u64>,
    },

    /// Missing or malformed configuration; raised before any network call
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network or RPC failure that did not produce a typed remote rejection
    #[error("Transport error: {0}")]
    Transport(String),

    /// Remote state could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Local signing failed
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Any other remote rejection
    #[error("Transaction rejected: {reason}")]
    Rejected {
        reason: String,
        logs: Vec<String>,
    },

    /// The retry budget ran out on retryable failures
    #[error("Retry budget exhausted after {attempts} attempts; last error: {last}")]
    RetryBudgetExhausted {
        attempts: u32,
        last: Box<ContinuumError>,
    },
}

impl ContinuumError {
    /// Check if the submitter may absorb this error and try again
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::OrdinalConflict { .. } => true,
            Self::StaleTransportReference(_) => true,

            Self::AuthorizationFailure { .. } => false,
            Self::InsufficientFundsOrSlippage { .. } => false,
            Self::Timeout { .. } => false,
            Self::Configuration(_) => false,
            Self::Transport(_) => false,
            Self::Decode(_) => false,
            Self::Signing(_) => false,
            Self::Rejected { .. } => false,
            Self::RetryBudgetExhausted { .. } => false,
        }
    }

    /// Get the error category for metrics and journal records
    pub fn category(&self) -> &'static str {
        match self {
            Self::OrdinalConflict { .. } => "ordinal_conflict",
            Self::StaleTransportReference(_) => "stale_reference",
            Self::AuthorizationFailure { .. } => "authorization",
            Self::InsufficientFundsOrSlippage { .. } => "funds_or_slippage",
            Self::Timeout { .. } => "timeout",
            Self::Configuration(_) => "config",
            Self::Transport(_) => "transport",
            Self::Decode(_) => "decode",
            Self::Signing(_) => "signing",
            Self::Rejected { .. } => "rejected",
            Self::RetryBudgetExhausted { .. } => "retry_exhausted",
        }
    }

    /// Program log lines attached to a remote failure (empty for local errors)
    pub fn logs(&self) -> &[String] {
        match self {
            Self::OrdinalConflict { logs, .. }
            | Self::AuthorizationFailure { logs, .. }
            | Self::InsufficientFundsOrSlippage { logs, .. }
            | Self::Rejected { logs, .. } => logs,
            Self::RetryBudgetExhausted { last, .. } => last.logs(),
            _ => &[],
        }
    }

    /// Create a configuration error naming the offending field
    pub fn config_field(field: &str, reason: impl std::fmt::Display) -> Self {
        Self::Configuration(format!("{field}: {reason}"))
    }

    /// Create a timeout error for a wait that tracked an ordinal target
    pub fn wait_timeout(
        operation: impl Into<String>,
        elapsed: std::time::Duration,
        target: Option<u64>,
        last_observed: Option<u64>,
    ) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_ms: elapsed.as_millis() as u64,
            target,
            last_observed,
        }
    }
}

impl From<solana_sdk::signer::SignerError> for ContinuumError {
    fn from(err: solana_sdk::signer::SignerError) -> Self {
        ContinuumError::Signing(err.to_string())
    }
}
