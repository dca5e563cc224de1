//! Ledger access seam
//!
//! All network traffic in the crate goes through the [`LedgerRpc`] trait so
//! the sequence tracker, submitter and scheduler can be exercised against an
//! in-memory ledger. [`SolanaLedger`] is the production implementation over
//! the nonblocking Solana RPC and pubsub clients.

pub mod classify;
pub mod solana;

pub use classify::{classify_rejection, RejectionKind};
pub use solana::SolanaLedger;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_sdk::{
    commitment_config::{CommitmentConfig, CommitmentLevel},
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::{Transaction, TransactionError},
};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};

/// Failure reported by a ledger call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// Network or RPC failure without a typed transaction error
    #[error("transport: {0}")]
    Transport(String),

    /// The call did not complete within its bound
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The ledger rejected a transaction (preflight or execution)
    #[error("rejected: {error}")]
    Rejected {
        error: TransactionError,
        logs: Vec<String>,
    },
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Durability level a caller waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Durability {
    pub fn commitment(self) -> CommitmentConfig {
        CommitmentConfig {
            commitment: self.level(),
        }
    }

    pub fn level(self) -> CommitmentLevel {
        match self {
            Durability::Processed => CommitmentLevel::Processed,
            Durability::Confirmed => CommitmentLevel::Confirmed,
            Durability::Finalized => CommitmentLevel::Finalized,
        }
    }

    /// Whether a status observed at `observed` satisfies this durability
    pub fn satisfied_by(self, observed: Durability) -> bool {
        observed >= self
    }
}

impl PartialOrd for Durability {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Durability {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let rank = |d: &Durability| match d {
            Durability::Processed => 0u8,
            Durability::Confirmed => 1,
            Durability::Finalized => 2,
        };
        rank(self).cmp(&rank(other))
    }
}

/// Blockhash used to sign a transaction plus its expiry height
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockReference {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// Transmission options for a single send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOptions {
    /// Skip the RPC node's simulation before forwarding
    pub skip_preflight: bool,
    /// Commitment used for the preflight simulation
    pub preflight_durability: Durability,
    /// RPC-side rebroadcast attempts (`None` = node default)
    pub max_node_retries: Option<usize>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            skip_preflight: false,
            preflight_durability: Durability::Confirmed,
            max_node_retries: None,
        }
    }
}

impl SendOptions {
    /// Reduced-visibility transmission: no simulation, processed-level preflight,
    /// no node-side rebroadcast
    pub fn reduced_visibility() -> Self {
        Self {
            skip_preflight: true,
            preflight_durability: Durability::Processed,
            max_node_retries: Some(0),
        }
    }
}

/// Status of a sent signature
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureState {
    pub slot: u64,
    /// `Some` if the transaction executed and failed
    pub err: Option<TransactionError>,
    pub durability: Durability,
}

/// Live stream of raw account data for one address
pub struct AccountWatch {
    pub updates: mpsc::UnboundedReceiver<Vec<u8>>,
    /// Background task feeding `updates`; aborted when the watch is closed
    pub task: Option<JoinHandle<()>>,
}

impl AccountWatch {
    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.updates.close();
    }
}

impl Drop for AccountWatch {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Read/propose interface to the remote ledger
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Raw account data, `None` if the account does not exist
    async fn account_data(&self, address: &Pubkey) -> LedgerResult<Option<Vec<u8>>>;

    /// Fresh blockhash for signing
    async fn latest_blockhash(&self) -> LedgerResult<BlockReference>;

    /// Current ledger slot
    async fn slot(&self) -> LedgerResult<u64>;

    /// Transmit a signed transaction
    async fn send_transaction(
        &self,
        tx: &Transaction,
        options: &SendOptions,
    ) -> LedgerResult<Signature>;

    /// Status of a previously sent signature, `None` while unknown to the ledger
    async fn signature_state(&self, signature: &Signature) -> LedgerResult<Option<SignatureState>>;

    /// Program log lines of an executed transaction
    async fn transaction_logs(&self, signature: &Signature) -> LedgerResult<Vec<String>>;

    /// Whether a blockhash can still land a transaction
    async fn is_blockhash_valid(&self, blockhash: &Hash) -> LedgerResult<bool>;

    /// Recent per-slot prioritization fees (micro-lamports per CU) touching `accounts`
    async fn recent_prioritization_fees(&self, accounts: &[Pubkey]) -> LedgerResult<Vec<u64>>;

    /// Push updates of an account's data
    async fn watch_account(&self, address: &Pubkey) -> LedgerResult<AccountWatch>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durability_ordering() {
        assert!(Durability::Confirmed.satisfied_by(Durability::Finalized));
        assert!(Durability::Confirmed.satisfied_by(Durability::Confirmed));
        assert!(!Durability::Confirmed.satisfied_by(Durability::Processed));
        assert!(Durability::Processed.satisfied_by(Durability::Processed));
    }

    #[test]
    fn test_reduced_visibility_options() {
        let opts = SendOptions::reduced_visibility();
        assert!(opts.skip_preflight);
        assert_eq!(opts.preflight_durability, Durability::Processed);
        assert_eq!(opts.max_node_retries, Some(0));
        assert!(!SendOptions::default().skip_preflight);
    }

    #[test]
    fn test_durability_serde() {
        let d: Durability = serde_json::from_str("\"finalized\"").unwrap();
        assert_eq!(d, Durability::Finalized);
        assert_eq!(Durability::default(), Durability::Confirmed);
    }
}
