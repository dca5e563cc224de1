//! Continuum - client protocol for the FIFO ordering program
//!
//! Callers claim a strictly increasing ordinal from a shared on-chain counter
//! and submit swaps through the ordering program, which accepts a request only
//! when its ordinal equals `counter + 1`. The crate is split along the flow of
//! one submission:
//!
//! - [`sequence`]: reads the counter, waits for a turn, streams updates
//! - [`composer`]: turns an intent plus an ordinal into the instruction pair
//! - [`submitter`]: signs, sends and confirms, recomposing after conflicts
//! - [`scheduler`]: delays a request to a target slot and sends it with
//!   reduced visibility

pub mod composer;
pub mod config;
pub mod endpoints;
pub mod errors;
pub mod journal;
pub mod ledger;
pub mod metrics;
pub mod observability;
pub mod scheduler;
pub mod sequence;
pub mod submitter;
pub mod wallet;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

#[cfg(test)]
mod tests;

pub use composer::{ComposedRequest, RequestComposer, SwapIntent};
pub use config::ClientConfig;
pub use errors::{ContinuumError, ContinuumResult};
pub use ledger::{LedgerRpc, SolanaLedger};
pub use scheduler::{PriorityTier, TimingScheduler};
pub use sequence::{SequenceTracker, TurnPolicy};
pub use submitter::{ConflictRetryingSubmitter, SubmissionReceipt};

// Re-export commonly used types
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
