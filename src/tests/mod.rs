//! Cross-module scenarios run against the in-memory ledger

mod config_validation;

use crate::composer::route::{sample_entry, RouteConfig};
use crate::composer::{RequestComposer, SwapIntent};
use crate::sequence::{SequenceTracker, TrackerConfig};
use crate::submitter::{ConflictRetryingSubmitter, RetryConfig};
use crate::test_utils::MockLedger;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::sync::Arc;

/// One caller: its own tracker and submitter over a shared ledger
pub(crate) struct Caller {
    pub submitter: ConflictRetryingSubmitter,
    pub credential: Keypair,
    pub intent: SwapIntent,
}

pub(crate) fn caller(ledger: &Arc<MockLedger>, retry: RetryConfig) -> Caller {
    let composer = RequestComposer::new(ledger.program_ids());
    let tracker = Arc::new(SequenceTracker::new(
        ledger.clone(),
        composer.counter_address(),
        TrackerConfig::default(),
    ));
    let submitter = ConflictRetryingSubmitter::new(ledger.clone(), tracker, composer, retry);
    let credential = Keypair::new();
    let intent = SwapIntent::new(
        RouteConfig::try_from(&sample_entry("sol-usdc")).unwrap(),
        credential.pubkey(),
        Pubkey::new_unique(),
        Pubkey::new_unique(),
        1_000,
        900,
    )
    .unwrap();
    Caller {
        submitter,
        credential,
        intent,
    }
}
