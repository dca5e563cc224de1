//! Integration tests for the timing scheduler
//!
//! This test validates:
//! - Target slot estimation per priority tier
//! - Delayed submission with reduced visibility and an estimated fee
//! - Conflicts surfacing from a scheduled request
//! - The trailing revoke following the scheduled request

use continuum_client::composer::route::sample_entry;
use continuum_client::composer::{ComposedRequest, RouteConfig};
use continuum_client::ledger::SendOptions;
use continuum_client::scheduler::SchedulerConfig;
use continuum_client::sequence::TrackerConfig;
use continuum_client::submitter::{RetryConfig, TrailingRequest};
use continuum_client::test_utils::MockLedger;
use continuum_client::{
    ConflictRetryingSubmitter, ContinuumError, PriorityTier, RequestComposer, SequenceTracker,
    SwapIntent, TimingScheduler,
};
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

struct Harness {
    ledger: Arc<MockLedger>,
    scheduler: TimingScheduler,
    submitter: Arc<ConflictRetryingSubmitter>,
    credential: Keypair,
}

fn harness(counter: u64, config: SchedulerConfig) -> Harness {
    let ledger = Arc::new(MockLedger::with_counter(counter));
    let composer = RequestComposer::new(ledger.program_ids());
    let tracker = Arc::new(SequenceTracker::new(
        ledger.clone(),
        composer.counter_address(),
        TrackerConfig::default(),
    ));
    let submitter = Arc::new(ConflictRetryingSubmitter::new(
        ledger.clone(),
        tracker,
        composer,
        RetryConfig::default(),
    ));
    let scheduler = TimingScheduler::new(ledger.clone(), submitter.clone(), config);
    Harness {
        ledger,
        scheduler,
        submitter,
        credential: Keypair::new(),
    }
}

async fn next_request(h: &Harness) -> ComposedRequest {
    let intent = SwapIntent::new(
        RouteConfig::try_from(&sample_entry("sol-usdc")).unwrap(),
        h.credential.pubkey(),
        Pubkey::new_unique(),
        Pubkey::new_unique(),
        2_500,
        2_000,
    )
    .unwrap();
    let ordinal = h.submitter.tracker().compute_next().await.unwrap();
    h.submitter.composer().compose(&intent, ordinal).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_low_tier_waits_four_slots() {
    let h = harness(0, SchedulerConfig::default());
    h.ledger.set_slot(5_000);
    h.ledger.set_prioritization_fees(vec![10, 20, 30]);

    let request = next_request(&h).await;
    let target = h.scheduler.estimate_target_slot(PriorityTier::Low).await.unwrap();
    assert_eq!(target, 5_004);

    let start = Instant::now();
    let receipt = h
        .scheduler
        .schedule_transaction(&request, target, &h.credential)
        .await
        .unwrap();
    assert!(start.elapsed() >= Duration::from_millis(1_600));
    assert_eq!(receipt.ordinal, 1);
    assert_eq!(h.ledger.last_send_options(), Some(SendOptions::reduced_visibility()));
    assert_eq!(h.ledger.last_compute_unit_price(), Some(30));
}

#[tokio::test(start_paused = true)]
async fn test_delay_capped_by_max_delay() {
    let h = harness(
        0,
        SchedulerConfig {
            max_delay_ms: 800,
            ..SchedulerConfig::default()
        },
    );
    h.ledger.set_slot(10);

    let request = next_request(&h).await;
    let start = Instant::now();
    h.scheduler
        .schedule_transaction(&request, 1_000, &h.credential)
        .await
        .unwrap();
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(800));
    assert!(elapsed < Duration::from_millis(2_000));
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_request_reports_conflict() {
    let h = harness(3, SchedulerConfig::default());
    let request = next_request(&h).await;
    h.ledger.advance_before_next_send(1);

    let target = h.scheduler.estimate_target_slot(PriorityTier::High).await.unwrap();
    let err = h
        .scheduler
        .schedule_transaction(&request, target, &h.credential)
        .await
        .unwrap_err();
    assert!(matches!(err, ContinuumError::OrdinalConflict { claimed: 4, .. }));
    assert_eq!(h.ledger.counter(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_explicit_trailing_request() {
    let h = harness(0, SchedulerConfig::default());
    let request = next_request(&h).await;
    let trailing = TrailingRequest::revoke(&spl_token::id(), &request.source, &request.owner).unwrap();

    let receipt = h
        .scheduler
        .schedule_with_trailing(&request, 0, &h.credential, Some(trailing))
        .await
        .unwrap();
    assert!(receipt.trailing_signature.is_some());
    assert_eq!(h.ledger.send_count(), 2);
    assert_eq!(h.ledger.accepted(), vec![1]);
}
