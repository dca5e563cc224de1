//! Timing scheduler
//!
//! Delays a composed request until an estimated target slot, then hands it to
//! the submitter with reduced-visibility transmission so it is observable for
//! as short a time as possible before inclusion.

pub mod fees;
pub mod priority;

pub use fees::{estimate_priority_fee, percentile};
pub use priority::{PriorityTier, SLOT_OFFSETS};

use crate::composer::ComposedRequest;
use crate::errors::{ContinuumError, ContinuumResult};
use crate::ledger::{LedgerError, LedgerRpc};
use crate::metrics::metrics;
use crate::submitter::{ConflictRetryingSubmitter, SubmissionReceipt, SubmitOptions, TrailingRequest};
use serde::{Deserialize, Serialize};
use solana_sdk::signature::Keypair;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Timing scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Assumed wall-clock length of one slot
    #[serde(default = "default_slot_duration_ms")]
    pub slot_duration_ms: u64,

    /// Upper bound on the pre-submission delay
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Micro-lamports per CU when fee estimation fails
    #[serde(default = "default_fallback_priority_fee")]
    pub fallback_priority_fee: u64,

    #[serde(default = "default_fee_percentile")]
    pub fee_percentile: u8,

    #[serde(default)]
    pub compute_unit_limit: Option<u32>,
}

fn default_slot_duration_ms() -> u64 { 400 }
fn default_max_delay_ms() -> u64 { 5_000 }
fn default_fallback_priority_fee() -> u64 { 10_000 }
fn default_fee_percentile() -> u8 { 90 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            slot_duration_ms: default_slot_duration_ms(),
            max_delay_ms: default_max_delay_ms(),
            fallback_priority_fee: default_fallback_priority_fee(),
            fee_percentile: default_fee_percentile(),
            compute_unit_limit: None,
        }
    }
}

pub struct TimingScheduler {
    ledger: Arc<dyn LedgerRpc>,
    submitter: Arc<ConflictRetryingSubmitter>,
    config: SchedulerConfig,
}

impl TimingScheduler {
    pub fn new(
        ledger: Arc<dyn LedgerRpc>,
        submitter: Arc<ConflictRetryingSubmitter>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            ledger,
            submitter,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Current ledger slot plus the tier's offset
    pub async fn estimate_target_slot(&self, tier: PriorityTier) -> ContinuumResult<u64> {
        let current = self.current_slot().await?;
        let target = current.saturating_add(tier.slot_offset());
        debug!(%tier, current, target, "Estimated target slot");
        Ok(target)
    }

    /// Wait for `target_slot`, then submit with reduced visibility
    #[instrument(skip_all, fields(ordinal = request.ordinal, target_slot = target_slot))]
    pub async fn schedule_transaction(
        &self,
        request: &ComposedRequest,
        target_slot: u64,
        credential: &Keypair,
    ) -> ContinuumResult<SubmissionReceipt> {
        let options = self.prepare(request, target_slot).await?;
        self.submitter
            .submit_with_options(request, credential, &options, None)
            .await
    }

    /// Like [`Self::schedule_transaction`], followed by a trailing request
    ///
    /// Without an explicit trailing request, a revoke of the source account's
    /// delegate is sent. The two are not guaranteed to land together.
    #[instrument(skip_all, fields(ordinal = request.ordinal, target_slot = target_slot))]
    pub async fn schedule_with_trailing(
        &self,
        request: &ComposedRequest,
        target_slot: u64,
        credential: &Keypair,
        trailing: Option<TrailingRequest>,
    ) -> ContinuumResult<SubmissionReceipt> {
        let trailing = match trailing {
            Some(trailing) => trailing,
            None => TrailingRequest::revoke(
                &self.submitter.composer().program_ids().token,
                &request.source,
                &request.owner,
            )?,
        };
        let options = self.prepare(request, target_slot).await?;
        self.submitter
            .submit_with_options(request, credential, &options, Some(&trailing))
            .await
    }

    async fn prepare(&self, request: &ComposedRequest, target_slot: u64) -> ContinuumResult<SubmitOptions> {
        let accounts: Vec<_> = request
            .operation()
            .accounts
            .iter()
            .filter(|a| a.is_writable)
            .map(|a| a.pubkey)
            .collect();
        let fee = estimate_priority_fee(
            self.ledger.as_ref(),
            &accounts,
            self.config.fee_percentile,
            self.config.fallback_priority_fee,
        )
        .await;

        self.wait_for_slot(target_slot).await?;

        Ok(SubmitOptions {
            compute_unit_limit: self.config.compute_unit_limit,
            ..SubmitOptions::reduced_visibility(Some(fee))
        })
    }

    /// Sleep for the slots remaining until `target_slot`, bounded by `max_delay_ms`
    async fn wait_for_slot(&self, target_slot: u64) -> ContinuumResult<Duration> {
        let current = self.current_slot().await?;
        let slots = target_slot.saturating_sub(current);
        let delay = Duration::from_millis(slots.saturating_mul(self.config.slot_duration_ms))
            .min(Duration::from_millis(self.config.max_delay_ms));

        info!(current, target_slot, delay_ms = delay.as_millis() as u64, "Delaying submission");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        metrics().schedule_delay.observe(delay.as_secs_f64());
        Ok(delay)
    }

    async fn current_slot(&self) -> ContinuumResult<u64> {
        self.ledger.slot().await.map_err(|e| match e {
            LedgerError::Timeout {
                operation,
                timeout_ms,
            } => ContinuumError::Timeout {
                operation,
                elapsed_ms: timeout_ms,
                target: None,
                last_observed: None,
            },
            other => ContinuumError::Transport(format!("reading slot: {other}")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::route::{sample_entry, RouteConfig};
    use crate::composer::{RequestComposer, SwapIntent};
    use crate::ledger::SendOptions;
    use crate::sequence::{SequenceTracker, TrackerConfig};
    use crate::submitter::RetryConfig;
    use crate::test_utils::MockLedger;
    use solana_sdk::{pubkey::Pubkey, signer::Signer};

    fn scheduler(ledger: Arc<MockLedger>) -> TimingScheduler {
        let composer = RequestComposer::default();
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
        TimingScheduler::new(ledger, submitter, SchedulerConfig::default())
    }

    fn request(scheduler: &TimingScheduler, owner: &Keypair, ordinal: u64) -> ComposedRequest {
        let intent = SwapIntent::new(
            RouteConfig::try_from(&sample_entry("r")).unwrap(),
            owner.pubkey(),
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            50,
            1,
        )
        .unwrap();
        scheduler.submitter.composer().compose(&intent, ordinal).unwrap()
    }

    #[tokio::test]
    async fn test_target_slot_per_tier() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_slot(1_000);
        let scheduler = scheduler(ledger);

        assert_eq!(scheduler.estimate_target_slot(PriorityTier::High).await.unwrap(), 1_001);
        assert_eq!(scheduler.estimate_target_slot(PriorityTier::Medium).await.unwrap(), 1_002);
        assert_eq!(scheduler.estimate_target_slot(PriorityTier::Low).await.unwrap(), 1_004);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_is_slots_times_duration() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_slot(100);
        let scheduler = scheduler(ledger);

        assert_eq!(
            scheduler.wait_for_slot(103).await.unwrap(),
            Duration::from_millis(1_200)
        );
        assert_eq!(scheduler.wait_for_slot(90).await.unwrap(), Duration::ZERO);
        assert_eq!(
            scheduler.wait_for_slot(1_000).await.unwrap(),
            Duration::from_millis(5_000)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_uses_reduced_visibility_and_fee() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_prioritization_fees(vec![100, 200, 300, 400, 500, 600, 700, 800, 900, 1_000]);
        let scheduler = scheduler(ledger.clone());
        let owner = Keypair::new();
        let req = request(&scheduler, &owner, 1);

        let target = scheduler.estimate_target_slot(PriorityTier::Medium).await.unwrap();
        let receipt = scheduler.schedule_transaction(&req, target, &owner).await.unwrap();

        assert_eq!(receipt.ordinal, 1);
        assert_eq!(ledger.last_send_options(), Some(SendOptions::reduced_visibility()));
        assert_eq!(ledger.last_compute_unit_price(), Some(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fee_query_failure_falls_back() {
        let ledger = Arc::new(MockLedger::new());
        ledger.fail_prioritization_fees();
        let scheduler = scheduler(ledger.clone());
        let owner = Keypair::new();
        let req = request(&scheduler, &owner, 1);

        scheduler.schedule_transaction(&req, 0, &owner).await.unwrap();
        assert_eq!(ledger.last_compute_unit_price(), Some(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_trailing_revoke() {
        let ledger = Arc::new(MockLedger::new());
        let scheduler = scheduler(ledger.clone());
        let owner = Keypair::new();
        let req = request(&scheduler, &owner, 1);

        let receipt = scheduler
            .schedule_with_trailing(&req, 0, &owner, None)
            .await
            .unwrap();
        assert!(receipt.trailing_signature.is_some());
        assert_eq!(ledger.counter(), 1);
    }
}
