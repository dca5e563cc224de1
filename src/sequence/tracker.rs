//! Sequence tracker
//!
//! Reads the remote counter, computes the next claimable ordinal, blocks a
//! caller until its turn, and fans out push notifications of counter changes.
//! The last observed ordinal is cached for health reporting only; every
//! decision re-reads the ledger.

use super::counter::SequenceState;
use super::wait::{BoundedWait, Probe};
use crate::errors::{ContinuumError, ContinuumResult};
use crate::ledger::{LedgerError, LedgerRpc};
use crate::metrics::metrics;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

/// When a waiting caller counts as "at its turn"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TurnPolicy {
    /// Ready only when `current == target - 1`; a counter already at or past
    /// the target fails fast with `OrdinalConflict`
    #[default]
    Exact,
    /// Ready when `current >= target - 1` (admits the instant after the turn)
    Lookahead,
}

/// Sequence tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,

    #[serde(default)]
    pub turn_policy: TurnPolicy,
}

fn default_poll_interval_ms() -> u64 { 100 }
fn default_wait_timeout_ms() -> u64 { 30_000 }

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            wait_timeout_ms: default_wait_timeout_ms(),
            turn_policy: TurnPolicy::default(),
        }
    }
}

impl TrackerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

/// Handle returned by [`SequenceTracker::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

/// Tracks the remote ordering counter
pub struct SequenceTracker {
    ledger: Arc<dyn LedgerRpc>,
    counter: Pubkey,
    config: TrackerConfig,
    observed: watch::Sender<Option<u64>>,
    subscriptions: DashMap<SubscriptionHandle, JoinHandle<()>>,
    next_subscription: AtomicU64,
}

impl SequenceTracker {
    pub fn new(ledger: Arc<dyn LedgerRpc>, counter: Pubkey, config: TrackerConfig) -> Self {
        let (observed, _) = watch::channel(None);
        Self {
            ledger,
            counter,
            config,
            observed,
            subscriptions: DashMap::new(),
            next_subscription: AtomicU64::new(1),
        }
    }

    pub fn counter_address(&self) -> Pubkey {
        self.counter
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Last ordinal this process observed; informational only
    pub fn last_observed(&self) -> Option<u64> {
        *self.observed.borrow()
    }

    /// Read the counter state; an absent counter is ordinal 0, not an error
    pub async fn fetch_state(&self) -> ContinuumResult<SequenceState> {
        let data = self
            .ledger
            .account_data(&self.counter)
            .await
            .map_err(|e| read_error(&self.counter, e))?;
        let state = SequenceState::decode(data.as_deref())?;
        self.record_observed(state.ordinal);
        Ok(state)
    }

    pub async fn fetch_current(&self) -> ContinuumResult<u64> {
        Ok(self.fetch_state().await?.ordinal)
    }

    /// `fetch_current() + 1`; returns 1 for a counter that does not exist yet
    pub async fn compute_next(&self) -> ContinuumResult<u64> {
        let current = self.fetch_current().await?;
        current
            .checked_add(1)
            .ok_or_else(|| ContinuumError::Decode("counter at u64::MAX".to_string()))
    }

    /// Block until the counter reaches the caller's turn for `target`
    ///
    /// Returns the counter value that satisfied the turn policy.
    #[instrument(skip(self), fields(counter = %self.counter, policy = ?self.config.turn_policy))]
    pub async fn wait_for_turn(&self, target: u64, timeout: Duration) -> ContinuumResult<u64> {
        if target == 0 {
            return Err(ContinuumError::Configuration(
                "target ordinal must be at least 1".to_string(),
            ));
        }
        let policy = self.config.turn_policy;
        let predecessor = target - 1;

        let result = BoundedWait::new("wait_for_turn", self.config.poll_interval(), timeout)
            .target(target)
            .with_wakeup(self.observed.subscribe())
            .run(|| async move {
                let current = self.fetch_current().await?;
                match policy {
                    TurnPolicy::Exact if current == predecessor => Ok(Probe::Ready(current)),
                    TurnPolicy::Exact if current >= target => Err(ContinuumError::OrdinalConflict {
                        claimed: target,
                        observed: Some(current),
                        logs: Vec::new(),
                    }),
                    TurnPolicy::Lookahead if current >= predecessor => Ok(Probe::Ready(current)),
                    _ => Ok(Probe::Pending {
                        observed: Some(current),
                    }),
                }
            })
            .await;

        match &result {
            Ok(current) => debug!(target, current, "Turn reached"),
            Err(e @ ContinuumError::Timeout { .. }) => {
                metrics().turn_wait_timeouts.inc();
                warn!(target, error = %e, "Timed out waiting for turn");
            }
            Err(e) => debug!(target, error = %e, "Turn wait ended"),
        }
        result
    }

    /// Next claimable ordinal strictly greater than `failed`
    ///
    /// Used after an ordinal conflict: a lagging RPC read may still report the
    /// pre-conflict counter, so keep re-reading until the ledger catches up.
    pub async fn next_after(&self, failed: u64, timeout: Duration) -> ContinuumResult<u64> {
        BoundedWait::new("next_after_conflict", self.config.poll_interval(), timeout)
            .target(failed + 1)
            .with_wakeup(self.observed.subscribe())
            .run(|| async move {
                let next = self.compute_next().await?;
                if next > failed {
                    Ok(Probe::Ready(next))
                } else {
                    Ok(Probe::Pending {
                        observed: Some(next - 1),
                    })
                }
            })
            .await
    }

    /// Register a callback fired whenever the remote counter value changes
    ///
    /// Notifications are for observability; submission always re-reads.
    pub async fn subscribe<F>(&self, callback: F) -> ContinuumResult<SubscriptionHandle>
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        let mut watch = self
            .ledger
            .watch_account(&self.counter)
            .await
            .map_err(|e| read_error(&self.counter, e))?;

        let observed = self.observed.clone();
        let counter = self.counter;
        let mut last = self.last_observed();

        let task = tokio::spawn(async move {
            while let Some(data) = watch.updates.recv().await {
                let ordinal = match SequenceState::decode(Some(&data)) {
                    Ok(state) => state.ordinal,
                    Err(e) => {
                        warn!(counter = %counter, error = %e, "Ignoring undecodable counter update");
                        continue;
                    }
                };
                if last == Some(ordinal) {
                    continue;
                }
                last = Some(ordinal);
                publish_observed(&observed, ordinal);
                callback(ordinal);
            }
            debug!(counter = %counter, "Counter subscription feed closed");
        });

        let handle = SubscriptionHandle(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.insert(handle, task);
        metrics().active_subscriptions.inc();
        debug!(counter = %self.counter, handle = handle.0, "Counter subscription opened");
        Ok(handle)
    }

    /// Cancel a subscription; returns `false` for an unknown handle
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        match self.subscriptions.remove(&handle) {
            Some((_, task)) => {
                task.abort();
                metrics().active_subscriptions.dec();
                debug!(counter = %self.counter, handle = handle.0, "Counter subscription closed");
                true
            }
            None => false,
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn record_observed(&self, ordinal: u64) {
        publish_observed(&self.observed, ordinal);
    }
}

impl Drop for SequenceTracker {
    fn drop(&mut self) {
        for entry in self.subscriptions.iter() {
            entry.value().abort();
        }
    }
}

fn publish_observed(observed: &watch::Sender<Option<u64>>, ordinal: u64) {
    let changed = observed.send_if_modified(|slot| {
        if *slot == Some(ordinal) {
            false
        } else {
            *slot = Some(ordinal);
            true
        }
    });
    if changed {
        metrics().observed_ordinal.set(ordinal as i64);
    }
}

fn read_error(counter: &Pubkey, err: LedgerError) -> ContinuumError {
    match err {
        LedgerError::Timeout {
            operation,
            timeout_ms,
        } => ContinuumError::Timeout {
            operation,
            elapsed_ms: timeout_ms,
            target: None,
            last_observed: None,
        },
        other => ContinuumError::Transport(format!("reading counter {counter}: {other}")),
    }
}
