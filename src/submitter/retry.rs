use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry and confirmation bounds for the submitter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Network attempts per submission, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed wait before rebuilding after an ordinal conflict
    #[serde(default = "default_conflict_backoff_ms")]
    pub conflict_backoff_ms: u64,

    /// Jitter factor (0.0 to 1.0) applied to the conflict backoff
    #[serde(default)]
    pub jitter_factor: f64,

    /// Bound on re-reading the counter after a conflict
    #[serde(default = "default_rebuild_timeout_ms")]
    pub rebuild_timeout_ms: u64,

    #[serde(default = "default_confirm_poll_interval_ms")]
    pub confirm_poll_interval_ms: u64,

    #[serde(default = "default_confirm_timeout_ms")]
    pub confirm_timeout_ms: u64,
}

fn default_max_attempts() -> u32 { 3 }
fn default_conflict_backoff_ms() -> u64 { 1_000 }
fn default_rebuild_timeout_ms() -> u64 { 5_000 }
fn default_confirm_poll_interval_ms() -> u64 { 400 }
fn default_confirm_timeout_ms() -> u64 { 60_000 }

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            conflict_backoff_ms: default_conflict_backoff_ms(),
            jitter_factor: 0.0,
            rebuild_timeout_ms: default_rebuild_timeout_ms(),
            confirm_poll_interval_ms: default_confirm_poll_interval_ms(),
            confirm_timeout_ms: default_confirm_timeout_ms(),
        }
    }
}

impl RetryConfig {
    pub fn conflict_backoff(&self) -> Duration {
        let base = self.conflict_backoff_ms as f64;
        if self.jitter_factor <= 0.0 {
            return Duration::from_millis(self.conflict_backoff_ms);
        }
        let jitter_range = base * self.jitter_factor.min(1.0);
        let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        Duration::from_millis((base + jitter).max(0.0) as u64)
    }

    pub fn rebuild_timeout(&self) -> Duration {
        Duration::from_millis(self.rebuild_timeout_ms)
    }

    pub fn confirm_poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirm_poll_interval_ms)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }
}
