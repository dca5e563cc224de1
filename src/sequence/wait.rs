//! Bounded-wait primitive
//!
//! Re-runs a probe at a fixed interval until it reports ready or the deadline
//! passes. An optional watch channel wakes the loop early so a push
//! notification source can replace pure polling without changing the
//! caller-visible contract (a value, or `Timeout`).

use crate::errors::{ContinuumError, ContinuumResult};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, timeout_at, Instant};

/// Result of a single probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    Ready(T),
    /// Not ready yet; `observed` is kept for the timeout diagnostic
    Pending { observed: Option<u64> },
}

/// Polling loop with a hard deadline
#[derive(Debug)]
pub struct BoundedWait {
    operation: &'static str,
    interval: Duration,
    timeout: Duration,
    target: Option<u64>,
    wakeup: Option<watch::Receiver<Option<u64>>>,
}

impl BoundedWait {
    pub fn new(operation: &'static str, interval: Duration, timeout: Duration) -> Self {
        Self {
            operation,
            interval,
            timeout,
            target: None,
            wakeup: None,
        }
    }

    /// Ordinal the wait is aiming for, reported on timeout
    pub fn target(mut self, target: u64) -> Self {
        self.target = Some(target);
        self
    }

    /// Wake the loop whenever the channel changes
    pub fn with_wakeup(mut self, wakeup: watch::Receiver<Option<u64>>) -> Self {
        self.wakeup = Some(wakeup);
        self
    }

    pub async fn run<T, F, Fut>(mut self, mut probe: F) -> ContinuumResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ContinuumResult<Probe<T>>>,
    {
        let start = Instant::now();
        let deadline = start + self.timeout;
        let mut last_observed = None;

        loop {
            let step = match timeout_at(deadline, probe()).await {
                Ok(step) => step?,
                Err(_) => return Err(self.elapsed(start, last_observed)),
            };

            match step {
                Probe::Ready(value) => return Ok(value),
                Probe::Pending { observed } => {
                    if observed.is_some() {
                        last_observed = observed;
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.elapsed(start, last_observed));
            }
            let nap = self.interval.min(deadline - now);

            let mut wakeup_closed = false;
            match self.wakeup.as_mut() {
                Some(rx) => {
                    tokio::select! {
                        _ = sleep(nap) => {}
                        changed = rx.changed() => wakeup_closed = changed.is_err(),
                    }
                }
                None => sleep(nap).await,
            }
            if wakeup_closed {
                self.wakeup = None;
            }
        }
    }

    fn elapsed(&self, start: Instant, last_observed: Option<u64>) -> ContinuumError {
        ContinuumError::wait_timeout(self.operation, start.elapsed(), self.target, last_observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_polls() {
        let calls = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&calls);
        let result = BoundedWait::new("test", Duration::from_millis(100), Duration::from_secs(5))
            .run(|| {
                let c = Arc::clone(&c);
                async move {
                    let n = c.fetch_add(1, Ordering::SeqCst);
                    if n >= 3 {
                        Ok(Probe::Ready(n))
                    } else {
                        Ok(Probe::Pending { observed: Some(n) })
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_target_and_last_observed() {
        let err = BoundedWait::new("wait_for_turn", Duration::from_millis(100), Duration::from_secs(30))
            .target(10)
            .run(|| async { Ok::<_, ContinuumError>(Probe::<()>::Pending { observed: Some(8) }) })
            .await
            .unwrap_err();

        match err {
            ContinuumError::Timeout {
                operation,
                target,
                last_observed,
                elapsed_ms,
            } => {
                assert_eq!(operation, "wait_for_turn");
                assert_eq!(target, Some(10));
                assert_eq!(last_observed, Some(8));
                assert!(elapsed_ms >= 30_000);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_error_propagates() {
        let err = BoundedWait::new("test", Duration::from_millis(100), Duration::from_secs(1))
            .run(|| async { Err::<Probe<()>, _>(ContinuumError::Transport("down".into())) })
            .await
            .unwrap_err();
        assert_eq!(err, ContinuumError::Transport("down".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wakeup_shortens_wait() {
        let (tx, rx) = watch::channel(None::<u64>);
        let polls = Arc::new(AtomicU64::new(0));
        let p = Arc::clone(&polls);
        let shared = Arc::new(AtomicU64::new(0));
        let s = Arc::clone(&shared);

        let waiter = tokio::spawn(async move {
            BoundedWait::new("test", Duration::from_secs(10), Duration::from_secs(60))
                .with_wakeup(rx)
                .run(|| {
                    let p = Arc::clone(&p);
                    let s = Arc::clone(&s);
                    async move {
                        p.fetch_add(1, Ordering::SeqCst);
                        if s.load(Ordering::SeqCst) == 1 {
                            Ok(Probe::Ready(()))
                        } else {
                            Ok(Probe::Pending { observed: None })
                        }
                    }
                })
                .await
        });

        tokio::task::yield_now().await;
        shared.store(1, Ordering::SeqCst);
        tx.send(Some(1)).unwrap();

        let start = Instant::now();
        waiter.await.unwrap().unwrap();
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(polls.load(Ordering::SeqCst) <= 2);
    }
}
