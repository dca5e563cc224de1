//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub submission_attempts: IntCounter,
    pub submissions_accepted: IntCounter,
    pub ordinal_conflicts: IntCounter,
    pub stale_references: IntCounter,
    pub fatal_failures: IntCounterVec,
    pub retry_budget_exhausted: IntCounter,
    pub turn_wait_timeouts: IntCounter,
    pub priority_fee_fallbacks: IntCounter,

    // Gauges
    pub observed_ordinal: IntGauge,
    pub active_subscriptions: IntGauge,

    // Histograms
    pub confirmation_latency: Histogram,
    pub intent_latency: Histogram,
    pub schedule_delay: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let submission_attempts = IntCounter::with_opts(Opts::new(
            "continuum_submission_attempts_total",
            "Signed requests that reached the network",
        ))?;

        let submissions_accepted = IntCounter::with_opts(Opts::new(
            "continuum_submissions_accepted_total",
            "Requests accepted by the ordering program",
        ))?;

        let ordinal_conflicts = IntCounter::with_opts(Opts::new(
            "continuum_ordinal_conflicts_total",
            "Requests rejected because their ordinal was already taken",
        ))?;

        let stale_references = IntCounter::with_opts(Opts::new(
            "continuum_stale_references_total",
            "Requests whose blockhash expired before inclusion",
        ))?;

        let fatal_failures = IntCounterVec::new(
            Opts::new(
                "continuum_fatal_failures_total",
                "Non-retryable failures by category",
            ),
            &["category"],
        )?;

        let retry_budget_exhausted = IntCounter::with_opts(Opts::new(
            "continuum_retry_budget_exhausted_total",
            "Intents that ran out of retry budget",
        ))?;

        let turn_wait_timeouts = IntCounter::with_opts(Opts::new(
            "continuum_turn_wait_timeouts_total",
            "wait_for_turn calls that timed out",
        ))?;

        let priority_fee_fallbacks = IntCounter::with_opts(Opts::new(
            "continuum_priority_fee_fallbacks_total",
            "Priority fee estimates that fell back to the fixed value",
        ))?;

        let observed_ordinal = IntGauge::with_opts(Opts::new(
            "continuum_observed_ordinal",
            "Last counter value observed by this process (informational)",
        ))?;

        let active_subscriptions = IntGauge::with_opts(Opts::new(
            "continuum_active_subscriptions",
            "Open counter change subscriptions",
        ))?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "continuum_confirmation_latency_seconds",
                "Send to confirmation latency",
            )
            .buckets(vec![0.2, 0.4, 0.8, 1.6, 3.2, 6.4, 12.8, 30.0]),
        )?;

        let intent_latency = Histogram::with_opts(
            HistogramOpts::new(
                "continuum_intent_latency_seconds",
                "End-to-end latency of submit_intent_with_retry",
            )
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        )?;

        let schedule_delay = Histogram::with_opts(
            HistogramOpts::new(
                "continuum_schedule_delay_seconds",
                "Pre-submission delay applied by the timing scheduler",
            )
            .buckets(vec![0.0, 0.4, 0.8, 1.6, 3.2, 6.4]),
        )?;

        // Register all metrics
        registry.register(Box::new(submission_attempts.clone()))?;
        registry.register(Box::new(submissions_accepted.clone()))?;
        registry.register(Box::new(ordinal_conflicts.clone()))?;
        registry.register(Box::new(stale_references.clone()))?;
        registry.register(Box::new(fatal_failures.clone()))?;
        registry.register(Box::new(retry_budget_exhausted.clone()))?;
        registry.register(Box::new(turn_wait_timeouts.clone()))?;
        registry.register(Box::new(priority_fee_fallbacks.clone()))?;
        registry.register(Box::new(observed_ordinal.clone()))?;
        registry.register(Box::new(active_subscriptions.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;
        registry.register(Box::new(intent_latency.clone()))?;
        registry.register(Box::new(schedule_delay.clone()))?;

        Ok(Self {
            registry,
            submission_attempts,
            submissions_accepted,
            ordinal_conflicts,
            stale_references,
            fatal_failures,
            retry_budget_exhausted,
            turn_wait_timeouts,
            priority_fee_fallbacks,
            observed_ordinal,
            active_subscriptions,
            confirmation_latency,
            intent_latency,
            schedule_delay,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            tracing::warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8(buf).unwrap_or_default()
    }

    /// Record a non-retryable failure under its category label
    pub fn record_fatal(&self, category: &str) {
        self.fatal_failures.with_label_values(&[category]).inc();
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_registered_metrics() {
        let m = Metrics::new().unwrap();
        m.submission_attempts.inc();
        m.record_fatal("authorization");
        let text = m.render();
        assert!(text.contains("continuum_submission_attempts_total 1"));
        assert!(text.contains("category=\"authorization\""));
    }

    #[test]
    fn test_timer_monotonic() {
        let t = Timer::new();
        assert!(t.elapsed_secs() >= 0.0);
    }
}
