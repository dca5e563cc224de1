//! Correlation for multi-attempt submissions

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation ID shared by every attempt made for one intent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trace of one logical submission across its retry loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptTrace {
    pub correlation_id: CorrelationId,
    pub operation: String,
    /// Attempts that reached the network so far
    pub attempts: u32,
    /// Ordinals claimed, in order
    pub ordinals: Vec<u64>,
}

impl AttemptTrace {
    pub fn new(operation: &str) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            operation: operation.to_string(),
            attempts: 0,
            ordinals: Vec::new(),
        }
    }

    /// Register a new attempt at `ordinal`; returns its 1-based number
    pub fn begin_attempt(&mut self, ordinal: u64) -> u32 {
        self.attempts += 1;
        if self.ordinals.last() != Some(&ordinal) {
            self.ordinals.push(ordinal);
        }
        self.attempts
    }

    /// Tracing span carrying the correlation id
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "submission",
            correlation_id = %self.correlation_id,
            operation = %self.operation,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempts_and_ordinals() {
        let mut trace = AttemptTrace::new("submit_intent_with_retry");
        assert_eq!(trace.begin_attempt(5), 1);
        assert_eq!(trace.begin_attempt(5), 2);
        assert_eq!(trace.begin_attempt(6), 3);
        assert_eq!(trace.ordinals, vec![5, 6]);
    }

    #[test]
    fn test_correlation_ids_unique() {
        assert_ne!(AttemptTrace::new("a").correlation_id, AttemptTrace::new("a").correlation_id);
    }
}
