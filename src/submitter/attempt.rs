//! Record of one network attempt

use crate::errors::ContinuumError;
use crate::observability::CorrelationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How an attempt ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AttemptOutcome {
    Accepted { slot: u64 },
    OrdinalConflict,
    StaleReference,
    Failed { category: String, reason: String },
}

impl AttemptOutcome {
    pub fn from_error(err: &ContinuumError) -> Self {
        match err {
            ContinuumError::OrdinalConflict { .. } => Self::OrdinalConflict,
            ContinuumError::StaleTransportReference(_) => Self::StaleReference,
            other => Self::Failed {
                category: other.category().to_string(),
                reason: other.to_string(),
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::OrdinalConflict => "ordinal_conflict",
            Self::StaleReference => "stale_reference",
            Self::Failed { .. } => "failed",
        }
    }
}

/// One signed request that reached the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionAttempt {
    pub id: Uuid,
    pub correlation_id: CorrelationId,
    /// 1-based attempt number within the correlation
    pub attempt: u32,
    pub ordinal: u64,
    pub signature: Option<String>,
    pub outcome: AttemptOutcome,
    pub logs: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

impl SubmissionAttempt {
    pub fn new(
        correlation_id: CorrelationId,
        attempt: u32,
        ordinal: u64,
        signature: Option<String>,
        outcome: AttemptOutcome,
        logs: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            correlation_id,
            attempt,
            ordinal,
            signature,
            outcome,
            logs,
            recorded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_error() {
        let conflict = ContinuumError::OrdinalConflict {
            claimed: 3,
            observed: None,
            logs: vec![],
        };
        assert_eq!(AttemptOutcome::from_error(&conflict), AttemptOutcome::OrdinalConflict);

        let fatal = ContinuumError::AuthorizationFailure {
            reason: "owner mismatch".into(),
            logs: vec![],
        };
        match AttemptOutcome::from_error(&fatal) {
            AttemptOutcome::Failed { category, .. } => assert_eq!(category, "authorization"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_attempt_serializes_outcome_tag() {
        let attempt = SubmissionAttempt::new(
            CorrelationId::new(),
            1,
            9,
            None,
            AttemptOutcome::Accepted { slot: 77 },
            vec![],
        );
        let json = serde_json::to_string(&attempt).unwrap();
        assert!(json.contains(r#""kind":"accepted""#));
        let back: SubmissionAttempt = serde_json::from_str(&json).unwrap();
        assert_eq!(back, attempt);
    }
}
