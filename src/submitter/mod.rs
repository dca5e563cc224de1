//! Conflict-retrying submitter

pub mod attempt;
pub mod conflict_retry;
pub mod retry;

pub use attempt::{AttemptOutcome, SubmissionAttempt};
pub use conflict_retry::{
    ConflictRetryingSubmitter, SubmissionReceipt, SubmitOptions, TrailingRequest,
};
pub use retry::RetryConfig;
