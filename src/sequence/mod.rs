//! Remote ordering counter: layout, bounded waits and the sequence tracker

pub mod counter;
pub mod tracker;
pub mod wait;

pub use counter::{SequenceState, COUNTER_ACCOUNT_LEN};
pub use tracker::{SequenceTracker, SubscriptionHandle, TrackerConfig, TurnPolicy};
pub use wait::{BoundedWait, Probe};
