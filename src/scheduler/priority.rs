//! Priority tiers and their slot offsets

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
    Low,
    Medium,
    High,
}

/// Slots to wait past the current ledger position, per tier
///
/// Larger offsets delay longer and are more conservative.
pub const SLOT_OFFSETS: [(PriorityTier, u64); 3] = [
    (PriorityTier::High, 1),
    (PriorityTier::Medium, 2),
    (PriorityTier::Low, 4),
];

impl PriorityTier {
    pub fn slot_offset(self) -> u64 {
        SLOT_OFFSETS
            .iter()
            .find(|(tier, _)| *tier == self)
            .map(|(_, offset)| *offset)
            .unwrap_or(1)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PriorityTier::Low => "low",
            PriorityTier::Medium => "medium",
            PriorityTier::High => "high",
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriorityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(PriorityTier::Low),
            "medium" => Ok(PriorityTier::Medium),
            "high" => Ok(PriorityTier::High),
            other => Err(format!("unknown priority tier {other:?} (expected low, medium or high)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_grow_as_priority_drops() {
        assert!(PriorityTier::High.slot_offset() < PriorityTier::Medium.slot_offset());
        assert!(PriorityTier::Medium.slot_offset() < PriorityTier::Low.slot_offset());
    }

    #[test]
    fn test_parse() {
        assert_eq!("HIGH".parse::<PriorityTier>().unwrap(), PriorityTier::High);
        assert!("urgent".parse::<PriorityTier>().is_err());
    }
}
