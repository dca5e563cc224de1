//! On-ledger counter account layout
//!
//! ```text
//! byte 0       initialization flag
//! bytes 1..8   reserved
//! bytes 8..16  ordinal, u64 little-endian
//! bytes 16..48 admin identity
//! ```

use crate::errors::{ContinuumError, ContinuumResult};
use solana_sdk::pubkey::Pubkey;

pub const COUNTER_ACCOUNT_LEN: usize = 48;
const ORDINAL_OFFSET: usize = 8;
const ADMIN_OFFSET: usize = 16;

/// Decoded counter state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceState {
    pub ordinal: u64,
    /// `None` when the counter has not been created yet
    pub admin: Option<Pubkey>,
}

impl SequenceState {
    pub const ABSENT: SequenceState = SequenceState {
        ordinal: 0,
        admin: None,
    };

    pub fn is_created(&self) -> bool {
        self.admin.is_some()
    }

    /// Decode raw account data; `None` (account absent) and an unset
    /// initialization flag both mean ordinal 0
    pub fn decode(data: Option<&[u8]>) -> ContinuumResult<Self> {
        let Some(data) = data else {
            return Ok(Self::ABSENT);
        };
        if data.first().copied().unwrap_or(0) == 0 {
            return Ok(Self::ABSENT);
        }
        if data.len() < COUNTER_ACCOUNT_LEN {
            return Err(ContinuumError::Decode(format!(
                "counter account is {} bytes, expected at least {}",
                data.len(),
                COUNTER_ACCOUNT_LEN
            )));
        }

        let mut ordinal = [0u8; 8];
        ordinal.copy_from_slice(&data[ORDINAL_OFFSET..ADMIN_OFFSET]);
        let mut admin = [0u8; 32];
        admin.copy_from_slice(&data[ADMIN_OFFSET..COUNTER_ACCOUNT_LEN]);

        Ok(Self {
            ordinal: u64::from_le_bytes(ordinal),
            admin: Some(Pubkey::new_from_array(admin)),
        })
    }

    /// Encode into the on-ledger layout (used by tooling and the in-memory ledger)
    pub fn encode(&self) -> Vec<u8> {
        let mut data = vec![0u8; COUNTER_ACCOUNT_LEN];
        if let Some(admin) = self.admin {
            data[0] = 1;
            data[ORDINAL_OFFSET..ADMIN_OFFSET].copy_from_slice(&self.ordinal.to_le_bytes());
            data[ADMIN_OFFSET..COUNTER_ACCOUNT_LEN].copy_from_slice(admin.as_ref());
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_account_is_zero() {
        let state = SequenceState::decode(None).unwrap();
        assert_eq!(state.ordinal, 0);
        assert!(!state.is_created());
    }

    #[test]
    fn test_uninitialized_flag_is_zero() {
        let data = vec![0u8; COUNTER_ACCOUNT_LEN];
        assert_eq!(SequenceState::decode(Some(&data)).unwrap(), SequenceState::ABSENT);
    }

    #[test]
    fn test_decode_layout() {
        let admin = Pubkey::new_unique();
        let mut data = vec![0u8; COUNTER_ACCOUNT_LEN];
        data[0] = 1;
        data[8..16].copy_from_slice(&42u64.to_le_bytes());
        data[16..48].copy_from_slice(admin.as_ref());

        let state = SequenceState::decode(Some(&data)).unwrap();
        assert_eq!(state.ordinal, 42);
        assert_eq!(state.admin, Some(admin));
        assert_eq!(state.encode(), data);
    }

    #[test]
    fn test_truncated_account_is_decode_error() {
        let mut data = vec![0u8; 16];
        data[0] = 1;
        let err = SequenceState::decode(Some(&data)).unwrap_err();
        assert!(matches!(err, ContinuumError::Decode(_)));
    }
}
