//! Wire encoding of the operation instruction
//!
//! ```text
//! outer: selector[8] | ordinal u64 LE | inner_len u32 LE | inner
//! inner: operation_id u8 | amount_in u64 LE | minimum_amount_out u64 LE
//! ```

use crate::errors::{ContinuumError, ContinuumResult};

/// AMM v4 swap-base-in instruction tag
pub const SWAP_BASE_IN_OP: u8 = 9;
pub const INNER_PAYLOAD_LEN: usize = 17;
const OUTER_HEADER_LEN: usize = 20;

/// Venue exchange payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerPayload {
    pub operation_id: u8,
    pub amount_in: u64,
    pub minimum_amount_out: u64,
}

impl InnerPayload {
    pub fn swap_base_in(amount_in: u64, minimum_amount_out: u64) -> Self {
        Self {
            operation_id: SWAP_BASE_IN_OP,
            amount_in,
            minimum_amount_out,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(INNER_PAYLOAD_LEN);
        data.push(self.operation_id);
        data.extend_from_slice(&self.amount_in.to_le_bytes());
        data.extend_from_slice(&self.minimum_amount_out.to_le_bytes());
        data
    }

    pub fn decode(data: &[u8]) -> ContinuumResult<Self> {
        if data.len() != INNER_PAYLOAD_LEN {
            return Err(ContinuumError::Decode(format!(
                "inner payload is {} bytes, expected {}",
                data.len(),
                INNER_PAYLOAD_LEN
            )));
        }
        Ok(Self {
            operation_id: data[0],
            amount_in: read_u64(&data[1..9]),
            minimum_amount_out: read_u64(&data[9..17]),
        })
    }
}

/// Operation instruction data for the ordering program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationPayload {
    pub selector: [u8; 8],
    pub ordinal: u64,
    pub inner: Vec<u8>,
}

impl OperationPayload {
    pub fn encode(&self) -> ContinuumResult<Vec<u8>> {
        let inner_len = u32::try_from(self.inner.len())
            .map_err(|_| ContinuumError::Configuration("inner payload too large".to_string()))?;

        let mut data = Vec::with_capacity(OUTER_HEADER_LEN + self.inner.len());
        data.extend_from_slice(&self.selector);
        data.extend_from_slice(&self.ordinal.to_le_bytes());
        data.extend_from_slice(&inner_len.to_le_bytes());
        data.extend_from_slice(&self.inner);
        Ok(data)
    }

    pub fn decode(data: &[u8]) -> ContinuumResult<Self> {
        if data.len() < OUTER_HEADER_LEN {
            return Err(ContinuumError::Decode(format!(
                "operation payload is {} bytes, header needs {}",
                data.len(),
                OUTER_HEADER_LEN
            )));
        }
        let mut selector = [0u8; 8];
        selector.copy_from_slice(&data[..8]);
        let ordinal = read_u64(&data[8..16]);

        let mut len = [0u8; 4];
        len.copy_from_slice(&data[16..20]);
        let inner_len = u32::from_le_bytes(len) as usize;
        let inner = &data[OUTER_HEADER_LEN..];
        if inner.len() != inner_len {
            return Err(ContinuumError::Decode(format!(
                "inner length prefix {} does not match {} trailing bytes",
                inner_len,
                inner.len()
            )));
        }

        Ok(Self {
            selector,
            ordinal,
            inner: inner.to_vec(),
        })
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::addresses::SWAP_WITH_SEQ_SELECTOR;
    use proptest::prelude::*;

    #[test]
    fn test_inner_layout() {
        let data = InnerPayload::swap_base_in(100, 95).encode();
        assert_eq!(data.len(), INNER_PAYLOAD_LEN);
        assert_eq!(data[0], 9);
        assert_eq!(&data[1..9], &100u64.to_le_bytes());
        assert_eq!(&data[9..17], &95u64.to_le_bytes());
    }

    #[test]
    fn test_outer_layout() {
        let inner = InnerPayload::swap_base_in(100, 95).encode();
        let data = OperationPayload {
            selector: SWAP_WITH_SEQ_SELECTOR,
            ordinal: 7,
            inner: inner.clone(),
        }
        .encode()
        .unwrap();

        assert_eq!(&data[..8], &SWAP_WITH_SEQ_SELECTOR);
        assert_eq!(&data[8..16], &7u64.to_le_bytes());
        assert_eq!(&data[16..20], &17u32.to_le_bytes());
        assert_eq!(&data[20..], inner.as_slice());
    }

    #[test]
    fn test_length_prefix_mismatch_rejected() {
        let mut data = OperationPayload {
            selector: SWAP_WITH_SEQ_SELECTOR,
            ordinal: 1,
            inner: vec![1, 2, 3],
        }
        .encode()
        .unwrap();
        data.push(0);
        assert!(matches!(
            OperationPayload::decode(&data),
            Err(ContinuumError::Decode(_))
        ));
        assert!(OperationPayload::decode(&data[..10]).is_err());
    }

    proptest! {
        #[test]
        fn prop_ordinal_occupies_bytes_8_to_16(ordinal in any::<u64>(), amount in any::<u64>(), min_out in any::<u64>()) {
            let inner = InnerPayload::swap_base_in(amount, min_out).encode();
            let data = OperationPayload { selector: SWAP_WITH_SEQ_SELECTOR, ordinal, inner }
                .encode()
                .unwrap();
            prop_assert_eq!(data.len(), 20 + INNER_PAYLOAD_LEN);
            prop_assert_eq!(&data[8..16], &ordinal.to_le_bytes()[..]);

            let decoded = OperationPayload::decode(&data).unwrap();
            let inner = InnerPayload::decode(&decoded.inner).unwrap();
            prop_assert_eq!(inner.amount_in, amount);
            prop_assert_eq!(inner.minimum_amount_out, min_out);
        }
    }
}
