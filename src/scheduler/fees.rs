//! Best-effort priority fee estimation

use crate::ledger::LedgerRpc;
use crate::metrics::metrics;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

/// Nearest-rank percentile of recent per-slot fees
///
/// Returns `None` for an empty sample.
pub fn percentile(fees: &[u64], pct: u8) -> Option<u64> {
    if fees.is_empty() {
        return None;
    }
    let mut sorted = fees.to_vec();
    sorted.sort_unstable();
    let rank = ((pct.min(100) as usize * sorted.len()).div_ceil(100)).max(1);
    sorted.get(rank - 1).copied()
}

/// Micro-lamports per CU to bid, or `fallback` when the query fails or is empty
pub async fn estimate_priority_fee(
    ledger: &dyn LedgerRpc,
    accounts: &[Pubkey],
    pct: u8,
    fallback: u64,
) -> u64 {
    match ledger.recent_prioritization_fees(accounts).await {
        Ok(fees) => match percentile(&fees, pct) {
            Some(fee) => {
                debug!(fee, samples = fees.len(), pct, "Estimated priority fee");
                fee
            }
            None => {
                metrics().priority_fee_fallbacks.inc();
                debug!(fallback, "No recent prioritization fees, using fallback");
                fallback
            }
        },
        Err(e) => {
            metrics().priority_fee_fallbacks.inc();
            warn!(error = %e, fallback, "Priority fee query failed, using fallback");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_nearest_rank() {
        let fees: Vec<u64> = (1..=10).map(|n| n * 100).collect();
        assert_eq!(percentile(&fees, 90), Some(900));
        assert_eq!(percentile(&fees, 50), Some(500));
        assert_eq!(percentile(&fees, 100), Some(1_000));
        assert_eq!(percentile(&fees, 0), Some(100));
        assert_eq!(percentile(&[], 90), None);
    }

    #[test]
    fn test_percentile_ignores_order() {
        assert_eq!(percentile(&[5, 1, 3], 50), Some(3));
    }
}
