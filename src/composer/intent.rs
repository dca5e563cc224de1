//! Caller-level swap request

use super::route::RouteConfig;
use crate::errors::{ContinuumError, ContinuumResult};
use solana_sdk::pubkey::Pubkey;

/// What the caller wants done, independent of any ordinal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapIntent {
    pub route: RouteConfig,
    /// Owner of `source`; signs the request
    pub owner: Pubkey,
    pub source: Pubkey,
    pub destination: Pubkey,
    pub amount_in: u64,
    pub minimum_amount_out: u64,
}

impl SwapIntent {
    pub fn new(
        route: RouteConfig,
        owner: Pubkey,
        source: Pubkey,
        destination: Pubkey,
        amount_in: u64,
        minimum_amount_out: u64,
    ) -> ContinuumResult<Self> {
        if amount_in == 0 {
            return Err(ContinuumError::config_field("amount_in", "must be greater than zero"));
        }
        if source == destination {
            return Err(ContinuumError::config_field(
                "destination",
                "must differ from the source account",
            ));
        }
        Ok(Self {
            route,
            owner,
            source,
            destination,
            amount_in,
            minimum_amount_out,
        })
    }

    /// Build from the caller's two token accounts and a direction flag
    ///
    /// `a_to_b` spends `account_a` and receives into `account_b`.
    pub fn from_pair(
        route: RouteConfig,
        owner: Pubkey,
        account_a: Pubkey,
        account_b: Pubkey,
        a_to_b: bool,
        amount_in: u64,
        minimum_amount_out: u64,
    ) -> ContinuumResult<Self> {
        let (source, destination) = if a_to_b {
            (account_a, account_b)
        } else {
            (account_b, account_a)
        };
        Self::new(route, owner, source, destination, amount_in, minimum_amount_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::route::sample_entry;

    fn route() -> RouteConfig {
        RouteConfig::try_from(&sample_entry("r")).unwrap()
    }

    #[test]
    fn test_direction_resolution() {
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        let owner = Pubkey::new_unique();

        let fwd = SwapIntent::from_pair(route(), owner, a, b, true, 10, 1).unwrap();
        assert_eq!((fwd.source, fwd.destination), (a, b));

        let rev = SwapIntent::from_pair(route(), owner, a, b, false, 10, 1).unwrap();
        assert_eq!((rev.source, rev.destination), (b, a));
    }

    #[test]
    fn test_zero_amount_rejected() {
        let err = SwapIntent::new(
            route(),
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            0,
            0,
        )
        .unwrap_err();
        assert!(matches!(err, ContinuumError::Configuration(_)));
    }

    #[test]
    fn test_same_source_and_destination_rejected() {
        let a = Pubkey::new_unique();
        assert!(SwapIntent::new(route(), Pubkey::new_unique(), a, a, 5, 0).is_err());
    }
}
