//! Program identifiers, derived authority handles and instruction selectors

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;

/// Ordering program deployed on mainnet and devnet
pub const ORDERING_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("9Mp8VkLRUR1Gw6HSXmByjM4tqabaDnoTpDpbzMvsiQ2Y");

/// AMM v4 venue program
pub const AMM_V4_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8");

pub const COUNTER_SEED: &[u8] = b"fifo_state";
pub const DELEGATE_SEED: &[u8] = b"delegate";
pub const POOL_AUTHORITY_STATE_SEED: &[u8] = b"pool_authority_state";
pub const POOL_AUTHORITY_SEED: &[u8] = b"pool_authority";

/// `swap_with_seq`: default-authority route
pub const SWAP_WITH_SEQ_SELECTOR: [u8; 8] = [175, 1, 32, 219, 181, 148, 80, 154];

/// `swap_with_pool_authority`: route whose venue authority is held by the ordering program
pub const SWAP_WITH_POOL_AUTHORITY_SELECTOR: [u8; 8] = [237, 180, 80, 103, 107, 172, 187, 137];

/// First eight bytes of `sha256("global:<name>")`
pub fn selector_for(instruction_name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("global:{instruction_name}").as_bytes());
    let mut selector = [0u8; 8];
    selector.copy_from_slice(&digest[..8]);
    selector
}

/// Program identities a request is composed against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramIds {
    #[serde(with = "pubkey_str")]
    pub ordering: Pubkey,
    #[serde(with = "pubkey_str")]
    pub venue: Pubkey,
    #[serde(with = "pubkey_str", default = "default_token_program")]
    pub token: Pubkey,
}

fn default_token_program() -> Pubkey {
    spl_token::id()
}

impl Default for ProgramIds {
    fn default() -> Self {
        Self {
            ordering: ORDERING_PROGRAM_ID,
            venue: AMM_V4_PROGRAM_ID,
            token: spl_token::id(),
        }
    }
}

impl ProgramIds {
    pub fn counter(&self) -> Pubkey {
        Pubkey::find_program_address(&[COUNTER_SEED], &self.ordering).0
    }

    /// Keyless spending authority scoped to one source token account
    pub fn delegate_authority(&self, source: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[DELEGATE_SEED, source.as_ref()], &self.ordering).0
    }

    pub fn pool_authority_state(&self, pool_id: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[POOL_AUTHORITY_STATE_SEED, pool_id.as_ref()], &self.ordering).0
    }

    pub fn pool_authority(&self, pool_id: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[POOL_AUTHORITY_SEED, pool_id.as_ref()], &self.ordering).0
    }
}

/// Serde adapter storing a `Pubkey` as its base58 string
pub(crate) mod pubkey_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(key: &Pubkey, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&key.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Pubkey, D::Error> {
        let raw = String::deserialize(d)?;
        Pubkey::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selectors_match_instruction_names() {
        assert_eq!(selector_for("swap_with_seq"), SWAP_WITH_SEQ_SELECTOR);
        assert_eq!(
            selector_for("swap_with_pool_authority"),
            SWAP_WITH_POOL_AUTHORITY_SELECTOR
        );
    }

    #[test]
    fn test_derivations_are_deterministic() {
        let ids = ProgramIds::default();
        let source = Pubkey::new_unique();
        let pool = Pubkey::new_unique();

        assert_eq!(ids.counter(), ids.counter());
        assert_eq!(ids.delegate_authority(&source), ids.delegate_authority(&source));
        assert_ne!(ids.pool_authority(&pool), ids.pool_authority_state(&pool));
        assert_ne!(
            ids.delegate_authority(&source),
            ids.delegate_authority(&Pubkey::new_unique())
        );
    }

    #[test]
    fn test_program_ids_from_json() {
        let ids: ProgramIds = serde_json::from_str(&format!(
            r#"{{"ordering":"{}","venue":"{}"}}"#,
            ORDERING_PROGRAM_ID, AMM_V4_PROGRAM_ID
        ))
        .unwrap();
        assert_eq!(ids, ProgramIds::default());
    }
}
