//! Account list of the operation instruction
//!
//! A fixed nine-entry prefix owned by the ordering program, then the venue's
//! own swap accounts, then the signer-of-record for the venue CPI.

use super::addresses::ProgramIds;
use super::intent::SwapIntent;
use super::route::AuthorityMode;
use solana_sdk::instruction::AccountMeta;
use solana_sdk::pubkey::Pubkey;

pub const PREFIX_LEN: usize = 9;
pub const VENUE_LEN: usize = 17;
pub const OPERATION_ACCOUNTS_LEN: usize = PREFIX_LEN + VENUE_LEN + 1;

/// Handles derived for one intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedHandles {
    pub counter: Pubkey,
    pub pool_authority_state: Pubkey,
    pub pool_authority: Pubkey,
    pub delegate: Pubkey,
}

impl DerivedHandles {
    pub fn derive(ids: &ProgramIds, intent: &SwapIntent) -> Self {
        let pool = intent.route.pool_id();
        Self {
            counter: ids.counter(),
            pool_authority_state: ids.pool_authority_state(&pool),
            pool_authority: ids.pool_authority(&pool),
            delegate: ids.delegate_authority(&intent.source),
        }
    }

    /// Authority the venue sees as signer
    pub fn signer_of_record(&self, mode: AuthorityMode) -> Pubkey {
        match mode {
            AuthorityMode::Default => self.delegate,
            AuthorityMode::PoolAuthority => self.pool_authority,
        }
    }
}

pub fn operation_accounts(
    ids: &ProgramIds,
    intent: &SwapIntent,
    handles: &DerivedHandles,
) -> Vec<AccountMeta> {
    let route = &intent.route;
    let mut accounts = Vec::with_capacity(OPERATION_ACCOUNTS_LEN);

    accounts.extend([
        AccountMeta::new(handles.counter, false),
        AccountMeta::new_readonly(handles.pool_authority_state, false),
        AccountMeta::new_readonly(handles.pool_authority, false),
        AccountMeta::new_readonly(handles.delegate, false),
        AccountMeta::new_readonly(intent.owner, true),
        AccountMeta::new(intent.source, false),
        AccountMeta::new(intent.destination, false),
        AccountMeta::new_readonly(ids.venue, false),
        AccountMeta::new_readonly(ids.token, false),
    ]);

    // Venue swap-base-in order
    accounts.extend([
        AccountMeta::new_readonly(ids.token, false),
        AccountMeta::new(route.amm_id, false),
        AccountMeta::new_readonly(route.amm_authority, false),
        AccountMeta::new(route.open_orders, false),
        AccountMeta::new(route.target_orders, false),
        AccountMeta::new(route.coin_vault, false),
        AccountMeta::new(route.pc_vault, false),
        AccountMeta::new_readonly(route.market_program, false),
        AccountMeta::new(route.market, false),
        AccountMeta::new(route.bids, false),
        AccountMeta::new(route.asks, false),
        AccountMeta::new(route.event_queue, false),
        AccountMeta::new(route.market_coin_vault, false),
        AccountMeta::new(route.market_pc_vault, false),
        AccountMeta::new_readonly(route.vault_signer, false),
        AccountMeta::new(intent.source, false),
        AccountMeta::new(intent.destination, false),
    ]);

    accounts.push(AccountMeta::new_readonly(
        handles.signer_of_record(route.mode),
        false,
    ));
    accounts
}
