//! Request composer
//!
//! Turns a [`SwapIntent`] and a freshly computed ordinal into the two
//! instructions the ordering program expects: a token approve scoped to
//! `amount_in`, then the sequenced operation. Composition is pure; the same
//! intent composed at two ordinals differs only in the embedded ordinal.

pub mod accounts;
pub mod addresses;
pub mod instructions;
pub mod intent;
pub mod payload;
pub mod route;

pub use accounts::{DerivedHandles, OPERATION_ACCOUNTS_LEN, PREFIX_LEN};
pub use addresses::{
    selector_for, ProgramIds, AMM_V4_PROGRAM_ID, ORDERING_PROGRAM_ID,
    SWAP_WITH_POOL_AUTHORITY_SELECTOR, SWAP_WITH_SEQ_SELECTOR,
};
pub use instructions::{validate_request_shape, OPERATION_INDEX};
pub use intent::SwapIntent;
pub use payload::{InnerPayload, OperationPayload, SWAP_BASE_IN_OP};
pub use route::{AuthorityMode, RouteConfig, RouteConfigEntry, RouteRegistry};

use crate::errors::{ContinuumError, ContinuumResult};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use tracing::debug;

/// Signed-ready request for one ordinal
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedRequest {
    pub ordinal: u64,
    pub route: String,
    pub owner: Pubkey,
    pub source: Pubkey,
    pub amount_in: u64,
    pub handles: DerivedHandles,
    /// `[approve, operation]`
    pub instructions: Vec<Instruction>,
}

impl ComposedRequest {
    pub fn operation(&self) -> &Instruction {
        &self.instructions[OPERATION_INDEX]
    }
}

/// Builds requests against fixed program identities
#[derive(Debug, Clone, Default)]
pub struct RequestComposer {
    ids: ProgramIds,
}

impl RequestComposer {
    pub fn new(ids: ProgramIds) -> Self {
        Self { ids }
    }

    pub fn program_ids(&self) -> &ProgramIds {
        &self.ids
    }

    pub fn counter_address(&self) -> Pubkey {
        self.ids.counter()
    }

    pub fn compose(&self, intent: &SwapIntent, ordinal: u64) -> ContinuumResult<ComposedRequest> {
        if ordinal == 0 {
            return Err(ContinuumError::config_field("ordinal", "must be at least 1"));
        }
        if intent.amount_in == 0 {
            return Err(ContinuumError::config_field("amount_in", "must be greater than zero"));
        }

        let handles = DerivedHandles::derive(&self.ids, intent);
        let instructions = vec![
            instructions::approve_instruction(&self.ids, intent, &handles)?,
            instructions::operation_instruction(&self.ids, intent, &handles, ordinal)?,
        ];
        validate_request_shape(&self.ids, intent, &handles, ordinal, &instructions)?;

        debug!(
            ordinal,
            route = %intent.route.name,
            source = %intent.source,
            delegate = %handles.delegate,
            amount_in = intent.amount_in,
            "Composed request"
        );

        Ok(ComposedRequest {
            ordinal,
            route: intent.route.name.clone(),
            owner: intent.owner,
            source: intent.source,
            amount_in: intent.amount_in,
            handles,
            instructions,
        })
    }
}
