//! Instruction construction and request shape validation

use super::accounts::{operation_accounts, DerivedHandles, OPERATION_ACCOUNTS_LEN};
use super::addresses::{ProgramIds, SWAP_WITH_POOL_AUTHORITY_SELECTOR, SWAP_WITH_SEQ_SELECTOR};
use super::intent::SwapIntent;
use super::payload::{InnerPayload, OperationPayload};
use super::route::AuthorityMode;
use crate::errors::{ContinuumError, ContinuumResult};
use solana_sdk::instruction::Instruction;
use spl_token::instruction::TokenInstruction;

/// Position of the operation instruction inside a composed request
pub const OPERATION_INDEX: usize = 1;

pub fn selector_for_mode(mode: AuthorityMode) -> [u8; 8] {
    match mode {
        AuthorityMode::Default => SWAP_WITH_SEQ_SELECTOR,
        AuthorityMode::PoolAuthority => SWAP_WITH_POOL_AUTHORITY_SELECTOR,
    }
}

/// Token approve scoping exactly `amount_in` to the delegate handle
pub fn approve_instruction(
    ids: &ProgramIds,
    intent: &SwapIntent,
    handles: &DerivedHandles,
) -> ContinuumResult<Instruction> {
    spl_token::instruction::approve(
        &ids.token,
        &intent.source,
        &handles.delegate,
        &intent.owner,
        &[],
        intent.amount_in,
    )
    .map_err(|e| ContinuumError::Configuration(format!("approve instruction: {e}")))
}

pub fn operation_instruction(
    ids: &ProgramIds,
    intent: &SwapIntent,
    handles: &DerivedHandles,
    ordinal: u64,
) -> ContinuumResult<Instruction> {
    let inner = InnerPayload::swap_base_in(intent.amount_in, intent.minimum_amount_out).encode();
    let data = OperationPayload {
        selector: selector_for_mode(intent.route.mode),
        ordinal,
        inner,
    }
    .encode()?;

    Ok(Instruction {
        program_id: ids.ordering,
        accounts: operation_accounts(ids, intent, handles),
        data,
    })
}

/// Validate a composed request before it is signed
///
/// The request must be exactly `[approve, operation]`: the approve grants
/// `amount_in` to the delegate handle, and the operation targets the ordering
/// program with the expected ordinal and the full account list.
pub fn validate_request_shape(
    ids: &ProgramIds,
    intent: &SwapIntent,
    handles: &DerivedHandles,
    ordinal: u64,
    instructions: &[Instruction],
) -> ContinuumResult<()> {
    if instructions.len() != 2 {
        return Err(invalid_shape(format!(
            "expected [approve, operation], got {} instructions",
            instructions.len()
        )));
    }

    let approve = &instructions[0];
    if approve.program_id != ids.token {
        return Err(invalid_shape(format!(
            "first instruction must be a token approve, got program_id: {}",
            approve.program_id
        )));
    }
    match TokenInstruction::unpack(&approve.data) {
        Ok(TokenInstruction::Approve { amount }) if amount == intent.amount_in => {}
        Ok(TokenInstruction::Approve { amount }) => {
            return Err(invalid_shape(format!(
                "approve amount {amount} does not equal amount_in {}",
                intent.amount_in
            )))
        }
        _ => return Err(invalid_shape("first instruction is not an approve")),
    }
    if approve.accounts.get(1).map(|a| a.pubkey) != Some(handles.delegate) {
        return Err(invalid_shape("approve does not target the delegate handle"));
    }

    let operation = &instructions[OPERATION_INDEX];
    if operation.program_id != ids.ordering {
        return Err(invalid_shape(format!(
            "operation must target the ordering program, got program_id: {}",
            operation.program_id
        )));
    }
    if operation.accounts.len() != OPERATION_ACCOUNTS_LEN {
        return Err(invalid_shape(format!(
            "operation has {} accounts, expected {}",
            operation.accounts.len(),
            OPERATION_ACCOUNTS_LEN
        )));
    }
    let payload = OperationPayload::decode(&operation.data)?;
    if payload.ordinal != ordinal {
        return Err(invalid_shape(format!(
            "operation claims ordinal {}, expected {}",
            payload.ordinal, ordinal
        )));
    }

    Ok(())
}

fn invalid_shape(reason: impl Into<String>) -> ContinuumError {
    ContinuumError::Configuration(format!("invalid request shape: {}", reason.into()))
}
