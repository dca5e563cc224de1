//! Classification of remote rejections
//!
//! Typed `TransactionError`s are checked first; program log lines are the
//! fallback because CPI failures from the venue often surface only as a
//! generic custom code on the outer instruction.

use crate::errors::ContinuumError;
use once_cell::sync::Lazy;
use regex::Regex;
use solana_sdk::{instruction::InstructionError, transaction::TransactionError};

/// Custom error code of the ordering program's sequence check (Anchor offset 6000 + 0)
pub const BAD_SEQ_ERROR_CODE: u32 = 6000;

/// SPL Token `TokenError::InsufficientFunds`
pub const TOKEN_INSUFFICIENT_FUNDS_CODE: u32 = 1;

/// SPL Token `TokenError::OwnerMismatch`
pub const TOKEN_OWNER_MISMATCH_CODE: u32 = 4;

/// AMM v4 `ExceededSlippage`
pub const VENUE_EXCEEDED_SLIPPAGE_CODE: u32 = 30;

static ORDINAL_CONFLICT_LOG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"BadSeq|Sequence mismatch").expect("static regex"));

static FUNDS_OR_SLIPPAGE_LOG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)insufficient (funds|lamports)|exceededslippage|exceeds desired slippage")
        .expect("static regex")
});

static AUTHORIZATION_LOG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)owner does not match|invalid (program )?authority|missing required signature")
        .expect("static regex")
});

/// What a rejection means for the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    OrdinalConflict,
    StaleReference,
    Authorization,
    FundsOrSlippage,
    Other,
}

/// Classify a rejected transaction
///
/// `operation_index` is the position of the ordering-program instruction in
/// the transaction; a sequence-check code reported on any other instruction is
/// not an ordinal conflict.
pub fn classify_rejection(
    error: &TransactionError,
    logs: &[String],
    operation_index: u8,
) -> RejectionKind {
    match error {
        TransactionError::BlockhashNotFound => return RejectionKind::StaleReference,
        TransactionError::InsufficientFundsForFee
        | TransactionError::InsufficientFundsForRent { .. }
        | TransactionError::AccountNotFound => return RejectionKind::FundsOrSlippage,
        TransactionError::InstructionError(index, ix_err) => {
            match ix_err {
                InstructionError::Custom(BAD_SEQ_ERROR_CODE) if *index == operation_index => {
                    return RejectionKind::OrdinalConflict
                }
                InstructionError::Custom(TOKEN_INSUFFICIENT_FUNDS_CODE)
                | InstructionError::Custom(VENUE_EXCEEDED_SLIPPAGE_CODE)
                | InstructionError::InsufficientFunds => {
                    return RejectionKind::FundsOrSlippage
                }
                InstructionError::Custom(TOKEN_OWNER_MISMATCH_CODE)
                | InstructionError::MissingRequiredSignature
                | InstructionError::PrivilegeEscalation
                | InstructionError::IncorrectAuthority => return RejectionKind::Authorization,
                _ => {}
            }
        }
        _ => {}
    }

    classify_logs(logs)
}

fn classify_logs(logs: &[String]) -> RejectionKind {
    if logs.iter().any(|l| ORDINAL_CONFLICT_LOG.is_match(l)) {
        RejectionKind::OrdinalConflict
    } else if logs.iter().any(|l| FUNDS_OR_SLIPPAGE_LOG.is_match(l)) {
        RejectionKind::FundsOrSlippage
    } else if logs.iter().any(|l| AUTHORIZATION_LOG.is_match(l)) {
        RejectionKind::Authorization
    } else {
        RejectionKind::Other
    }
}

impl RejectionKind {
    /// Convert into the crate error, attaching the claimed ordinal and logs
    pub fn into_error(
        self,
        claimed: u64,
        error: &TransactionError,
        logs: Vec<String>,
    ) -> ContinuumError {
        let reason = error.to_string();
        match self {
            RejectionKind::OrdinalConflict => ContinuumError::OrdinalConflict {
                claimed,
                observed: None,
                logs,
            },
            RejectionKind::StaleReference => ContinuumError::StaleTransportReference(reason),
            RejectionKind::Authorization => ContinuumError::AuthorizationFailure { reason, logs },
            RejectionKind::FundsOrSlippage => {
                ContinuumError::InsufficientFundsOrSlippage { reason, logs }
            }
            RejectionKind::Other => ContinuumError::Rejected { reason, logs },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_seq_on_operation_instruction() {
        let err = TransactionError::InstructionError(1, InstructionError::Custom(6000));
        assert_eq!(classify_rejection(&err, &[], 1), RejectionKind::OrdinalConflict);
    }

    #[test]
    fn test_bad_seq_code_on_other_instruction_is_not_conflict() {
        let err = TransactionError::InstructionError(0, InstructionError::Custom(6000));
        assert_eq!(classify_rejection(&err, &[], 1), RejectionKind::Other);
    }

    #[test]
    fn test_blockhash_not_found_is_stale() {
        assert_eq!(
            classify_rejection(&TransactionError::BlockhashNotFound, &[], 1),
            RejectionKind::StaleReference
        );
    }

    #[test]
    fn test_funds_and_slippage() {
        assert_eq!(
            classify_rejection(&TransactionError::InsufficientFundsForFee, &[], 1),
            RejectionKind::FundsOrSlippage
        );
        let slippage = TransactionError::InstructionError(1, InstructionError::Custom(30));
        assert_eq!(
            classify_rejection(&slippage, &[], 1),
            RejectionKind::FundsOrSlippage
        );
    }

    #[test]
    fn test_authorization() {
        let err = TransactionError::InstructionError(1, InstructionError::MissingRequiredSignature);
        assert_eq!(classify_rejection(&err, &[], 1), RejectionKind::Authorization);
    }

    #[test]
    fn test_log_fallback() {
        let err = TransactionError::InstructionError(1, InstructionError::Custom(42));
        let logs = vec![
            "Program log: AnchorError occurred. Error Code: BadSeq.".to_string(),
        ];
        assert_eq!(classify_rejection(&err, &logs, 1), RejectionKind::OrdinalConflict);

        let logs = vec!["Program log: Error: owner does not match".to_string()];
        assert_eq!(classify_rejection(&err, &logs, 1), RejectionKind::Authorization);

        assert_eq!(classify_rejection(&err, &[], 1), RejectionKind::Other);
    }

    #[test]
    fn test_into_error_keeps_logs() {
        let err = TransactionError::InstructionError(1, InstructionError::Custom(6000));
        let logs = vec!["Program log: BadSeq".to_string()];
        let out = RejectionKind::OrdinalConflict.into_error(9, &err, logs.clone());
        assert_eq!(
            out,
            ContinuumError::OrdinalConflict {
                claimed: 9,
                observed: None,
                logs
            }
        );
    }
}
