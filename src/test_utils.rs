//! Test Utilities Module
//!
//! In-memory ledger that emulates the ordering program: it decodes the
//! operation instruction of every sent transaction, accepts it only when the
//! claimed ordinal is exactly `counter + 1`, and increments by one. Failures
//! that the live network produces (expired blockhashes, authorization and
//! slippage errors, lagging RPC reads, competing callers) can be scripted.
//!
//! Only compiled when running tests or when the `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use crate::composer::{OperationPayload, ProgramIds};
use crate::ledger::{
    classify::{
        BAD_SEQ_ERROR_CODE, TOKEN_INSUFFICIENT_FUNDS_CODE, TOKEN_OWNER_MISMATCH_CODE,
        VENUE_EXCEEDED_SLIPPAGE_CODE,
    },
    AccountWatch, BlockReference, Durability, LedgerError, LedgerResult, LedgerRpc, SendOptions,
    SignatureState,
};
use crate::sequence::SequenceState;
use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::{
    compute_budget,
    hash::Hash,
    instruction::InstructionError,
    pubkey::Pubkey,
    signature::Signature,
    transaction::{Transaction, TransactionError},
};
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::mpsc;

/// Failure injected into the next sent transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFailure {
    /// The transaction is dropped and its blockhash expires
    ExpiredBlockhash,
    /// Token program rejects the delegate (SPL `OwnerMismatch`)
    OwnerMismatch,
    /// Venue reports the minimum output was not met
    Slippage,
    /// Source account cannot cover `amount_in`
    InsufficientFunds,
}

const BAD_SEQ_LOGS: [&str; 2] = [
    "Program 9Mp8VkLRUR1Gw6HSXmByjM4tqabaDnoTpDpbzMvsiQ2Y invoke [1]",
    "Program log: AnchorError occurred. Error Code: BadSeq. Error Number: 6000. Error Message: Sequence mismatch.",
];

#[derive(Debug, Clone)]
struct Landed {
    slot: u64,
    err: Option<TransactionError>,
    logs: Vec<String>,
}

struct MockState {
    counter: Option<u64>,
    previous: Option<u64>,
    admin: Pubkey,
    slot: u64,
    expired: HashSet<Hash>,
    landed: HashMap<Signature, Landed>,
    scripted: VecDeque<ScriptedFailure>,
    read_failures: u32,
    lagged_reads: u32,
    lag_after_send: u32,
    competitor_advance: u64,
    sends: u32,
    last_send_options: Option<SendOptions>,
    last_compute_unit_price: Option<u64>,
    accepted: Vec<u64>,
    prioritization_fees: Option<Vec<u64>>,
    watchers: Vec<mpsc::UnboundedSender<Vec<u8>>>,
}

/// Deterministic in-memory ledger
pub struct MockLedger {
    ids: ProgramIds,
    state: Mutex<MockState>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    /// Ledger whose counter account does not exist yet
    pub fn new() -> Self {
        Self {
            ids: ProgramIds::default(),
            state: Mutex::new(MockState {
                counter: None,
                previous: None,
                admin: Pubkey::new_unique(),
                slot: 1,
                expired: HashSet::new(),
                landed: HashMap::new(),
                scripted: VecDeque::new(),
                read_failures: 0,
                lagged_reads: 0,
                lag_after_send: 0,
                competitor_advance: 0,
                sends: 0,
                last_send_options: None,
                last_compute_unit_price: None,
                accepted: Vec::new(),
                prioritization_fees: Some(Vec::new()),
                watchers: Vec::new(),
            }),
        }
    }

    pub fn with_counter(ordinal: u64) -> Self {
        let ledger = Self::new();
        ledger.set_counter(ordinal);
        ledger
    }

    pub fn program_ids(&self) -> ProgramIds {
        self.ids
    }

    pub fn counter_address(&self) -> Pubkey {
        self.ids.counter()
    }

    /// Current counter value (0 when absent)
    pub fn counter(&self) -> u64 {
        self.state.lock().counter.unwrap_or(0)
    }

    /// Overwrite the counter as another process would, notifying watchers
    pub fn set_counter(&self, ordinal: u64) {
        let mut state = self.state.lock();
        state.previous = state.counter;
        state.counter = Some(ordinal);
        state.notify();
    }

    pub fn set_slot(&self, slot: u64) {
        self.state.lock().slot = slot;
    }

    /// Fail the next `n` counter reads with a transport error
    pub fn fail_reads(&self, n: u32) {
        self.state.lock().read_failures = n;
    }

    /// Serve the pre-change counter value for the next `n` reads
    pub fn lag_reads(&self, n: u32) {
        self.state.lock().lagged_reads = n;
    }

    /// Lag the `n` reads that follow the next executed send
    pub fn lag_reads_after_next_send(&self, n: u32) {
        self.state.lock().lag_after_send = n;
    }

    /// Let a competing caller take `n` ordinals just before the next send lands
    pub fn advance_before_next_send(&self, n: u64) {
        self.state.lock().competitor_advance = n;
    }

    pub fn script_failures(&self, failures: impl IntoIterator<Item = ScriptedFailure>) {
        self.state.lock().scripted.extend(failures);
    }

    pub fn set_prioritization_fees(&self, fees: Vec<u64>) {
        self.state.lock().prioritization_fees = Some(fees);
    }

    pub fn fail_prioritization_fees(&self) {
        self.state.lock().prioritization_fees = None;
    }

    /// Every `send_transaction` call, including rejected ones
    pub fn send_count(&self) -> u32 {
        self.state.lock().sends
    }

    /// Ordinals accepted, in acceptance order
    pub fn accepted(&self) -> Vec<u64> {
        self.state.lock().accepted.clone()
    }

    pub fn last_send_options(&self) -> Option<SendOptions> {
        self.state.lock().last_send_options.clone()
    }

    pub fn last_compute_unit_price(&self) -> Option<u64> {
        self.state.lock().last_compute_unit_price
    }

    pub fn watcher_count(&self) -> usize {
        self.state.lock().watchers.len()
    }

    /// Execute `tx` against the emulated program
    fn execute(&self, state: &mut MockState, tx: &Transaction) -> (Option<TransactionError>, Vec<String>) {
        let keys = &tx.message.account_keys;
        let program_of = |index: u8| keys.get(index as usize).copied().unwrap_or_default();

        let Some((op_index, op)) = tx
            .message
            .instructions
            .iter()
            .enumerate()
            .find(|(_, ix)| program_of(ix.program_id_index) == self.ids.ordering)
        else {
            return (None, Vec::new());
        };
        let op_index = op_index as u8;

        if let Some(failure) = state.scripted.pop_front() {
            return match failure {
                ScriptedFailure::ExpiredBlockhash => (Some(TransactionError::BlockhashNotFound), Vec::new()),
                ScriptedFailure::OwnerMismatch => (
                    Some(TransactionError::InstructionError(
                        op_index,
                        InstructionError::Custom(TOKEN_OWNER_MISMATCH_CODE),
                    )),
                    vec!["Program log: Error: owner does not match".to_string()],
                ),
                ScriptedFailure::Slippage => (
                    Some(TransactionError::InstructionError(
                        op_index,
                        InstructionError::Custom(VENUE_EXCEEDED_SLIPPAGE_CODE),
                    )),
                    vec!["Program log: Error: exceeds desired slippage limit".to_string()],
                ),
                ScriptedFailure::InsufficientFunds => (
                    Some(TransactionError::InstructionError(
                        op_index,
                        InstructionError::Custom(TOKEN_INSUFFICIENT_FUNDS_CODE),
                    )),
                    vec!["Program log: Error: insufficient funds".to_string()],
                ),
            };
        }

        if state.competitor_advance > 0 {
            let taken = std::mem::take(&mut state.competitor_advance);
            for _ in 0..taken {
                let next = state.counter.unwrap_or(0) + 1;
                state.advance(next);
            }
        }

        let payload = match OperationPayload::decode(&op.data) {
            Ok(payload) => payload,
            Err(_) => {
                return (
                    Some(TransactionError::InstructionError(
                        op_index,
                        InstructionError::InvalidInstructionData,
                    )),
                    Vec::new(),
                )
            }
        };

        let expected = state.counter.unwrap_or(0) + 1;
        if payload.ordinal != expected {
            return (
                Some(TransactionError::InstructionError(
                    op_index,
                    InstructionError::Custom(BAD_SEQ_ERROR_CODE),
                )),
                BAD_SEQ_LOGS.iter().map(|l| l.to_string()).collect(),
            );
        }

        state.advance(expected);
        state.accepted.push(expected);
        (None, vec![format!("Program log: swap accepted at seq {expected}")])
    }
}

impl MockState {
    fn advance(&mut self, ordinal: u64) {
        self.previous = self.counter;
        self.counter = Some(ordinal);
        self.notify();
    }

    fn counter_data(&self, ordinal: Option<u64>) -> Option<Vec<u8>> {
        ordinal.map(|ordinal| {
            SequenceState {
                ordinal,
                admin: Some(self.admin),
            }
            .encode()
        })
    }

    fn notify(&mut self) {
        let Some(data) = self.counter_data(self.counter) else {
            return;
        };
        self.watchers.retain(|tx| tx.send(data.clone()).is_ok());
    }
}

fn compute_unit_price(tx: &Transaction) -> Option<u64> {
    let keys = &tx.message.account_keys;
    tx.message.instructions.iter().find_map(|ix| {
        let program = keys.get(ix.program_id_index as usize)?;
        if *program != compute_budget::id() || ix.data.first() != Some(&3) || ix.data.len() < 9 {
            return None;
        }
        let mut price = [0u8; 8];
        price.copy_from_slice(&ix.data[1..9]);
        Some(u64::from_le_bytes(price))
    })
}

#[async_trait]
impl LedgerRpc for MockLedger {
    async fn account_data(&self, address: &Pubkey) -> LedgerResult<Option<Vec<u8>>> {
        let mut state = self.state.lock();
        if state.read_failures > 0 {
            state.read_failures -= 1;
            return Err(LedgerError::Transport("connection reset".to_string()));
        }
        if *address != self.ids.counter() {
            return Ok(None);
        }
        if state.lagged_reads > 0 {
            state.lagged_reads -= 1;
            return Ok(state.counter_data(state.previous));
        }
        Ok(state.counter_data(state.counter))
    }

    async fn latest_blockhash(&self) -> LedgerResult<BlockReference> {
        let state = self.state.lock();
        Ok(BlockReference {
            blockhash: Hash::new_unique(),
            last_valid_block_height: state.slot + 150,
        })
    }

    async fn slot(&self) -> LedgerResult<u64> {
        Ok(self.state.lock().slot)
    }

    async fn send_transaction(&self, tx: &Transaction, options: &SendOptions) -> LedgerResult<Signature> {
        let mut state = self.state.lock();
        state.sends += 1;
        state.last_send_options = Some(options.clone());
        state.last_compute_unit_price = compute_unit_price(tx);

        let signature = tx.signatures.first().copied().unwrap_or_default();
        if tx.verify().is_err() {
            return Err(LedgerError::Rejected {
                error: TransactionError::SignatureFailure,
                logs: Vec::new(),
            });
        }

        if state.scripted.front() == Some(&ScriptedFailure::ExpiredBlockhash) {
            state.scripted.pop_front();
            state.expired.insert(tx.message.recent_blockhash);
            return Ok(signature);
        }

        let (err, logs) = self.execute(&mut state, tx);
        state.lagged_reads += std::mem::take(&mut state.lag_after_send);
        if let Some(error) = err.clone() {
            if !options.skip_preflight {
                return Err(LedgerError::Rejected { error, logs });
            }
        }
        let slot = state.slot;
        state.landed.insert(signature, Landed { slot, err, logs });
        Ok(signature)
    }

    async fn signature_state(&self, signature: &Signature) -> LedgerResult<Option<SignatureState>> {
        Ok(self.state.lock().landed.get(signature).map(|landed| SignatureState {
            slot: landed.slot,
            err: landed.err.clone(),
            durability: Durability::Finalized,
        }))
    }

    async fn transaction_logs(&self, signature: &Signature) -> LedgerResult<Vec<String>> {
        self.state
            .lock()
            .landed
            .get(signature)
            .map(|landed| landed.logs.clone())
            .ok_or_else(|| LedgerError::Transport(format!("transaction {signature} not found")))
    }

    async fn is_blockhash_valid(&self, blockhash: &Hash) -> LedgerResult<bool> {
        Ok(!self.state.lock().expired.contains(blockhash))
    }

    async fn recent_prioritization_fees(&self, _accounts: &[Pubkey]) -> LedgerResult<Vec<u64>> {
        self.state
            .lock()
            .prioritization_fees
            .clone()
            .ok_or_else(|| LedgerError::Transport("getRecentPrioritizationFees unavailable".to_string()))
    }

    async fn watch_account(&self, address: &Pubkey) -> LedgerResult<AccountWatch> {
        let (tx, rx) = mpsc::unbounded_channel();
        if *address == self.ids.counter() {
            self.state.lock().watchers.push(tx);
        }
        Ok(AccountWatch {
            updates: rx,
            task: None,
        })
    }
}
