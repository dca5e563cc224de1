//! Sign, send, confirm and classify, with bounded retries
//!
//! Two entry points:
//! - [`ConflictRetryingSubmitter::submit`] resubmits an already composed
//!   request and only retries on an expired blockhash.
//! - [`ConflictRetryingSubmitter::submit_intent_with_retry`] also absorbs
//!   ordinal conflicts by waiting a fixed backoff and recomposing the intent
//!   against a freshly read counter.
//!
//! Both share one budget of network attempts; exhausting it raises
//! `RetryBudgetExhausted` carrying the last cause.

use super::attempt::{AttemptOutcome, SubmissionAttempt};
use super::retry::RetryConfig;
use crate::composer::{ComposedRequest, RequestComposer, SwapIntent, OPERATION_INDEX};
use crate::errors::{ContinuumError, ContinuumResult};
use crate::journal::SubmissionJournal;
use crate::ledger::{
    classify_rejection, BlockReference, Durability, LedgerError, LedgerRpc, SendOptions,
};
use crate::metrics::{metrics, Timer};
use crate::observability::AttemptTrace;
use crate::sequence::{BoundedWait, Probe, SequenceTracker};
use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::Transaction,
};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn, Instrument};

/// Per-submission transmission settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Durability the confirmation wait requires
    pub durability: Durability,
    pub send: SendOptions,
    pub compute_unit_limit: Option<u32>,
    /// Micro-lamports per compute unit
    pub compute_unit_price: Option<u64>,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            durability: Durability::Confirmed,
            send: SendOptions::default(),
            compute_unit_limit: None,
            compute_unit_price: None,
        }
    }
}

impl SubmitOptions {
    /// Skip preflight and node rebroadcast; confirmation durability is unchanged
    pub fn reduced_visibility(compute_unit_price: Option<u64>) -> Self {
        Self {
            send: SendOptions::reduced_visibility(),
            compute_unit_price,
            ..Self::default()
        }
    }
}

/// Follow-up request sent right after the main one, best effort
#[derive(Debug, Clone, PartialEq)]
pub struct TrailingRequest {
    pub instructions: Vec<Instruction>,
}

impl TrailingRequest {
    /// Revoke any delegate left on `source`
    pub fn revoke(token_program: &Pubkey, source: &Pubkey, owner: &Pubkey) -> ContinuumResult<Self> {
        let ix = spl_token::instruction::revoke(token_program, source, owner, &[])
            .map_err(|e| ContinuumError::Configuration(format!("revoke instruction: {e}")))?;
        Ok(Self {
            instructions: vec![ix],
        })
    }
}

/// Result of an accepted submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub signature: Signature,
    pub ordinal: u64,
    /// Network attempts spent, including rejected ones
    pub attempts: u32,
    pub slot: u64,
    pub trailing_signature: Option<Signature>,
}

struct AttemptReport {
    signature: Option<Signature>,
    trailing: Option<Signature>,
    result: ContinuumResult<u64>,
}

/// Signs, transmits and confirms composed requests
pub struct ConflictRetryingSubmitter {
    ledger: Arc<dyn LedgerRpc>,
    tracker: Arc<SequenceTracker>,
    composer: RequestComposer,
    config: RetryConfig,
    journal: Option<Arc<SubmissionJournal>>,
}

impl ConflictRetryingSubmitter {
    pub fn new(
        ledger: Arc<dyn LedgerRpc>,
        tracker: Arc<SequenceTracker>,
        composer: RequestComposer,
        config: RetryConfig,
    ) -> Self {
        Self {
            ledger,
            tracker,
            composer,
            config,
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: Arc<SubmissionJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn tracker(&self) -> &Arc<SequenceTracker> {
        &self.tracker
    }

    pub fn composer(&self) -> &RequestComposer {
        &self.composer
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Submit a composed request, retrying only on an expired blockhash
    pub async fn submit(
        &self,
        request: &ComposedRequest,
        credential: &Keypair,
    ) -> ContinuumResult<SubmissionReceipt> {
        self.submit_with_options(request, credential, &SubmitOptions::default(), None)
            .await
    }

    pub async fn submit_with_options(
        &self,
        request: &ComposedRequest,
        credential: &Keypair,
        options: &SubmitOptions,
        trailing: Option<&TrailingRequest>,
    ) -> ContinuumResult<SubmissionReceipt> {
        let mut trace = AttemptTrace::new("submit");
        let span = trace.span();
        let result = self
            .submit_request(request, credential, options, trailing, &mut trace)
            .instrument(span)
            .await;
        record_terminal(&result);
        result
    }

    /// Submit an intent, recomposing at a fresh ordinal after each conflict
    pub async fn submit_intent_with_retry(
        &self,
        intent: &SwapIntent,
        credential: &Keypair,
    ) -> ContinuumResult<SubmissionReceipt> {
        self.submit_intent_with_options(intent, credential, &SubmitOptions::default())
            .await
    }

    pub async fn submit_intent_with_options(
        &self,
        intent: &SwapIntent,
        credential: &Keypair,
        options: &SubmitOptions,
    ) -> ContinuumResult<SubmissionReceipt> {
        let mut trace = AttemptTrace::new("submit_intent_with_retry");
        let span = trace.span();
        let timer = Timer::new();
        let result = self
            .submit_intent(intent, credential, options, &mut trace)
            .instrument(span)
            .await;
        timer.observe_duration(&metrics().intent_latency);
        record_terminal(&result);
        result
    }

    async fn submit_intent(
        &self,
        intent: &SwapIntent,
        credential: &Keypair,
        options: &SubmitOptions,
        trace: &mut AttemptTrace,
    ) -> ContinuumResult<SubmissionReceipt> {
        check_owner(intent.owner, credential)?;
        let mut ordinal = self.tracker.compute_next().await?;

        loop {
            let request = self.composer.compose(intent, ordinal)?;
            match self
                .submit_request(&request, credential, options, None, trace)
                .await
            {
                Err(ContinuumError::OrdinalConflict { claimed, observed, .. }) => {
                    let backoff = self.config.conflict_backoff();
                    info!(
                        claimed,
                        observed = ?observed,
                        attempts = trace.attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        "Ordinal taken, rebuilding at a fresh ordinal"
                    );
                    sleep(backoff).await;
                    ordinal = self
                        .tracker
                        .next_after(claimed, self.config.rebuild_timeout())
                        .await?;
                }
                other => return other,
            }
        }
    }

    /// Attempt loop for one composed request
    ///
    /// Expired blockhashes are retried in place. An ordinal conflict is
    /// returned to the caller unless it spent the last attempt.
    async fn submit_request(
        &self,
        request: &ComposedRequest,
        credential: &Keypair,
        options: &SubmitOptions,
        trailing: Option<&TrailingRequest>,
        trace: &mut AttemptTrace,
    ) -> ContinuumResult<SubmissionReceipt> {
        check_owner(request.owner, credential)?;
        if self.config.max_attempts == 0 {
            return Err(ContinuumError::config_field("retry.max_attempts", "must be at least 1"));
        }

        loop {
            let attempt = trace.begin_attempt(request.ordinal);
            let report = self
                .attempt_once(request, credential, options, trailing, attempt)
                .await;
            self.journal_attempt(trace, attempt, request.ordinal, &report);

            let err = match report.result {
                Ok(slot) => {
                    let signature = report.signature.ok_or_else(|| {
                        ContinuumError::Transport("accepted attempt without signature".to_string())
                    })?;
                    metrics().submissions_accepted.inc();
                    info!(
                        ordinal = request.ordinal,
                        attempt,
                        slot,
                        signature = %signature,
                        "Request accepted"
                    );
                    return Ok(SubmissionReceipt {
                        signature,
                        ordinal: request.ordinal,
                        attempts: trace.attempts,
                        slot,
                        trailing_signature: report.trailing,
                    });
                }
                Err(err) => err,
            };

            match &err {
                ContinuumError::OrdinalConflict { .. } => metrics().ordinal_conflicts.inc(),
                ContinuumError::StaleTransportReference(_) => metrics().stale_references.inc(),
                _ => {}
            }

            if !err.is_retryable() {
                warn!(ordinal = request.ordinal, attempt, error = %err, "Attempt failed, not retrying");
                return Err(err);
            }
            if trace.attempts >= self.config.max_attempts {
                metrics().retry_budget_exhausted.inc();
                warn!(
                    ordinal = request.ordinal,
                    attempts = trace.attempts,
                    error = %err,
                    "Retry budget exhausted"
                );
                return Err(ContinuumError::RetryBudgetExhausted {
                    attempts: trace.attempts,
                    last: Box::new(err),
                });
            }
            if matches!(err, ContinuumError::OrdinalConflict { .. }) {
                return Err(err);
            }
            debug!(ordinal = request.ordinal, attempt, error = %err, "Blockhash expired, resubmitting");
        }
    }

    async fn attempt_once(
        &self,
        request: &ComposedRequest,
        credential: &Keypair,
        options: &SubmitOptions,
        trailing: Option<&TrailingRequest>,
        attempt: u32,
    ) -> AttemptReport {
        let failed = |err: ContinuumError| AttemptReport {
            signature: None,
            trailing: None,
            result: Err(err),
        };

        let block = match self.ledger.latest_blockhash().await {
            Ok(block) => block,
            Err(e) => return failed(ledger_error(e)),
        };
        let (tx, operation_index) = match sign(&request.instructions, credential, options, &block) {
            Ok(signed) => signed,
            Err(e) => return failed(e),
        };

        metrics().submission_attempts.inc();
        debug!(ordinal = request.ordinal, attempt, blockhash = %block.blockhash, "Sending request");
        let signature = match self.ledger.send_transaction(&tx, &options.send).await {
            Ok(signature) => signature,
            Err(e) => {
                let err = self
                    .send_error(e, request.ordinal, operation_index)
                    .await;
                return failed(err);
            }
        };

        let trailing = match trailing {
            Some(trailing) => self.send_trailing(trailing, credential, options, &block).await,
            None => None,
        };

        let result = self
            .confirm(&signature, &block, request.ordinal, operation_index, options.durability)
            .await;
        AttemptReport {
            signature: Some(signature),
            trailing,
            result,
        }
    }

    async fn send_trailing(
        &self,
        trailing: &TrailingRequest,
        credential: &Keypair,
        options: &SubmitOptions,
        block: &BlockReference,
    ) -> Option<Signature> {
        let mut tx = Transaction::new_with_payer(&trailing.instructions, Some(&credential.pubkey()));
        if let Err(e) = tx.try_sign(&[credential], block.blockhash) {
            warn!(error = %e, "Trailing request signing failed");
            return None;
        }
        match self.ledger.send_transaction(&tx, &options.send).await {
            Ok(signature) => {
                debug!(signature = %signature, "Trailing request sent");
                Some(signature)
            }
            Err(e) => {
                warn!(error = %e, "Trailing request failed");
                None
            }
        }
    }

    /// Poll the signature until it reaches `durability`, fails, or its blockhash expires
    async fn confirm(
        &self,
        signature: &Signature,
        block: &BlockReference,
        claimed: u64,
        operation_index: u8,
        durability: Durability,
    ) -> ContinuumResult<u64> {
        let timer = Timer::new();
        let ledger = &self.ledger;

        let result = BoundedWait::new(
            "confirm_transaction",
            self.config.confirm_poll_interval(),
            self.config.confirm_timeout(),
        )
        .target(claimed)
        .run(|| async move {
            let state = match ledger.signature_state(signature).await {
                Ok(state) => state,
                Err(e) => {
                    debug!(signature = %signature, error = %e, "Status poll failed");
                    return Ok(Probe::Pending { observed: None });
                }
            };
            match state {
                Some(state) => match state.err {
                    Some(error) => {
                        let logs = ledger.transaction_logs(signature).await.unwrap_or_else(|e| {
                            warn!(signature = %signature, error = %e, "Could not fetch logs");
                            Vec::new()
                        });
                        let kind = classify_rejection(&error, &logs, operation_index);
                        Err(kind.into_error(claimed, &error, logs))
                    }
                    None if durability.satisfied_by(state.durability) => Ok(Probe::Ready(state.slot)),
                    None => Ok(Probe::Pending { observed: None }),
                },
                None => match ledger.is_blockhash_valid(&block.blockhash).await {
                    Ok(false) => Err(ContinuumError::StaleTransportReference(format!(
                        "blockhash {} expired before {} landed",
                        block.blockhash, signature
                    ))),
                    _ => Ok(Probe::Pending { observed: None }),
                },
            }
        })
        .await;

        match result {
            Ok(slot) => {
                timer.observe_duration(&metrics().confirmation_latency);
                Ok(slot)
            }
            Err(err) => Err(self.with_observed(err).await),
        }
    }

    async fn send_error(&self, err: LedgerError, claimed: u64, operation_index: u8) -> ContinuumError {
        let err = match err {
            LedgerError::Rejected { error, logs } => {
                classify_rejection(&error, &logs, operation_index).into_error(claimed, &error, logs)
            }
            other => ledger_error(other),
        };
        self.with_observed(err).await
    }

    /// Attach the current counter value to a conflict for diagnostics
    async fn with_observed(&self, err: ContinuumError) -> ContinuumError {
        match err {
            ContinuumError::OrdinalConflict { claimed, logs, .. } => ContinuumError::OrdinalConflict {
                claimed,
                observed: self.tracker.fetch_current().await.ok(),
                logs,
            },
            other => other,
        }
    }

    fn journal_attempt(&self, trace: &AttemptTrace, attempt: u32, ordinal: u64, report: &AttemptReport) {
        let Some(journal) = &self.journal else {
            return;
        };
        let (outcome, logs) = match &report.result {
            Ok(slot) => (AttemptOutcome::Accepted { slot: *slot }, Vec::new()),
            Err(err) => (AttemptOutcome::from_error(err), err.logs().to_vec()),
        };
        let record = SubmissionAttempt::new(
            trace.correlation_id,
            attempt,
            ordinal,
            report.signature.map(|s| s.to_string()),
            outcome,
            logs,
        );
        if let Err(e) = journal.record(&record) {
            warn!(error = %e, ordinal, attempt, "Failed to journal submission attempt");
        }
    }
}

/// Prepend compute-budget instructions and sign with a fresh blockhash
///
/// Returns the transaction and the index of the operation instruction in it.
fn sign(
    instructions: &[Instruction],
    credential: &Keypair,
    options: &SubmitOptions,
    block: &BlockReference,
) -> ContinuumResult<(Transaction, u8)> {
    let mut ixs = Vec::with_capacity(instructions.len() + 2);
    if let Some(limit) = options.compute_unit_limit {
        ixs.push(ComputeBudgetInstruction::set_compute_unit_limit(limit));
    }
    if let Some(price) = options.compute_unit_price {
        ixs.push(ComputeBudgetInstruction::set_compute_unit_price(price));
    }
    let operation_index = (ixs.len() + OPERATION_INDEX) as u8;
    ixs.extend_from_slice(instructions);

    let mut tx = Transaction::new_with_payer(&ixs, Some(&credential.pubkey()));
    tx.try_sign(&[credential], block.blockhash)?;
    Ok((tx, operation_index))
}

fn check_owner(owner: Pubkey, credential: &Keypair) -> ContinuumResult<()> {
    if credential.pubkey() != owner {
        return Err(ContinuumError::Configuration(format!(
            "credential {} does not own the source account (owner {})",
            credential.pubkey(),
            owner
        )));
    }
    Ok(())
}

fn ledger_error(err: LedgerError) -> ContinuumError {
    match err {
        LedgerError::Transport(msg) => ContinuumError::Transport(msg),
        LedgerError::Timeout {
            operation,
            timeout_ms,
        } => ContinuumError::Timeout {
            operation,
            elapsed_ms: timeout_ms,
            target: None,
            last_observed: None,
        },
        LedgerError::Rejected { error, logs } => ContinuumError::Rejected {
            reason: error.to_string(),
            logs,
        },
    }
}

fn record_terminal<T>(result: &ContinuumResult<T>) {
    if let Err(err) = result {
        if !err.is_retryable() {
            metrics().record_fatal(err.category());
        }
    }
}
