//! `LedgerRpc` over the nonblocking Solana RPC and pubsub clients

use super::{
    AccountWatch, BlockReference, Durability, LedgerError, LedgerResult, LedgerRpc, SendOptions,
    SignatureState,
};
use async_trait::async_trait;
use futures::StreamExt;
use solana_account_decoder::UiAccountEncoding;
use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    nonblocking::{pubsub_client::PubsubClient, rpc_client::RpcClient},
};
use solana_rpc_client_api::{
    config::{RpcAccountInfoConfig, RpcSendTransactionConfig, RpcTransactionConfig},
    request::{RpcError, RpcResponseErrorData},
};
use solana_sdk::{
    account::Account, hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction,
};
use solana_transaction_status::{TransactionConfirmationStatus, UiTransactionEncoding};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Production ledger client
pub struct SolanaLedger {
    rpc: Arc<RpcClient>,
    ws_url: String,
    durability: Durability,
    timeout: Duration,
}

impl SolanaLedger {
    pub fn new(rpc_url: &str, ws_url: &str, durability: Durability, timeout: Duration) -> Self {
        Self {
            rpc: Arc::new(RpcClient::new_with_timeout_and_commitment(
                rpc_url.to_string(),
                timeout,
                durability.commitment(),
            )),
            ws_url: ws_url.to_string(),
            durability,
            timeout,
        }
    }

    pub fn rpc_client(&self) -> Arc<RpcClient> {
        Arc::clone(&self.rpc)
    }

    /// Bound an RPC future and map its client error
    async fn bounded<T, F>(&self, operation: &str, fut: F) -> LedgerResult<T>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(map_client_error),
            Err(_) => Err(LedgerError::Timeout {
                operation: operation.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

/// Map a client error, keeping typed transaction errors and preflight logs
pub fn map_client_error(err: ClientError) -> LedgerError {
    let logs = match err.kind() {
        ClientErrorKind::RpcError(RpcError::RpcResponseError {
            data: RpcResponseErrorData::SendTransactionPreflightFailure(sim),
            ..
        }) => sim.logs.clone().unwrap_or_default(),
        _ => Vec::new(),
    };

    match err.get_transaction_error() {
        Some(error) => LedgerError::Rejected { error, logs },
        None => LedgerError::Transport(err.to_string()),
    }
}

fn durability_of(status: Option<&TransactionConfirmationStatus>) -> Durability {
    match status {
        Some(TransactionConfirmationStatus::Finalized) => Durability::Finalized,
        Some(TransactionConfirmationStatus::Confirmed) => Durability::Confirmed,
        _ => Durability::Processed,
    }
}

#[async_trait]
impl LedgerRpc for SolanaLedger {
    async fn account_data(&self, address: &Pubkey) -> LedgerResult<Option<Vec<u8>>> {
        let response = self
            .bounded(
                "get_account",
                self.rpc
                    .get_account_with_commitment(address, self.durability.commitment()),
            )
            .await?;
        Ok(response.value.map(|account| account.data))
    }

    async fn latest_blockhash(&self) -> LedgerResult<BlockReference> {
        let (blockhash, last_valid_block_height) = self
            .bounded(
                "get_latest_blockhash",
                self.rpc
                    .get_latest_blockhash_with_commitment(self.durability.commitment()),
            )
            .await?;
        Ok(BlockReference {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn slot(&self) -> LedgerResult<u64> {
        self.bounded(
            "get_slot",
            self.rpc
                .get_slot_with_commitment(Durability::Processed.commitment()),
        )
        .await
    }

    async fn send_transaction(
        &self,
        tx: &Transaction,
        options: &SendOptions,
    ) -> LedgerResult<Signature> {
        let config = RpcSendTransactionConfig {
            skip_preflight: options.skip_preflight,
            preflight_commitment: Some(options.preflight_durability.level()),
            max_retries: options.max_node_retries,
            ..RpcSendTransactionConfig::default()
        };
        self.bounded(
            "send_transaction",
            self.rpc.send_transaction_with_config(tx, config),
        )
        .await
    }

    async fn signature_state(&self, signature: &Signature) -> LedgerResult<Option<SignatureState>> {
        let response = self
            .bounded(
                "get_signature_statuses",
                self.rpc.get_signature_statuses(&[*signature]),
            )
            .await?;
        Ok(response.value.into_iter().next().flatten().map(|status| {
            SignatureState {
                slot: status.slot,
                durability: durability_of(status.confirmation_status.as_ref()),
                err: status.err,
            }
        }))
    }

    async fn transaction_logs(&self, signature: &Signature) -> LedgerResult<Vec<String>> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Json),
            commitment: Some(Durability::Confirmed.commitment()),
            max_supported_transaction_version: Some(0),
        };
        let tx = self
            .bounded(
                "get_transaction",
                self.rpc.get_transaction_with_config(signature, config),
            )
            .await?;
        Ok(tx
            .transaction
            .meta
            .and_then(|meta| Option::<Vec<String>>::from(meta.log_messages))
            .unwrap_or_default())
    }

    async fn is_blockhash_valid(&self, blockhash: &Hash) -> LedgerResult<bool> {
        self.bounded(
            "is_blockhash_valid",
            self.rpc
                .is_blockhash_valid(blockhash, Durability::Processed.commitment()),
        )
        .await
    }

    async fn recent_prioritization_fees(&self, accounts: &[Pubkey]) -> LedgerResult<Vec<u64>> {
        let fees = self
            .bounded(
                "get_recent_prioritization_fees",
                self.rpc.get_recent_prioritization_fees(accounts),
            )
            .await?;
        Ok(fees.into_iter().map(|f| f.prioritization_fee).collect())
    }

    async fn watch_account(&self, address: &Pubkey) -> LedgerResult<AccountWatch> {
        let (tx, rx) = mpsc::unbounded_channel();
        let ws_url = self.ws_url.clone();
        let address = *address;
        let commitment = self.durability.commitment();

        let client = tokio::time::timeout(self.timeout, PubsubClient::new(&ws_url))
            .await
            .map_err(|_| LedgerError::Timeout {
                operation: "pubsub_connect".to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|e| LedgerError::Transport(format!("pubsub connect {ws_url}: {e}")))?;

        let task = tokio::spawn(async move {
            let config = RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(commitment),
                ..RpcAccountInfoConfig::default()
            };
            let (mut stream, unsubscribe) =
                match client.account_subscribe(&address, Some(config)).await {
                    Ok(sub) => sub,
                    Err(e) => {
                        warn!(account = %address, error = %e, "Account subscription failed");
                        return;
                    }
                };

            while let Some(update) = stream.next().await {
                let Some(account) = update.value.decode::<Account>() else {
                    debug!(account = %address, "Undecodable account update skipped");
                    continue;
                };
                if tx.send(account.data).is_err() {
                    break;
                }
            }

            drop(stream);
            unsubscribe().await;
        });

        Ok(AccountWatch {
            updates: rx,
            task: Some(task),
        })
    }
}
