//! Continuum command line client
//!
//! Reads the ordering counter, waits for turns, and submits sequenced swaps
//! through the configured routes.

#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use continuum_client::{
    config::ClientConfig,
    endpoints,
    journal::SubmissionJournal,
    ledger::{LedgerRpc, SolanaLedger},
    scheduler::{PriorityTier, TimingScheduler},
    sequence::SequenceTracker,
    submitter::{ConflictRetryingSubmitter, SubmissionReceipt},
    wallet::Credential,
    RequestComposer, SwapIntent,
};
use solana_sdk::pubkey::Pubkey;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, or JSON by extension)
    #[arg(short, long, default_value = "continuum.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,

    /// Serve /metrics and /health on the configured port
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current counter value and the next ordinal
    Next,

    /// Block until the counter reaches `target - 1`
    Wait {
        #[arg(long)]
        target: u64,

        /// Overrides tracker.wait_timeout_ms
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Submit a swap through a configured route
    Swap {
        #[arg(long)]
        route: String,

        /// Token account spent
        #[arg(long)]
        source: Pubkey,

        /// Token account receiving the output
        #[arg(long)]
        destination: Pubkey,

        #[arg(long)]
        amount_in: u64,

        #[arg(long, default_value_t = 0)]
        min_out: u64,

        /// Delay to a tier's target slot and send with reduced visibility
        #[arg(long)]
        tier: Option<PriorityTier>,

        /// Revoke the source account's delegate after the swap
        #[arg(long)]
        revoke: bool,
    },

    /// Stream counter changes until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.json_logs);

    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    let config = load_config(&args.config)?;

    let ledger: Arc<dyn LedgerRpc> = Arc::new(SolanaLedger::new(
        &config.rpc.url,
        &config.rpc.ws_url(),
        config.rpc.commitment,
        config.rpc.timeout(),
    ));
    let composer = RequestComposer::new(config.program);
    let tracker = Arc::new(SequenceTracker::new(
        Arc::clone(&ledger),
        composer.counter_address(),
        config.tracker.clone(),
    ));

    if args.metrics {
        let port = config.monitoring.metrics_port;
        let tracker = Arc::clone(&tracker);
        tokio::spawn(async move {
            if let Err(e) = endpoints::endpoint_server(port, tracker).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    match args.command {
        Command::Next => {
            let current = tracker.fetch_current().await?;
            let next = tracker.compute_next().await?;
            println!("counter {}: current {current}, next {next}", tracker.counter_address());
        }
        Command::Wait { target, timeout_ms } => {
            let timeout = timeout_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.tracker.wait_timeout());
            let current = tracker.wait_for_turn(target, timeout).await?;
            println!("turn reached for {target} (counter at {current})");
        }
        Command::Watch => {
            let handle = tracker
                .subscribe(|ordinal| println!("counter -> {ordinal}"))
                .await?;
            info!("Watching {}; Ctrl-C to stop", tracker.counter_address());
            tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
            tracker.unsubscribe(handle);
        }
        Command::Swap {
            route,
            source,
            destination,
            amount_in,
            min_out,
            tier,
            revoke,
        } => {
            let keypair = config
                .wallet
                .keypair
                .as_deref()
                .context("wallet.keypair (or CONTINUUM_KEYPAIR) is required for swaps")?;
            let credential = Credential::from_setting(keypair).context("Failed to load wallet")?;
            info!("Wallet address: {}", credential.pubkey());

            let registry = config.route_registry()?;
            let intent = SwapIntent::new(
                registry.get(&route)?.clone(),
                credential.pubkey(),
                source,
                destination,
                amount_in,
                min_out,
            )?;

            let mut submitter = ConflictRetryingSubmitter::new(
                Arc::clone(&ledger),
                Arc::clone(&tracker),
                composer.clone(),
                config.retry.clone(),
            );
            if let Some(path) = &config.journal_path {
                let journal = SubmissionJournal::open(path)
                    .with_context(|| format!("Failed to open journal at {path}"))?;
                submitter = submitter.with_journal(Arc::new(journal));
            }

            let receipt = match tier {
                None => submitter.submit_intent_with_retry(&intent, credential.keypair()).await?,
                Some(tier) => {
                    let submitter = Arc::new(submitter);
                    let scheduler = TimingScheduler::new(
                        Arc::clone(&ledger),
                        Arc::clone(&submitter),
                        config.scheduler.clone(),
                    );
                    let ordinal = tracker.compute_next().await?;
                    let request = composer.compose(&intent, ordinal)?;
                    let target = scheduler.estimate_target_slot(tier).await?;
                    if revoke {
                        scheduler
                            .schedule_with_trailing(&request, target, credential.keypair(), None)
                            .await?
                    } else {
                        scheduler
                            .schedule_transaction(&request, target, credential.keypair())
                            .await?
                    }
                }
            };
            print_receipt(&receipt);
        }
    }

    Ok(())
}

fn print_receipt(receipt: &SubmissionReceipt) {
    println!(
        "accepted ordinal {} in slot {} after {} attempt(s): {}",
        receipt.ordinal, receipt.slot, receipt.attempts, receipt.signature
    );
    if let Some(trailing) = &receipt.trailing_signature {
        println!("trailing request: {trailing}");
    }
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "continuum_client=debug,continuum=debug,info"
    } else {
        "continuum_client=info,continuum=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

/// File if present, otherwise defaults; environment overrides apply to both
fn load_config(path: &str) -> Result<ClientConfig> {
    let config = if Path::new(path).exists() {
        info!("Loading configuration from: {}", path);
        ClientConfig::load(path)?
    } else {
        info!("No configuration file at {}, using defaults", path);
        ClientConfig::from_env()?
    };
    Ok(config)
}
