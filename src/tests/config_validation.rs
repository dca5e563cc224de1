//! Configuration validation against complete operator-written documents

use crate::composer::{AuthorityMode, RequestComposer, SwapIntent};
use crate::config::ClientConfig;
use crate::ledger::Durability;
use crate::scheduler::PriorityTier;
use crate::sequence::TurnPolicy;
use solana_sdk::pubkey::Pubkey;

fn full_document() -> String {
    let key = || Pubkey::new_unique().to_string();
    format!(
        r#"
journal_path = "/var/lib/continuum/journal"

[rpc]
url = "https://rpc.example.org"
commitment = "finalized"
timeout_secs = 10

[tracker]
poll_interval_ms = 250
wait_timeout_ms = 10000
turn_policy = "lookahead"

[retry]
max_attempts = 5
conflict_backoff_ms = 500
jitter_factor = 0.2

[scheduler]
max_delay_ms = 2000
compute_unit_limit = 300000

[monitoring]
metrics_port = 9191

[[routes]]
name = "sol-usdc"
mode = "pool_authority"
amm_id = "{}"
amm_authority = "{}"
open_orders = "{}"
target_orders = "{}"
coin_vault = "{}"
pc_vault = "{}"
market_program = "{}"
market = "{}"
bids = "{}"
asks = "{}"
event_queue = "{}"
market_coin_vault = "{}"
market_pc_vault = "{}"
vault_signer = "{}"
"#,
        key(),
        key(),
        key(),
        key(),
        key(),
        key(),
        key(),
        key(),
        key(),
        key(),
        key(),
        key(),
        key(),
        key()
    )
}

#[test]
fn test_full_document_parses_and_validates() {
    let config: ClientConfig = toml::from_str(&full_document()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.rpc.commitment, Durability::Finalized);
    assert_eq!(config.rpc.ws_url(), "wss://rpc.example.org");
    assert_eq!(config.tracker.turn_policy, TurnPolicy::Lookahead);
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.confirm_timeout_ms, 60_000);
    assert_eq!(config.scheduler.slot_duration_ms, 400);
    assert_eq!(config.scheduler.compute_unit_limit, Some(300_000));
    assert_eq!(config.monitoring.metrics_port, 9191);
}

#[test]
fn test_configured_route_composes() {
    let config: ClientConfig = toml::from_str(&full_document()).unwrap();
    let registry = config.route_registry().unwrap();
    let route = registry.get("sol-usdc").unwrap().clone();
    assert_eq!(route.mode, AuthorityMode::PoolAuthority);

    let composer = RequestComposer::new(config.program);
    let owner = Pubkey::new_unique();
    let intent = SwapIntent::new(route, owner, Pubkey::new_unique(), Pubkey::new_unique(), 10, 0)
        .unwrap();
    let request = composer.compose(&intent, 1).unwrap();
    let signer_of_record = request.operation().accounts.last().unwrap().pubkey;
    assert_eq!(signer_of_record, request.handles.pool_authority);
}

#[test]
fn test_unknown_route_is_configuration_error() {
    let config: ClientConfig = toml::from_str(&full_document()).unwrap();
    let registry = config.route_registry().unwrap();
    let err = registry.get("sol-bonk").unwrap_err();
    assert_eq!(err.category(), "config");
}

#[test]
fn test_out_of_range_values_rejected() {
    let mut config = ClientConfig::default();
    config.retry.jitter_factor = 1.5;
    assert!(config.validate().is_err());

    let mut config = ClientConfig::default();
    config.scheduler.fee_percentile = 101;
    assert!(config.validate().is_err());

    let mut config = ClientConfig::default();
    config.program.ordering = Pubkey::default();
    assert!(config.validate().is_err());
}

#[test]
fn test_tier_names_in_lowercase() {
    let tier: PriorityTier = serde_json::from_str("\"medium\"").unwrap();
    assert_eq!(tier, PriorityTier::Medium);
    assert_eq!(tier.slot_offset(), 2);
}
