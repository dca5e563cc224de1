//! Configuration module for the sequenced swap client
//!
//! Loads `ClientConfig` from TOML or JSON, applies `CONTINUUM_*` environment
//! overrides (a `.env` file is honoured), and validates everything that can
//! be checked before the first network call.

use crate::composer::{ProgramIds, RouteConfigEntry, RouteRegistry};
use crate::errors::{ContinuumError, ContinuumResult};
use crate::ledger::Durability;
use crate::scheduler::SchedulerConfig;
use crate::sequence::TrackerConfig;
use crate::submitter::RetryConfig;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_RPC_URL: &str = "CONTINUUM_RPC_URL";
pub const ENV_WS_URL: &str = "CONTINUUM_WS_URL";
pub const ENV_KEYPAIR: &str = "CONTINUUM_KEYPAIR";
pub const ENV_PROGRAM_ID: &str = "CONTINUUM_PROGRAM_ID";

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Ordering, venue and token program identities
    #[serde(default)]
    pub program: ProgramIds,

    #[serde(default)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub wallet: WalletConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// Named venue routes
    #[serde(default)]
    pub routes: Vec<RouteConfigEntry>,

    /// Optional submission journal directory
    #[serde(default)]
    pub journal_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// Pubsub endpoint; derived from `url` when absent
    #[serde(default)]
    pub ws_url: Option<String>,

    #[serde(default)]
    pub commitment: Durability,

    /// Bound on every RPC call
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Keypair file path or base58 secret key
    #[serde(default)]
    pub keypair: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

fn default_rpc_url() -> String { "https://api.mainnet-beta.solana.com".to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_metrics_port() -> u16 { 9090 }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            ws_url: None,
            commitment: Durability::default(),
            timeout_secs: default_rpc_timeout(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            program: ProgramIds::default(),
            tracker: TrackerConfig::default(),
            retry: RetryConfig::default(),
            scheduler: SchedulerConfig::default(),
            wallet: WalletConfig::default(),
            monitoring: MonitoringConfig::default(),
            routes: Vec::new(),
            journal_path: None,
        }
    }
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Explicit `ws_url`, else `url` with its scheme swapped to ws/wss
    pub fn ws_url(&self) -> String {
        if let Some(ws) = &self.ws_url {
            return ws.clone();
        }
        if let Some(rest) = self.url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.url.clone()
        }
    }
}

impl ClientConfig {
    /// Parse a TOML file, or JSON when the extension is `.json`
    pub fn from_file(path: impl AsRef<Path>) -> ContinuumResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ContinuumError::Configuration(format!("reading {}: {e}", path.display()))
        })?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(&content).map_err(|e| {
                ContinuumError::Configuration(format!("parsing {}: {e}", path.display()))
            })
        } else {
            toml::from_str(&content).map_err(|e| {
                ContinuumError::Configuration(format!("parsing {}: {e}", path.display()))
            })
        }
    }

    /// File, then `.env` and process environment overrides, then validation
    pub fn load(path: impl AsRef<Path>) -> ContinuumResult<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file
    pub fn from_env() -> ContinuumResult<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ContinuumResult<()> {
        if let Some(url) = lookup(ENV_RPC_URL) {
            self.rpc.url = url;
        }
        if let Some(ws) = lookup(ENV_WS_URL) {
            self.rpc.ws_url = Some(ws);
        }
        if let Some(keypair) = lookup(ENV_KEYPAIR) {
            self.wallet.keypair = Some(keypair);
        }
        if let Some(program) = lookup(ENV_PROGRAM_ID) {
            self.program.ordering = Pubkey::from_str(program.trim())
                .map_err(|e| ContinuumError::config_field(ENV_PROGRAM_ID, e))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> ContinuumResult<()> {
        if self.rpc.url.trim().is_empty() {
            return Err(ContinuumError::config_field("rpc.url", "missing"));
        }
        if self.rpc.timeout_secs == 0 {
            return Err(ContinuumError::config_field("rpc.timeout_secs", "must be positive"));
        }
        if self.tracker.poll_interval_ms == 0 {
            return Err(ContinuumError::config_field("tracker.poll_interval_ms", "must be positive"));
        }
        if self.retry.max_attempts == 0 {
            return Err(ContinuumError::config_field("retry.max_attempts", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(ContinuumError::config_field("retry.jitter_factor", "must be within 0.0..=1.0"));
        }
        if self.scheduler.slot_duration_ms == 0 {
            return Err(ContinuumError::config_field("scheduler.slot_duration_ms", "must be positive"));
        }
        if self.scheduler.fee_percentile > 100 {
            return Err(ContinuumError::config_field("scheduler.fee_percentile", "must be at most 100"));
        }
        if self.program.ordering == Pubkey::default() {
            return Err(ContinuumError::config_field("program.ordering", "all-zero address"));
        }
        self.route_registry()?;
        Ok(())
    }

    pub fn route_registry(&self) -> ContinuumResult<RouteRegistry> {
        RouteRegistry::from_entries(&self.routes)
    }
}
