//! Route configuration: the venue accounts an operation is directed to
//!
//! Routes are provisioned out of band and arrive as base58 strings. They are
//! parsed once, up front, so a malformed route fails before any network call.

use crate::errors::{ContinuumError, ContinuumResult};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::str::FromStr;

/// Which authority signs the venue CPI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityMode {
    /// Venue keeps its own authority; the delegate handle signs
    #[default]
    Default,
    /// Venue authority was transferred to the ordering program's pool authority handle
    PoolAuthority,
}

/// Parsed venue route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    pub name: String,
    pub mode: AuthorityMode,
    pub amm_id: Pubkey,
    pub amm_authority: Pubkey,
    pub open_orders: Pubkey,
    pub target_orders: Pubkey,
    pub coin_vault: Pubkey,
    pub pc_vault: Pubkey,
    pub market_program: Pubkey,
    pub market: Pubkey,
    pub bids: Pubkey,
    pub asks: Pubkey,
    pub event_queue: Pubkey,
    pub market_coin_vault: Pubkey,
    pub market_pc_vault: Pubkey,
    pub vault_signer: Pubkey,
}

/// Route as stored in configuration files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteConfigEntry {
    pub name: String,
    #[serde(default)]
    pub mode: AuthorityMode,
    pub amm_id: Option<String>,
    pub amm_authority: Option<String>,
    pub open_orders: Option<String>,
    pub target_orders: Option<String>,
    pub coin_vault: Option<String>,
    pub pc_vault: Option<String>,
    pub market_program: Option<String>,
    pub market: Option<String>,
    pub bids: Option<String>,
    pub asks: Option<String>,
    pub event_queue: Option<String>,
    pub market_coin_vault: Option<String>,
    pub market_pc_vault: Option<String>,
    pub vault_signer: Option<String>,
}

impl TryFrom<&RouteConfigEntry> for RouteConfig {
    type Error = ContinuumError;

    fn try_from(entry: &RouteConfigEntry) -> ContinuumResult<Self> {
        if entry.name.trim().is_empty() {
            return Err(ContinuumError::config_field("routes[].name", "missing"));
        }
        let field = |name: &str, value: &Option<String>| parse_field(&entry.name, name, value);

        Ok(Self {
            name: entry.name.clone(),
            mode: entry.mode,
            amm_id: field("amm_id", &entry.amm_id)?,
            amm_authority: field("amm_authority", &entry.amm_authority)?,
            open_orders: field("open_orders", &entry.open_orders)?,
            target_orders: field("target_orders", &entry.target_orders)?,
            coin_vault: field("coin_vault", &entry.coin_vault)?,
            pc_vault: field("pc_vault", &entry.pc_vault)?,
            market_program: field("market_program", &entry.market_program)?,
            market: field("market", &entry.market)?,
            bids: field("bids", &entry.bids)?,
            asks: field("asks", &entry.asks)?,
            event_queue: field("event_queue", &entry.event_queue)?,
            market_coin_vault: field("market_coin_vault", &entry.market_coin_vault)?,
            market_pc_vault: field("market_pc_vault", &entry.market_pc_vault)?,
            vault_signer: field("vault_signer", &entry.vault_signer)?,
        })
    }
}

fn parse_field(route: &str, field: &str, value: &Option<String>) -> ContinuumResult<Pubkey> {
    let path = format!("routes.{route}.{field}");
    let raw = value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ContinuumError::config_field(&path, "missing"))?;
    let key = Pubkey::from_str(raw)
        .map_err(|e| ContinuumError::config_field(&path, format!("invalid address {raw:?}: {e}")))?;
    if key == Pubkey::default() {
        return Err(ContinuumError::config_field(&path, "all-zero address"));
    }
    Ok(key)
}

impl RouteConfig {
    /// Venue pool identity; the pool-authority handles derive from it
    pub fn pool_id(&self) -> Pubkey {
        self.amm_id
    }
}

/// Named routes, looked up by name or by pool id
#[derive(Debug, Clone, Default)]
pub struct RouteRegistry {
    by_name: HashMap<String, RouteConfig>,
}

impl RouteRegistry {
    pub fn from_entries(entries: &[RouteConfigEntry]) -> ContinuumResult<Self> {
        let mut by_name = HashMap::with_capacity(entries.len());
        for entry in entries {
            let route = RouteConfig::try_from(entry)?;
            if by_name.insert(route.name.clone(), route).is_some() {
                return Err(ContinuumError::config_field(
                    &format!("routes.{}", entry.name),
                    "duplicate route name",
                ));
            }
        }
        Ok(Self { by_name })
    }

    pub fn insert(&mut self, route: RouteConfig) {
        self.by_name.insert(route.name.clone(), route);
    }

    pub fn get(&self, name: &str) -> ContinuumResult<&RouteConfig> {
        self.by_name
            .get(name)
            .ok_or_else(|| ContinuumError::Configuration(format!("unknown route {name:?}")))
    }

    pub fn by_pool(&self, pool_id: &Pubkey) -> ContinuumResult<&RouteConfig> {
        self.by_name
            .values()
            .find(|r| r.pool_id() == *pool_id)
            .ok_or_else(|| ContinuumError::Configuration(format!("no route for pool {pool_id}")))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Route entry with fresh unique addresses, for tests and benches
#[cfg(any(test, feature = "test_utils"))]
pub fn sample_entry(name: &str) -> RouteConfigEntry {
    let key = || Some(Pubkey::new_unique().to_string());
    RouteConfigEntry {
        name: name.to_string(),
        mode: AuthorityMode::Default,
        amm_id: key(),
        amm_authority: key(),
        open_orders: key(),
        target_orders: key(),
        coin_vault: key(),
        pc_vault: key(),
        market_program: key(),
        market: key(),
        bids: key(),
        asks: key(),
        event_queue: key(),
        market_coin_vault: key(),
        market_pc_vault: key(),
        vault_signer: key(),
    }
}
