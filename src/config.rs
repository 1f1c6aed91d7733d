//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The admin code is referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;

use crate::types::OddsMode;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub odds: OddsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LedgerConfig {
    /// Tokens credited to every new account.
    pub starting_balance: Decimal,
    pub state_file: String,
    pub leaderboard_size: usize,
    /// Name of the env var holding the admin promotion code.
    pub admin_code_env: Option<String>,
    /// Login sessions expire this many seconds after they were issued.
    pub session_ttl_secs: u64,
}

/// Longest accepted session lifetime (ten years).
const MAX_SESSION_TTL_SECS: u64 = 10 * 365 * 24 * 3600;

impl LedgerConfig {
    pub fn session_ttl(&self) -> chrono::Duration {
        // Clamped, so the cast cannot wrap.
        chrono::Duration::seconds(self.session_ttl_secs.min(MAX_SESSION_TTL_SECS) as i64)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: dec!(1000),
            state_file: "betbook_state.json".to_string(),
            leaderboard_size: 3,
            admin_code_env: Some("BETBOOK_ADMIN_CODE".to_string()),
            session_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OddsConfig {
    /// Mode used when an event is created without an explicit one.
    pub default_mode: OddsMode,
    /// House edge applied to dynamic odds (0.05 = 5%).
    pub margin: Decimal,
    /// Dynamic odds never drop below this.
    pub minimum_cote: Decimal,
    /// Cote reported for options without stake, and for fixed options
    /// created without one.
    pub default_cote: Decimal,
    /// Upper bound for cotes set explicitly on fixed-odds options.
    pub max_cote: Decimal,
}

impl Default for OddsConfig {
    fn default() -> Self {
        Self {
            default_mode: OddsMode::Dynamic,
            margin: dec!(0.05),
            minimum_cote: dec!(1.05),
            default_cote: dec!(1.05),
            max_cote: dec!(1000),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        anyhow::ensure!(
            config.odds.margin >= Decimal::ZERO && config.odds.margin < Decimal::ONE,
            "odds.margin must be in [0, 1)"
        );
        anyhow::ensure!(
            config.odds.default_cote > Decimal::ZERO && config.odds.minimum_cote > Decimal::ZERO,
            "odds cotes must be positive"
        );
        anyhow::ensure!(
            config.odds.max_cote >= config.odds.default_cote
                && config.odds.max_cote >= config.odds.minimum_cote,
            "odds.max_cote must not be below the default or minimum cote"
        );
        anyhow::ensure!(
            config.ledger.starting_balance >= Decimal::ZERO
                && config.ledger.starting_balance.fract().is_zero(),
            "ledger.starting_balance must be a non-negative whole number"
        );
        anyhow::ensure!(
            config.ledger.session_ttl_secs > 0,
            "ledger.session_ttl_secs must be positive"
        );
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// The admin promotion code, if one is configured in the environment.
    pub fn admin_code(&self) -> Option<String> {
        self.ledger
            .admin_code_env
            .as_deref()
            .and_then(|env| Self::resolve_env(env).ok())
            .filter(|code| !code.is_empty())
    }
}
