//! # Inventory Configuration
//!
//! Tunables for the stock engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     APOTHECA_EXPIRING_WINDOW_DAYS=45                                   │
//! │     APOTHECA_ALERT_CACHE_TTL_SECS=0   (disables the alert cache)       │
//! │     APOTHECA_ISSUE_RETRIES=5                                           │
//! │     APOTHECA_ISSUE_RETRY_BACKOFF_MS=25                                 │
//! │     APOTHECA_TX_TIMEOUT_MS=2000                                        │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/apotheca-pos/inventory.toml (Linux)                      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # inventory.toml
//! expiring_window_days = 30
//! alert_cache_ttl_secs = 600
//! issue_retry_attempts = 3
//! issue_retry_backoff_ms = 20
//! transaction_timeout_ms = 5000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use apotheca_core::{DEFAULT_EXPIRING_WINDOW_DAYS, MAX_EXPIRING_WINDOW_DAYS};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};

/// Stock engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Days ahead that count as "expiring soon" on the dashboard.
    /// At most `MAX_EXPIRING_WINDOW_DAYS`.
    pub expiring_window_days: u32,

    /// Lifetime of cached dashboard alerts. 0 disables caching.
    pub alert_cache_ttl_secs: u64,

    /// Attempts for an issuance that hits a concurrent modification.
    pub issue_retry_attempts: u32,

    /// Pause before the first retry, doubled for each further one.
    pub issue_retry_backoff_ms: u64,

    /// Deadline for one issuance transaction.
    pub transaction_timeout_ms: u64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        InventoryConfig {
            expiring_window_days: DEFAULT_EXPIRING_WINDOW_DAYS,
            alert_cache_ttl_secs: 600,
            issue_retry_attempts: 3,
            issue_retry_backoff_ms: 20,
            transaction_timeout_ms: 5_000,
        }
    }
}

impl InventoryConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (inventory.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading inventory config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML file without applying environment overrides.
    pub fn from_file(path: &Path) -> DbResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DbError::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&contents).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> DbResult<()> {
        if self.expiring_window_days > MAX_EXPIRING_WINDOW_DAYS {
            return Err(DbError::Config(format!(
                "expiring_window_days must be at most {MAX_EXPIRING_WINDOW_DAYS}"
            )));
        }

        if self.issue_retry_attempts == 0 {
            return Err(DbError::Config(
                "issue_retry_attempts must be greater than 0".into(),
            ));
        }

        if self.transaction_timeout_ms == 0 {
            return Err(DbError::Config(
                "transaction_timeout_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Some(days) = env_parse::<u32>("APOTHECA_EXPIRING_WINDOW_DAYS") {
            debug!(days, "Overriding expiring window from environment");
            self.expiring_window_days = days;
        }

        if let Some(ttl) = env_parse::<u64>("APOTHECA_ALERT_CACHE_TTL_SECS") {
            self.alert_cache_ttl_secs = ttl;
        }

        if let Some(retries) = env_parse::<u32>("APOTHECA_ISSUE_RETRIES") {
            self.issue_retry_attempts = retries;
        }

        if let Some(ms) = env_parse::<u64>("APOTHECA_ISSUE_RETRY_BACKOFF_MS") {
            self.issue_retry_backoff_ms = ms;
        }

        if let Some(ms) = env_parse::<u64>("APOTHECA_TX_TIMEOUT_MS") {
            self.transaction_timeout_ms = ms;
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "apotheca", "pos")
            .map(|dirs| dirs.config_dir().join("inventory.toml"))
    }

    /// Alert cache lifetime, `None` when caching is disabled.
    pub fn alert_cache_ttl(&self) -> Option<Duration> {
        (self.alert_cache_ttl_secs > 0).then(|| Duration::from_secs(self.alert_cache_ttl_secs))
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }

    /// Pause before retry number `retry` (1-based), capped at one second.
    pub fn retry_backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        Duration::from_millis(self.issue_retry_backoff_ms.saturating_mul(factor).min(1_000))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable environment override");
            None
        }
    }
}
