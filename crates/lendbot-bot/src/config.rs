//! Application configuration.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use lendbot_core::{Currency, TierTable};
use lendbot_exchange::{Credentials, ExchangeConfig};
use lendbot_scanner::ScannerConfig;
use lendbot_strategy::{FundsConfig, StrategyConfig};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "BFX_API_KEY";
/// Environment variable holding the API secret.
pub const API_SECRET_ENV: &str = "BFX_API_SECRET";

/// Operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    /// Compute and log every plan, never submit or cancel.
    #[default]
    Observation,
    /// Live order management.
    Trading,
}

/// Task intervals and pauses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_strategy_interval_secs")]
    pub strategy_interval_secs: u64,

    #[serde(default = "default_opportunistic_interval_secs")]
    pub opportunistic_interval_secs: u64,

    #[serde(default = "default_credit_check_interval_secs")]
    pub credit_check_interval_secs: u64,

    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,

    /// Pause after cancellations before the balance is read.
    #[serde(default = "default_cancel_settle_ms")]
    pub cancel_settle_ms: u64,

    /// Pause after each submitted offer.
    #[serde(default = "default_submit_pause_ms")]
    pub submit_pause_ms: u64,

    /// Pause after freeing capital for an opportunity.
    #[serde(default = "default_opportunistic_settle_ms")]
    pub opportunistic_settle_ms: u64,

    /// Cancel everything when the local hour is a multiple of this (0 = never).
    #[serde(default = "default_full_reset_every_hours")]
    pub full_reset_every_hours: u32,

    /// Minute of the hour at which the full reset fires.
    #[serde(default = "default_full_reset_minute")]
    pub full_reset_minute: u32,

    /// Cancel every resting offer before the first strategy pass.
    #[serde(default = "default_true")]
    pub reset_on_startup: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            strategy_interval_secs: default_strategy_interval_secs(),
            opportunistic_interval_secs: default_opportunistic_interval_secs(),
            credit_check_interval_secs: default_credit_check_interval_secs(),
            status_interval_secs: default_status_interval_secs(),
            cancel_settle_ms: default_cancel_settle_ms(),
            submit_pause_ms: default_submit_pause_ms(),
            opportunistic_settle_ms: default_opportunistic_settle_ms(),
            full_reset_every_hours: default_full_reset_every_hours(),
            full_reset_minute: default_full_reset_minute(),
            reset_on_startup: true,
        }
    }
}

impl ScheduleConfig {
    /// Pauses all set to zero, for tests and dry runs.
    pub fn without_pauses(mut self) -> Self {
        self.cancel_settle_ms = 0;
        self.submit_pause_ms = 0;
        self.opportunistic_settle_ms = 0;
        self
    }

    pub fn strategy_interval(&self) -> Duration {
        Duration::from_secs(self.strategy_interval_secs)
    }

    pub fn opportunistic_interval(&self) -> Duration {
        Duration::from_secs(self.opportunistic_interval_secs)
    }

    pub fn credit_check_interval(&self) -> Duration {
        Duration::from_secs(self.credit_check_interval_secs)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    fn validate(&self) -> AppResult<()> {
        for (name, secs) in [
            ("strategy_interval_secs", self.strategy_interval_secs),
            ("opportunistic_interval_secs", self.opportunistic_interval_secs),
            ("credit_check_interval_secs", self.credit_check_interval_secs),
            ("status_interval_secs", self.status_interval_secs),
        ] {
            if secs == 0 {
                return Err(AppError::Config(format!("schedule.{name} must be positive")));
            }
        }
        if self.full_reset_every_hours > 24 {
            return Err(AppError::Config(
                "schedule.full_reset_every_hours must be within 0..=24".into(),
            ));
        }
        if self.full_reset_minute > 59 {
            return Err(AppError::Config(
                "schedule.full_reset_minute must be within 0..=59".into(),
            ));
        }
        Ok(())
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub mode: OperatingMode,

    /// Funding currencies to lend (e.g. "USD" or "fUSD").
    #[serde(default = "default_currencies")]
    pub currencies: Vec<Currency>,

    #[serde(default)]
    pub funds: FundsConfig,

    /// Rate thresholds mapped to the longest period they justify.
    #[serde(default)]
    pub tiers: TierTable,

    #[serde(default)]
    pub strategy: StrategyConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub exchange: ExchangeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: OperatingMode::Observation,
            currencies: default_currencies(),
            funds: FundsConfig::default(),
            tiers: TierTable::default(),
            strategy: StrategyConfig::default(),
            scanner: ScannerConfig::default(),
            schedule: ScheduleConfig::default(),
            exchange: ExchangeConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Reject configurations the bot cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.currencies.is_empty() {
            return Err(AppError::Config("at least one currency is required".into()));
        }
        let mut seen = HashSet::new();
        for currency in &self.currencies {
            if !seen.insert(currency) {
                return Err(AppError::Config(format!("duplicate currency {currency}")));
            }
        }
        self.funds.validate()?;
        self.strategy.validate()?;
        self.scanner.validate()?;
        self.schedule.validate()?;
        Ok(())
    }

    pub fn is_observation_mode(&self) -> bool {
        self.mode == OperatingMode::Observation
    }

    /// Credentials from `BFX_API_KEY` / `BFX_API_SECRET`, if both are set.
    pub fn credentials_from_env() -> Option<Credentials> {
        let key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())?;
        let secret = std::env::var(API_SECRET_ENV).ok().filter(|s| !s.is_empty())?;
        Some(Credentials::new(key, secret))
    }
}

fn default_currencies() -> Vec<Currency> {
    Currency::parse("USD").into_iter().collect()
}
fn default_strategy_interval_secs() -> u64 {
    300
}
fn default_opportunistic_interval_secs() -> u64 {
    10
}
fn default_credit_check_interval_secs() -> u64 {
    30
}
fn default_status_interval_secs() -> u64 {
    3600
}
fn default_cancel_settle_ms() -> u64 {
    1000
}
fn default_submit_pause_ms() -> u64 {
    100
}
fn default_opportunistic_settle_ms() -> u64 {
    2000
}
fn default_full_reset_every_hours() -> u32 {
    6
}
fn default_full_reset_minute() -> u32 {
    6
}
fn default_true() -> bool {
    true
}
