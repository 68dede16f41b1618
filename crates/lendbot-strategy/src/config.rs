//! Strategy and fund configuration.

use lendbot_core::{Amount, CoreError, Rate, TenorBucket};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::optimizer::MAX_LADDER_STEPS;

/// Regular ladder strategy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Period used when a ladder rate meets no tier threshold.
    #[serde(default = "default_period_days")]
    pub default_period_days: u32,

    /// Absolute rate floor for the ladder base.
    #[serde(default = "default_minimum_rate")]
    pub minimum_rate: Rate,

    /// Step count before activity/competition bonuses.
    #[serde(default = "default_base_steps")]
    pub base_steps: u32,

    #[serde(default = "default_min_steps")]
    pub min_steps: u32,

    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Sentiment at which the sentiment weight reaches 1.0.
    #[serde(default = "default_highest_sentiment")]
    pub highest_sentiment: Decimal,

    /// Per-step rate growth used to derive the guess rate.
    #[serde(default = "default_rate_adjustment_ratio")]
    pub rate_adjustment_ratio: Decimal,

    /// Dynamic safety factor, Fibonacci distribution and dynamic minimum.
    /// When false: base steps, uniform shares, static safety factor.
    #[serde(default = "default_true")]
    pub dynamic_optimization: bool,

    /// Raise market activity to 1.0 when a borrowing panic is detected.
    #[serde(default = "default_true")]
    pub panic_detection: bool,

    /// Market activity score in [0, 1].
    #[serde(default = "default_half")]
    pub market_activity: Decimal,

    /// Competition density score in [0, 1].
    #[serde(default = "default_half")]
    pub competition_density: Decimal,

    /// Rolling history length (cycles) kept per currency.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Number of most recent candle highs used for volatility.
    #[serde(default = "default_volatility_window")]
    pub volatility_window: usize,

    /// Funding book pages fetched per pass.
    #[serde(default = "default_book_pages")]
    pub book_pages: u32,

    /// Rows per funding book page.
    #[serde(default = "default_book_depth")]
    pub book_depth: u32,

    /// Candle aggregation key (e.g. `a30:p2:p30`).
    #[serde(default = "default_candle_key")]
    pub candle_key: String,

    /// Safety factor applied to last-hour high when dynamic optimization is off.
    #[serde(default = "default_static_safety_factor")]
    pub static_safety_factor: Decimal,

    /// Book aggregation buckets, ascending.
    #[serde(default = "TenorBucket::defaults")]
    pub tenor_buckets: Vec<TenorBucket>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            default_period_days: default_period_days(),
            minimum_rate: default_minimum_rate(),
            base_steps: default_base_steps(),
            min_steps: default_min_steps(),
            max_steps: default_max_steps(),
            highest_sentiment: default_highest_sentiment(),
            rate_adjustment_ratio: default_rate_adjustment_ratio(),
            dynamic_optimization: true,
            panic_detection: true,
            market_activity: default_half(),
            competition_density: default_half(),
            history_window: default_history_window(),
            volatility_window: default_volatility_window(),
            book_pages: default_book_pages(),
            book_depth: default_book_depth(),
            candle_key: default_candle_key(),
            static_safety_factor: default_static_safety_factor(),
            tenor_buckets: TenorBucket::defaults(),
        }
    }
}

impl StrategyConfig {
    /// Reject configurations the ladder cannot run with.
    pub fn validate(&self) -> lendbot_core::Result<()> {
        let invalid = |msg: String| Err(CoreError::InvalidConfig(msg));

        if self.default_period_days == 0 {
            return invalid("strategy.default_period_days must be positive".into());
        }
        if !self.minimum_rate.is_positive() {
            return invalid(format!(
                "strategy.minimum_rate must be positive, got {}",
                self.minimum_rate
            ));
        }
        if self.min_steps == 0 || self.min_steps > self.max_steps {
            return invalid(format!(
                "strategy steps must satisfy 0 < min_steps <= max_steps, got {}..{}",
                self.min_steps, self.max_steps
            ));
        }
        if self.base_steps == 0 {
            return invalid("strategy.base_steps must be positive".into());
        }
        if self.max_steps > MAX_LADDER_STEPS || self.base_steps > MAX_LADDER_STEPS {
            return invalid(format!(
                "strategy steps are capped at {MAX_LADDER_STEPS}, got base_steps={} max_steps={}",
                self.base_steps, self.max_steps
            ));
        }
        if self.highest_sentiment <= Decimal::ZERO {
            return invalid("strategy.highest_sentiment must be positive".into());
        }
        if self.rate_adjustment_ratio < Decimal::ONE {
            return invalid(format!(
                "strategy.rate_adjustment_ratio must be >= 1, got {}",
                self.rate_adjustment_ratio
            ));
        }
        for (name, v) in [
            ("market_activity", self.market_activity),
            ("competition_density", self.competition_density),
        ] {
            if v < Decimal::ZERO || v > Decimal::ONE {
                return invalid(format!("strategy.{name} must be within [0, 1], got {v}"));
            }
        }
        if self.static_safety_factor <= Decimal::ZERO || self.static_safety_factor > Decimal::ONE {
            return invalid(format!(
                "strategy.static_safety_factor must be within (0, 1], got {}",
                self.static_safety_factor
            ));
        }
        if self.history_window < 3 {
            return invalid("strategy.history_window must be at least 3".into());
        }
        if self.volatility_window < 2 {
            return invalid("strategy.volatility_window must be at least 2".into());
        }
        if self.book_pages == 0 || self.book_depth == 0 {
            return invalid("strategy.book_pages and book_depth must be positive".into());
        }
        TenorBucket::validate_set(&self.tenor_buckets)
    }
}

/// Wallet usage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundsConfig {
    /// Smallest order the exchange accepts.
    #[serde(default = "default_minimum_order")]
    pub minimum_order: Amount,

    /// Balance kept out of the ladder.
    #[serde(default)]
    pub retained: Amount,
}

impl Default for FundsConfig {
    fn default() -> Self {
        Self {
            minimum_order: default_minimum_order(),
            retained: Amount::ZERO,
        }
    }
}

impl FundsConfig {
    pub fn validate(&self) -> lendbot_core::Result<()> {
        if !self.minimum_order.is_positive() {
            return Err(CoreError::InvalidConfig(
                "funds.minimum_order must be positive".into(),
            ));
        }
        if self.retained.inner().is_sign_negative() {
            return Err(CoreError::InvalidConfig(
                "funds.retained must not be negative".into(),
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}
fn default_period_days() -> u32 {
    2
}
fn default_minimum_rate() -> Rate {
    Rate::new(Decimal::new(2, 4)) // 0.0002 = 7.3% APR
}
fn default_base_steps() -> u32 {
    3
}
fn default_min_steps() -> u32 {
    3
}
fn default_max_steps() -> u32 {
    7
}
fn default_highest_sentiment() -> Decimal {
    Decimal::new(8, 0)
}
fn default_rate_adjustment_ratio() -> Decimal {
    Decimal::new(107, 2) // 1.07
}
fn default_half() -> Decimal {
    Decimal::new(5, 1)
}
fn default_history_window() -> usize {
    24
}
fn default_volatility_window() -> usize {
    5
}
fn default_book_pages() -> u32 {
    5
}
fn default_book_depth() -> u32 {
    100
}
fn default_candle_key() -> String {
    "a30:p2:p30".to_string()
}
fn default_static_safety_factor() -> Decimal {
    Decimal::new(95, 2)
}
fn default_minimum_order() -> Amount {
    Amount::new(Decimal::new(150, 0))
}
