//! Opportunistic scanner configuration.

use lendbot_core::CoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Order rate = borrower rate × this discount (floored at the tier rate).
    #[serde(default = "default_rate_discount")]
    pub rate_discount: Decimal,

    /// Minutes a tenor stays protected after an opportunistic placement.
    #[serde(default = "default_protection_minutes")]
    pub protection_minutes: u64,

    /// Cap on one order as a share of available funds.
    #[serde(default = "default_max_single_order_ratio")]
    pub max_single_order_ratio: Decimal,

    /// Cap on one order as a share of the borrower's demand.
    #[serde(default = "default_market_amount_ratio")]
    pub market_amount_ratio: Decimal,

    /// Relative margin over our best resting rate required to act.
    #[serde(default = "default_rate_epsilon")]
    pub rate_epsilon: Decimal,

    // --- Priority score ---
    #[serde(default = "default_amount_divisor")]
    pub amount_divisor: Decimal,

    #[serde(default = "default_amount_cap")]
    pub amount_cap: Decimal,

    #[serde(default = "default_period_divisor")]
    pub period_divisor: Decimal,

    /// Tracked borrowers unseen for this long are forgotten.
    #[serde(default = "default_tracking_timeout_secs")]
    pub tracking_timeout_secs: u64,

    #[serde(default = "default_book_pages")]
    pub book_pages: u32,

    #[serde(default = "default_book_depth")]
    pub book_depth: u32,

    /// Annualized improvement over our best rate that marks a placement notable.
    #[serde(default = "default_notable_improvement_apr")]
    pub notable_improvement_apr: Decimal,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            rate_discount: default_rate_discount(),
            protection_minutes: default_protection_minutes(),
            max_single_order_ratio: default_max_single_order_ratio(),
            market_amount_ratio: default_market_amount_ratio(),
            rate_epsilon: default_rate_epsilon(),
            amount_divisor: default_amount_divisor(),
            amount_cap: default_amount_cap(),
            period_divisor: default_period_divisor(),
            tracking_timeout_secs: default_tracking_timeout_secs(),
            book_pages: default_book_pages(),
            book_depth: default_book_depth(),
            notable_improvement_apr: default_notable_improvement_apr(),
        }
    }
}

impl ScannerConfig {
    pub fn protection_ms(&self) -> u64 {
        self.protection_minutes.saturating_mul(60_000)
    }

    pub fn tracking_timeout_ms(&self) -> u64 {
        self.tracking_timeout_secs.saturating_mul(1_000)
    }

    pub fn validate(&self) -> lendbot_core::Result<()> {
        let ratio_ok = |v: Decimal| v > Decimal::ZERO && v <= Decimal::ONE;
        if !ratio_ok(self.rate_discount) {
            return Err(CoreError::InvalidConfig(format!(
                "scanner.rate_discount must be within (0, 1], got {}",
                self.rate_discount
            )));
        }
        if !ratio_ok(self.max_single_order_ratio) || !ratio_ok(self.market_amount_ratio) {
            return Err(CoreError::InvalidConfig(
                "scanner order ratios must be within (0, 1]".into(),
            ));
        }
        if self.rate_epsilon.is_sign_negative() {
            return Err(CoreError::InvalidConfig(
                "scanner.rate_epsilon must not be negative".into(),
            ));
        }
        if self.amount_divisor <= Decimal::ZERO || self.period_divisor <= Decimal::ZERO {
            return Err(CoreError::InvalidConfig(
                "scanner score divisors must be positive".into(),
            ));
        }
        if self.book_pages == 0 || self.book_depth == 0 {
            return Err(CoreError::InvalidConfig(
                "scanner.book_pages and book_depth must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn default_rate_discount() -> Decimal {
    Decimal::new(999, 3) // 0.999
}
fn default_protection_minutes() -> u64 {
    5
}
fn default_max_single_order_ratio() -> Decimal {
    Decimal::new(3, 1) // 0.3
}
fn default_market_amount_ratio() -> Decimal {
    Decimal::new(8, 1) // 0.8
}
fn default_rate_epsilon() -> Decimal {
    Decimal::new(5, 5) // 0.00005
}
fn default_amount_divisor() -> Decimal {
    Decimal::new(10_000, 0)
}
fn default_amount_cap() -> Decimal {
    Decimal::new(5, 0)
}
fn default_period_divisor() -> Decimal {
    Decimal::new(120, 0)
}
fn default_tracking_timeout_secs() -> u64 {
    3600
}
fn default_book_pages() -> u32 {
    5
}
fn default_book_depth() -> u32 {
    100
}
fn default_notable_improvement_apr() -> Decimal {
    Decimal::new(5, 2) // 5% APR
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = ScannerConfig::default();
        assert_eq!(config.rate_discount, dec!(0.999));
        assert_eq!(config.protection_minutes, 5);
        assert_eq!(config.protection_ms(), 300_000);
        assert_eq!(config.max_single_order_ratio, dec!(0.3));
        assert_eq!(config.market_amount_ratio, dec!(0.8));
        assert_eq!(config.rate_epsilon, dec!(0.00005));
        assert_eq!(config.tracking_timeout_ms(), 3_600_000);
        assert_eq!(config.notable_improvement_apr, dec!(0.05));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: ScannerConfig = toml::from_str("protection_minutes = 10\n").unwrap();
        assert_eq!(config.protection_minutes, 10);
        assert_eq!(config.book_pages, 5);
    }

    #[test]
    fn test_validate_rejects_bad_discount() {
        let config = ScannerConfig {
            rate_discount: dec!(1.2),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
