//! Rate-threshold → period table.
//!
//! Shared by the ladder (which maps a computed rate to the longest period
//! whose threshold it meets) and the opportunistic scanner (which matches
//! borrower demand against the same tiers).

use serde::{Deserialize, Serialize};

use crate::decimal::Rate;
use crate::error::{CoreError, Result};
use rust_decimal_macros::dec;

/// One `(rate threshold, days)` tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTier {
    pub rate: Rate,
    pub days: u32,
}

impl RateTier {
    pub fn new(rate: Rate, days: u32) -> Self {
        Self { rate, days }
    }
}

/// Validated tier table sorted by ascending rate threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RateTier>", into = "Vec<RateTier>")]
pub struct TierTable {
    tiers: Vec<RateTier>,
}

impl TierTable {
    /// Build a table, rejecting malformed configuration.
    ///
    /// Tiers are sorted by rate; after sorting both rates and days must be
    /// strictly increasing and positive.
    pub fn new(mut tiers: Vec<RateTier>) -> Result<Self> {
        if tiers.is_empty() {
            return Err(CoreError::InvalidConfig(
                "rate tier table is empty".to_string(),
            ));
        }
        tiers.sort_by(|a, b| a.rate.cmp(&b.rate));

        for tier in &tiers {
            if !tier.rate.is_positive() {
                return Err(CoreError::InvalidConfig(format!(
                    "tier rate must be positive, got {}",
                    tier.rate
                )));
            }
            if tier.days == 0 {
                return Err(CoreError::InvalidConfig(format!(
                    "tier at rate {} has zero days",
                    tier.rate
                )));
            }
        }
        for pair in tiers.windows(2) {
            if pair[1].rate == pair[0].rate {
                return Err(CoreError::InvalidConfig(format!(
                    "duplicate tier rate {}",
                    pair[0].rate
                )));
            }
            if pair[1].days <= pair[0].days {
                return Err(CoreError::InvalidConfig(format!(
                    "tier days must increase with rate: {}d at {} follows {}d at {}",
                    pair[1].days, pair[1].rate, pair[0].days, pair[0].rate
                )));
            }
        }
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[RateTier] {
        &self.tiers
    }

    /// Period for a ladder rate.
    ///
    /// Scans thresholds in ascending order and keeps the last one the rate
    /// meets or exceeds; `default_days` when none is met.
    pub fn period_for_rate(&self, rate: Rate, default_days: u32) -> u32 {
        let mut period = default_days;
        for tier in &self.tiers {
            if rate >= tier.rate {
                period = tier.days;
            } else {
                break;
            }
        }
        period
    }

    /// Highest-threshold tier such that `rate >= tier.rate` and
    /// `period_days <= tier.days`.
    pub fn best_match(&self, rate: Rate, period_days: u32) -> Option<RateTier> {
        self.tiers
            .iter()
            .filter(|t| rate >= t.rate && period_days <= t.days)
            .max_by(|a, b| a.rate.cmp(&b.rate))
            .copied()
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            tiers: vec![
                RateTier::new(Rate::new(dec!(0.0004)), 10),
                RateTier::new(Rate::new(dec!(0.0005)), 30),
                RateTier::new(Rate::new(dec!(0.0006)), 60),
                RateTier::new(Rate::new(dec!(0.0008)), 90),
                RateTier::new(Rate::new(dec!(0.001)), 120),
            ],
        }
    }
}

impl TryFrom<Vec<RateTier>> for TierTable {
    type Error = CoreError;

    fn try_from(value: Vec<RateTier>) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TierTable> for Vec<RateTier> {
    fn from(t: TierTable) -> Self {
        t.tiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate(s: &str) -> Rate {
        s.parse().unwrap()
    }

    #[test]
    fn test_period_for_rate_keeps_last_satisfied() {
        let table = TierTable::default();
        assert_eq!(table.period_for_rate(rate("0.0003"), 2), 2);
        assert_eq!(table.period_for_rate(rate("0.0004"), 2), 10);
        assert_eq!(table.period_for_rate(rate("0.00055"), 2), 30);
        assert_eq!(table.period_for_rate(rate("0.0008"), 2), 90);
        assert_eq!(table.period_for_rate(rate("0.0011"), 2), 120);
        assert_eq!(table.period_for_rate(rate("0.0014"), 2), 120);
    }

    #[test]
    fn test_period_monotonic_in_rate() {
        let table = TierTable::default();
        let mut last = 0;
        for i in 0..200 {
            let r = Rate::new(rust_decimal::Decimal::new(i, 5));
            let p = table.period_for_rate(r, 2);
            assert!(p >= last, "period decreased at rate {r}");
            last = p;
        }
    }

    #[test]
    fn test_best_match_prefers_highest_threshold() {
        let table = TierTable::default();
        // 0.0009 for 30 days meets 0.0004/10? no (30 > 10); 0.0005/30 yes; 0.0006/60 yes; 0.0008/90 yes.
        let best = table.best_match(rate("0.0009"), 30).unwrap();
        assert_eq!(best.rate, rate("0.0008"));
        assert_eq!(best.days, 90);
    }

    #[test]
    fn test_best_match_none_when_period_too_long() {
        let table = TierTable::default();
        assert!(table.best_match(rate("0.002"), 150).is_none());
        assert!(table.best_match(rate("0.0001"), 2).is_none());
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let table = TierTable::new(vec![
            RateTier::new(rate("0.0006"), 60),
            RateTier::new(rate("0.0004"), 10),
        ])
        .unwrap();
        assert_eq!(table.tiers()[0].days, 10);
    }

    #[test]
    fn test_malformed_tables_rejected() {
        assert!(TierTable::new(vec![]).is_err());
        assert!(TierTable::new(vec![RateTier::new(rate("0"), 10)]).is_err());
        assert!(TierTable::new(vec![RateTier::new(rate("0.0004"), 0)]).is_err());
        assert!(TierTable::new(vec![
            RateTier::new(rate("0.0004"), 30),
            RateTier::new(rate("0.0005"), 10),
        ])
        .is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            tiers: TierTable,
        }
        let ok: Wrapper = toml::from_str(
            r#"
tiers = [
  { rate = "0.0004", days = 10 },
  { rate = "0.0005", days = 30 },
]
"#,
        )
        .unwrap();
        assert_eq!(ok.tiers.tiers().len(), 2);

        let bad: std::result::Result<Wrapper, _> = toml::from_str(
            r#"
tiers = [
  { rate = "0.0004", days = 30 },
  { rate = "0.0005", days = 10 },
]
"#,
        );
        assert!(bad.is_err());
    }
}
