//! Opportunity selection.

use lendbot_core::{BookEntry, Rate, RateTier, RestingOrder, TierTable, DAYS_PER_YEAR};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::config::ScannerConfig;
use crate::demand::{parse_demand, BorrowerDemand};
use crate::tracker::TrackedBorrowers;

/// Demand worth acting on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Opportunity {
    pub demand: BorrowerDemand,
    /// Best tier the demand qualifies for.
    pub tier: RateTier,
    /// Our highest resting rate at scan time, if any order rests.
    pub current_max_rate: Option<Rate>,
    /// Rate the demand had to beat.
    pub threshold: Rate,
}

impl Opportunity {
    /// Borrower rate minus our best resting rate (or the full rate when
    /// nothing rests).
    pub fn improvement(&self) -> Rate {
        self.demand.rate - self.current_max_rate.unwrap_or(Rate::ZERO)
    }

    /// Annualized improvement strictly above `threshold_apr`.
    pub fn is_notable(&self, threshold_apr: Decimal) -> bool {
        self.improvement().inner() * Decimal::from(DAYS_PER_YEAR) > threshold_apr
    }
}

/// Per-scan inputs not owned by the scanner.
#[derive(Debug, Clone, Copy)]
pub struct ScanContext<'a> {
    /// Our resting offers in this currency.
    pub resting: &'a [RestingOrder],
    /// Baseline when nothing rests yet.
    pub dynamic_minimum_rate: Rate,
    /// Periods currently under a protection window.
    pub protected_periods: &'a [u32],
    pub now_ms: u64,
}

/// Outcome of one scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanResult {
    pub demands_seen: usize,
    pub skipped_tracked: usize,
    pub no_matching_tier: usize,
    pub below_threshold: usize,
    pub skipped_protected: usize,
    pub pruned: usize,
    /// Admitted opportunities, best first.
    pub opportunities: Vec<Opportunity>,
    /// The one opportunity to act on.
    pub selected: Option<Opportunity>,
}

/// Stateful scanner for one currency.
#[derive(Debug, Clone)]
pub struct OpportunisticScanner {
    config: ScannerConfig,
    tiers: TierTable,
    tracker: TrackedBorrowers,
}

impl OpportunisticScanner {
    pub fn new(config: ScannerConfig, tiers: TierTable) -> Self {
        let tracker = TrackedBorrowers::new(config.tracking_timeout_ms());
        Self {
            config,
            tiers,
            tracker,
        }
    }

    /// Scan one book snapshot.
    ///
    /// Demand is admitted when it qualifies for a tier and beats our best
    /// resting rate by `rate_epsilon` (or the dynamic minimum when nothing
    /// rests). Admitted demand is tracked so an unimproved repeat is
    /// ignored next time. The best-ranked opportunity outside a protected
    /// period is selected.
    pub fn scan(&mut self, book: &[BookEntry], ctx: &ScanContext<'_>) -> ScanResult {
        let mut result = ScanResult {
            pruned: self.tracker.prune(ctx.now_ms),
            ..Default::default()
        };

        let current_max_rate = ctx.resting.iter().map(|o| o.rate).max();
        let threshold = match current_max_rate {
            Some(max) => max * (Decimal::ONE + self.config.rate_epsilon),
            None => ctx.dynamic_minimum_rate,
        };

        let demand = parse_demand(book, &self.config);
        result.demands_seen = demand.len();

        for d in demand {
            if self.tracker.is_unimproved(&d) {
                result.skipped_tracked += 1;
                continue;
            }
            let Some(tier) = self.tiers.best_match(d.rate, d.period_days) else {
                result.no_matching_tier += 1;
                continue;
            };
            if d.rate <= threshold {
                result.below_threshold += 1;
                continue;
            }
            self.tracker.track(&d, ctx.now_ms);
            result.opportunities.push(Opportunity {
                demand: d,
                tier,
                current_max_rate,
                threshold,
            });
        }

        for opp in &result.opportunities {
            if ctx.protected_periods.contains(&opp.demand.period_days) {
                result.skipped_protected += 1;
                continue;
            }
            result.selected = Some(opp.clone());
            break;
        }

        debug!(
            demands = result.demands_seen,
            skipped_tracked = result.skipped_tracked,
            no_tier = result.no_matching_tier,
            below_threshold = result.below_threshold,
            opportunities = result.opportunities.len(),
            threshold = %threshold,
            "Borrower demand scanned"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendbot_core::{Amount, OfferId, OfferOrigin};
    use rust_decimal_macros::dec;

    fn entry(rate: Decimal, period: u32, amount: Decimal) -> BookEntry {
        BookEntry {
            rate: Rate::new(rate),
            period_days: period,
            count: 1,
            amount,
        }
    }

    fn resting(rate: Decimal, period: u32) -> RestingOrder {
        RestingOrder {
            id: OfferId(1),
            rate: Rate::new(rate),
            period_days: period,
            amount: Amount::from(500),
            origin: OfferOrigin::Ladder,
        }
    }

    fn scanner() -> OpportunisticScanner {
        OpportunisticScanner::new(ScannerConfig::default(), TierTable::default())
    }

    #[test]
    fn test_admits_demand_above_current_max() {
        let mut scanner = scanner();
        let orders = vec![resting(dec!(0.0005), 30)];
        let ctx = ScanContext {
            resting: &orders,
            dynamic_minimum_rate: Rate::new(dec!(0.0002)),
            protected_periods: &[],
            now_ms: 0,
        };
        let book = vec![
            entry(dec!(0.0009), 30, dec!(-20000)),
            entry(dec!(0.0005), 30, dec!(-20000)),
            entry(dec!(0.0020), 30, dec!(50000)),
        ];
        let result = scanner.scan(&book, &ctx);

        assert_eq!(result.demands_seen, 2);
        assert_eq!(result.below_threshold, 1);
        let selected = result.selected.unwrap();
        assert_eq!(selected.demand.rate, Rate::new(dec!(0.0009)));
        assert_eq!(selected.tier.rate, Rate::new(dec!(0.0008)));
        assert_eq!(selected.improvement(), Rate::new(dec!(0.0004)));
        // 0.0004 * 365 = 14.6% > 5%
        assert!(selected.is_notable(dec!(0.05)));
    }

    #[test]
    fn test_unimproved_demand_not_emitted_twice() {
        let mut scanner = scanner();
        let ctx = ScanContext {
            resting: &[],
            dynamic_minimum_rate: Rate::new(dec!(0.0002)),
            protected_periods: &[],
            now_ms: 0,
        };
        let book = vec![entry(dec!(0.0009), 30, dec!(-20000))];

        assert!(scanner.scan(&book, &ctx).selected.is_some());
        let second = scanner.scan(&book, &ctx);
        assert!(second.selected.is_none());
        assert_eq!(second.skipped_tracked, 1);
    }

    #[test]
    fn test_tracking_expires() {
        let mut scanner = scanner();
        let book = vec![entry(dec!(0.0009), 30, dec!(-20000))];
        let ctx = |now_ms| ScanContext {
            resting: &[],
            dynamic_minimum_rate: Rate::new(dec!(0.0002)),
            protected_periods: &[],
            now_ms,
        };

        assert!(scanner.scan(&book, &ctx(0)).selected.is_some());
        let later = scanner.scan(&book, &ctx(3_600_001));
        assert_eq!(later.pruned, 1);
        assert!(later.selected.is_some());
    }

    #[test]
    fn test_no_orders_uses_dynamic_minimum() {
        let mut scanner = scanner();
        let ctx = ScanContext {
            resting: &[],
            dynamic_minimum_rate: Rate::new(dec!(0.0006)),
            protected_periods: &[],
            now_ms: 0,
        };
        // Qualifies for the 0.0005/30d tier but not above 0.0006.
        let book = vec![entry(dec!(0.00055), 30, dec!(-20000))];
        let result = scanner.scan(&book, &ctx);
        assert!(result.selected.is_none());
        assert_eq!(result.below_threshold, 1);
    }

    #[test]
    fn test_no_matching_tier() {
        let mut scanner = scanner();
        let ctx = ScanContext {
            resting: &[],
            dynamic_minimum_rate: Rate::new(dec!(0.0002)),
            protected_periods: &[],
            now_ms: 0,
        };
        // 0.0045 for 150 days exceeds every tier's maximum period.
        let book = vec![entry(dec!(0.0045), 150, dec!(-20000))];
        let result = scanner.scan(&book, &ctx);
        assert_eq!(result.no_matching_tier, 1);
        assert!(result.opportunities.is_empty());
    }

    #[test]
    fn test_epsilon_margin() {
        let mut scanner = scanner();
        let orders = vec![resting(dec!(0.0008), 90)];
        let ctx = ScanContext {
            resting: &orders,
            dynamic_minimum_rate: Rate::new(dec!(0.0002)),
            protected_periods: &[],
            now_ms: 0,
        };
        // Threshold 0.0008 * 1.00005 = 0.00080004
        let book = vec![
            entry(dec!(0.00080004), 30, dec!(-20000)),
            entry(dec!(0.00080005), 60, dec!(-20000)),
        ];
        let result = scanner.scan(&book, &ctx);
        assert_eq!(result.opportunities.len(), 1);
        assert_eq!(result.opportunities[0].demand.period_days, 60);
    }

    #[test]
    fn test_protected_period_skipped_for_next_best() {
        let mut scanner = scanner();
        let ctx = ScanContext {
            resting: &[],
            dynamic_minimum_rate: Rate::new(dec!(0.0002)),
            protected_periods: &[30],
            now_ms: 0,
        };
        let book = vec![
            entry(dec!(0.0012), 30, dec!(-20000)),
            entry(dec!(0.0010), 60, dec!(-20000)),
        ];
        let result = scanner.scan(&book, &ctx);
        assert_eq!(result.opportunities.len(), 2);
        assert_eq!(result.skipped_protected, 1);
        assert_eq!(result.selected.unwrap().demand.period_days, 60);
    }
}
