//! Sizing and pricing of a single opportunistic offer.

use lendbot_core::{Amount, OfferOrigin, OfferRequest, Rate, RestingOrder};
use serde::Serialize;

use crate::config::ScannerConfig;
use crate::scanner::Opportunity;

/// Offer to place for a selected opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    pub rate: Rate,
    pub amount: Amount,
    pub period_days: u32,
}

impl ExecutionPlan {
    pub fn to_request(&self) -> OfferRequest {
        OfferRequest {
            rate: self.rate,
            amount: self.amount,
            period_days: self.period_days,
            origin: OfferOrigin::Opportunistic,
        }
    }
}

/// Price and size an offer for `opp`.
///
/// Rate undercuts the borrower by `rate_discount` but never drops below the
/// matched tier. Amount is the smaller of the available-funds cap and the
/// demand cap, raised to `minimum_order` and floored to whole units.
/// Returns `None` when `available` cannot cover a minimum order.
pub fn plan_order(
    opp: &Opportunity,
    available: Amount,
    minimum_order: Amount,
    config: &ScannerConfig,
) -> Option<ExecutionPlan> {
    if available < minimum_order {
        return None;
    }

    let rate = (opp.demand.rate * config.rate_discount).max(opp.tier.rate);

    let by_funds = available * config.max_single_order_ratio;
    let by_demand = opp.demand.amount * config.market_amount_ratio;
    let amount = by_funds.min(by_demand).max(minimum_order).floor();

    Some(ExecutionPlan {
        rate,
        amount,
        period_days: opp.demand.period_days,
    })
}

/// Cheapest unprotected resting order priced below `below_rate`.
pub fn capital_to_free<'a>(
    resting: &'a [RestingOrder],
    protected_periods: &[u32],
    below_rate: Rate,
) -> Option<&'a RestingOrder> {
    resting
        .iter()
        .filter(|o| !protected_periods.contains(&o.period_days) && o.rate < below_rate)
        .min_by_key(|o| o.rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::BorrowerDemand;
    use lendbot_core::{OfferId, RateTier};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn opportunity(rate: Decimal, period: u32, amount: u64, tier_rate: Decimal) -> Opportunity {
        Opportunity {
            demand: BorrowerDemand {
                borrower_id: format!("{rate}_{period}_1"),
                rate: Rate::new(rate),
                period_days: period,
                amount: Amount::from(amount),
                order_count: 1,
                priority_score: Decimal::ZERO,
            },
            tier: RateTier::new(Rate::new(tier_rate), 120),
            current_max_rate: None,
            threshold: Rate::ZERO,
        }
    }

    fn order(id: u64, rate: Decimal, period: u32) -> RestingOrder {
        RestingOrder {
            id: OfferId(id),
            rate: Rate::new(rate),
            period_days: period,
            amount: Amount::from(300),
            origin: OfferOrigin::Ladder,
        }
    }

    #[test]
    fn test_plan_discounts_rate() {
        let config = ScannerConfig::default();
        let opp = opportunity(dec!(0.0012), 30, 10_000, dec!(0.0008));
        let plan = plan_order(&opp, Amount::from(2000), Amount::from(150), &config).unwrap();

        assert_eq!(plan.rate, Rate::new(dec!(0.0011988)));
        // min(2000 * 0.3, 10000 * 0.8) = 600
        assert_eq!(plan.amount, Amount::from(600));
        assert_eq!(plan.period_days, 30);
        assert_eq!(plan.to_request().origin, OfferOrigin::Opportunistic);
    }

    #[test]
    fn test_plan_rate_floored_at_tier() {
        let config = ScannerConfig::default();
        let opp = opportunity(dec!(0.001), 120, 10_000, dec!(0.001));
        let plan = plan_order(&opp, Amount::from(2000), Amount::from(150), &config).unwrap();
        assert_eq!(plan.rate, Rate::new(dec!(0.001)));
    }

    #[test]
    fn test_plan_amount_raised_to_minimum() {
        let config = ScannerConfig::default();
        // 200 * 0.8 = 160 vs 300 * 0.3 = 90, raised to 150
        let opp = opportunity(dec!(0.0012), 30, 200, dec!(0.0008));
        let plan = plan_order(&opp, Amount::from(300), Amount::from(150), &config).unwrap();
        assert_eq!(plan.amount, Amount::from(150));
    }

    #[test]
    fn test_plan_amount_floored_to_whole_units() {
        let config = ScannerConfig::default();
        let opp = opportunity(dec!(0.0012), 30, 10_000, dec!(0.0008));
        let plan = plan_order(&opp, Amount::new(dec!(1234.5)), Amount::from(150), &config).unwrap();
        // 1234.5 * 0.3 = 370.35
        assert_eq!(plan.amount, Amount::from(370));
    }

    #[test]
    fn test_plan_insufficient_funds() {
        let config = ScannerConfig::default();
        let opp = opportunity(dec!(0.0012), 30, 10_000, dec!(0.0008));
        assert!(plan_order(&opp, Amount::from(149), Amount::from(150), &config).is_none());
    }

    #[test]
    fn test_capital_to_free_picks_cheapest_unprotected() {
        let resting = vec![
            order(1, dec!(0.0006), 30),
            order(2, dec!(0.0003), 2),
            order(3, dec!(0.0004), 60),
            order(4, dec!(0.0015), 120),
        ];
        let freed = capital_to_free(&resting, &[], Rate::new(dec!(0.001)));
        assert_eq!(freed.map(|o| o.id), Some(OfferId(2)));

        let freed = capital_to_free(&resting, &[2], Rate::new(dec!(0.001)));
        assert_eq!(freed.map(|o| o.id), Some(OfferId(3)));

        assert!(capital_to_free(&resting, &[], Rate::new(dec!(0.0003))).is_none());
    }
}
