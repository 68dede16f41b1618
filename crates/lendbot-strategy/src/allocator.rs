//! Fund allocation.
//!
//! Converts the available balance into whole-unit order sizes for the
//! levels that need creating. Allocated amounts never exceed the balance
//! and are never below the minimum order; a level that cannot be funded is
//! dropped together with every level after it.

use lendbot_core::{Amount, Level, OfferOrigin, OfferRequest};
use rust_decimal::Decimal;
use serde::Serialize;

/// One funded level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedOrder {
    pub level: Level,
    pub amount: Amount,
}

impl PlannedOrder {
    pub fn to_request(&self) -> OfferRequest {
        OfferRequest {
            rate: self.level.rate,
            amount: self.amount,
            period_days: self.level.period_days,
            origin: OfferOrigin::Ladder,
        }
    }
}

/// A level skipped for lack of funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedLevel {
    pub level: Level,
    /// Funds that were left when this level was reached.
    pub remaining: Amount,
}

/// Allocation result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllocationPlan {
    /// Balance after the retained reserve.
    pub available: Amount,
    pub orders: Vec<PlannedOrder>,
    pub dropped: Vec<DroppedLevel>,
}

impl AllocationPlan {
    pub fn total(&self) -> Amount {
        self.orders.iter().map(|o| o.amount).sum()
    }

    pub fn is_insufficient(&self) -> bool {
        !self.dropped.is_empty()
    }
}

/// Balance usable by the ladder: `max(0, balance - retained)`.
pub fn available_funds(balance: Amount, retained: Amount) -> Amount {
    (balance - retained).non_negative()
}

/// Size each level from `available` funds.
///
/// Targets are `max(floor(available * share), minimum)`. When they
/// overshoot, the excess is taken back from the last level first, never
/// below the minimum. Orders then draw sequentially from what remains and
/// the final level takes everything left.
pub fn allocate(available: Amount, levels: &[Level], minimum_order: Amount) -> AllocationPlan {
    let mut plan = AllocationPlan {
        available,
        ..Default::default()
    };
    if levels.is_empty() {
        return plan;
    }

    let avail_int = available.floor().inner();
    let minimum = minimum_order.inner();
    if avail_int < minimum {
        plan.dropped = levels
            .iter()
            .map(|level| DroppedLevel {
                level: level.clone(),
                remaining: Amount::new(avail_int),
            })
            .collect();
        return plan;
    }

    let mut targets: Vec<Decimal> = levels
        .iter()
        .map(|l| (avail_int * l.fund_share).floor().max(minimum))
        .collect();

    let total: Decimal = targets.iter().sum();
    if total > avail_int {
        let mut excess = total - avail_int;
        for target in targets.iter_mut().rev() {
            let cut = excess.min(*target - minimum);
            *target -= cut;
            excess -= cut;
            if excess <= Decimal::ZERO {
                break;
            }
        }
    }

    let mut remaining = avail_int;
    let last = levels.len() - 1;
    for (i, (level, target)) in levels.iter().zip(targets).enumerate() {
        let amount = if i == last {
            remaining
        } else {
            target.min(remaining)
        };
        if amount < minimum {
            plan.dropped.extend(levels[i..].iter().map(|l| DroppedLevel {
                level: l.clone(),
                remaining: Amount::new(remaining),
            }));
            break;
        }
        plan.orders.push(PlannedOrder {
            level: level.clone(),
            amount: Amount::new(amount),
        });
        remaining -= amount;
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendbot_core::Rate;
    use rust_decimal_macros::dec;

    fn level(rate: Decimal, share: Decimal) -> Level {
        Level {
            rate: Rate::new(rate),
            period_days: 2,
            fund_share: share,
        }
    }

    fn amounts(plan: &AllocationPlan) -> Vec<Decimal> {
        plan.orders.iter().map(|o| o.amount.inner()).collect()
    }

    #[test]
    fn test_exact_split() {
        let levels = vec![
            level(dec!(0.0003), dec!(0.5)),
            level(dec!(0.0004), dec!(0.3)),
            level(dec!(0.0005), dec!(0.2)),
        ];
        let plan = allocate(Amount::from(1000), &levels, Amount::from(150));
        assert_eq!(amounts(&plan), vec![dec!(500), dec!(300), dec!(200)]);
        assert!(plan.dropped.is_empty());
        assert_eq!(plan.total(), Amount::from(1000));
    }

    #[test]
    fn test_last_level_absorbs_remainder() {
        let levels = vec![
            level(dec!(0.0003), dec!(0.33)),
            level(dec!(0.0004), dec!(0.33)),
            level(dec!(0.0005), dec!(0.33)),
        ];
        let plan = allocate(Amount::new(dec!(1000.75)), &levels, Amount::from(150));
        assert_eq!(amounts(&plan), vec![dec!(330), dec!(330), dec!(340)]);
    }

    #[test]
    fn test_targets_floored_up_to_minimum_then_reduced_from_last() {
        // Targets: max(50,150)=150, max(100,150)=150, 350 → 650 > 500.
        let levels = vec![
            level(dec!(0.0003), dec!(0.1)),
            level(dec!(0.0004), dec!(0.2)),
            level(dec!(0.0005), dec!(0.7)),
        ];
        let plan = allocate(Amount::from(500), &levels, Amount::from(150));
        assert_eq!(amounts(&plan), vec![dec!(150), dec!(150), dec!(200)]);
        assert_eq!(plan.total(), Amount::from(500));
    }

    #[test]
    fn test_unfundable_tail_is_dropped() {
        let levels = vec![
            level(dec!(0.0003), dec!(0.2)),
            level(dec!(0.0004), dec!(0.3)),
            level(dec!(0.0005), dec!(0.5)),
        ];
        let plan = allocate(Amount::from(400), &levels, Amount::from(150));
        assert_eq!(amounts(&plan), vec![dec!(150), dec!(150)]);
        assert_eq!(plan.dropped.len(), 1);
        assert_eq!(plan.dropped[0].remaining, Amount::from(100));
        assert!(plan.is_insufficient());
    }

    #[test]
    fn test_insufficient_balance_drops_everything() {
        let levels = vec![level(dec!(0.0003), dec!(1))];
        let plan = allocate(Amount::from(149), &levels, Amount::from(150));
        assert!(plan.orders.is_empty());
        assert_eq!(plan.dropped.len(), 1);
    }

    #[test]
    fn test_conservation_across_balances() {
        let levels = vec![
            level(dec!(0.0003), dec!(0.125)),
            level(dec!(0.0004), dec!(0.125)),
            level(dec!(0.0005), dec!(0.25)),
            level(dec!(0.0006), dec!(0.5)),
        ];
        for balance in [0u64, 150, 299, 300, 451, 600, 777, 1000, 12345] {
            let plan = allocate(Amount::from(balance), &levels, Amount::from(150));
            assert!(plan.total() <= Amount::from(balance), "overspent at {balance}");
            assert!(plan
                .orders
                .iter()
                .all(|o| o.amount >= Amount::from(150)));
            assert_eq!(plan.orders.len() + plan.dropped.len(), levels.len());
        }
    }

    #[test]
    fn test_available_funds_respects_reserve() {
        assert_eq!(
            available_funds(Amount::from(1000), Amount::from(200)),
            Amount::from(800)
        );
        assert_eq!(
            available_funds(Amount::from(100), Amount::from(200)),
            Amount::ZERO
        );
    }

    #[test]
    fn test_planned_order_request_is_tagged_ladder() {
        let order = PlannedOrder {
            level: level(dec!(0.0004), dec!(1)),
            amount: Amount::from(150),
        };
        let request = order.to_request();
        assert_eq!(request.origin, OfferOrigin::Ladder);
        assert_eq!(request.amount, Amount::from(150));
    }
}
