//! Ladder reconciliation.
//!
//! Diffs desired levels against resting orders. Orders in a protected
//! period are set aside untouched; the rest are greedily matched to levels
//! on equal period and rate within [`RATE_TOLERANCE`]. Matching walks levels
//! in ladder order and orders in received order, so an unchanged input
//! always produces the same plan.

use lendbot_core::{Level, Rate, RestingOrder};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Rates closer than this are considered equal.
pub const RATE_TOLERANCE: Decimal = dec!(0.00000001);

/// Reconciliation result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcilePlan {
    /// Unprotected orders matching a desired level.
    pub keep: Vec<RestingOrder>,
    /// Desired levels with no matching order.
    pub create: Vec<Level>,
    /// Unprotected orders matching no desired level.
    pub cancel: Vec<RestingOrder>,
    /// Orders in protected periods, left alone.
    pub protected: Vec<RestingOrder>,
}

impl ReconcilePlan {
    pub fn is_noop(&self) -> bool {
        self.create.is_empty() && self.cancel.is_empty()
    }
}

fn same_slot(level: &Level, rate: Rate, period_days: u32) -> bool {
    level.period_days == period_days && level.rate.approx_eq(rate, RATE_TOLERANCE)
}

/// Diff `desired` against `current`, excluding orders whose period is in
/// `protected_periods`.
///
/// A level is never created twice, nor created on top of a kept or
/// protected order with the same rate and period.
pub fn reconcile(
    desired: &[Level],
    current: &[RestingOrder],
    protected_periods: &[u32],
) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();

    let mut unmatched: Vec<Option<&RestingOrder>> = Vec::with_capacity(current.len());
    for order in current {
        if protected_periods.contains(&order.period_days) {
            plan.protected.push(order.clone());
        } else {
            unmatched.push(Some(order));
        }
    }

    for level in desired {
        let found = unmatched
            .iter_mut()
            .find(|slot| slot.is_some_and(|o| same_slot(level, o.rate, o.period_days)))
            .and_then(Option::take);

        match found {
            Some(order) => plan.keep.push(order.clone()),
            None => {
                let duplicate = plan
                    .keep
                    .iter()
                    .chain(plan.protected.iter())
                    .any(|o| same_slot(level, o.rate, o.period_days))
                    || plan
                        .create
                        .iter()
                        .any(|l| same_slot(level, l.rate, l.period_days));
                if !duplicate {
                    plan.create.push(level.clone());
                }
            }
        }
    }

    plan.cancel = unmatched.into_iter().flatten().cloned().collect();
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendbot_core::{Amount, OfferId, OfferOrigin};

    fn level(rate: Decimal, period: u32) -> Level {
        Level {
            rate: Rate::new(rate),
            period_days: period,
            fund_share: dec!(0.5),
        }
    }

    fn order(id: u64, rate: Decimal, period: u32) -> RestingOrder {
        RestingOrder {
            id: OfferId(id),
            rate: Rate::new(rate),
            period_days: period,
            amount: Amount::from(200),
            origin: OfferOrigin::Ladder,
        }
    }

    fn ids(orders: &[RestingOrder]) -> Vec<u64> {
        orders.iter().map(|o| o.id.0).collect()
    }

    #[test]
    fn test_partition_keep_create_cancel() {
        let desired = vec![level(dec!(0.0005), 30), level(dec!(0.0008), 90)];
        let current = vec![order(1, dec!(0.0005), 30), order(2, dec!(0.0004), 10)];
        let plan = reconcile(&desired, &current, &[]);

        assert_eq!(ids(&plan.keep), vec![1]);
        assert_eq!(plan.create, vec![level(dec!(0.0008), 90)]);
        assert_eq!(ids(&plan.cancel), vec![2]);
        assert!(plan.protected.is_empty());
    }

    #[test]
    fn test_idempotent_after_applying_plan() {
        let desired = vec![
            level(dec!(0.0005), 30),
            level(dec!(0.0008), 90),
            level(dec!(0.0011), 120),
        ];
        let first = reconcile(&desired, &[order(7, dec!(0.0003), 2)], &[]);
        assert_eq!(first.create.len(), 3);
        assert_eq!(first.cancel.len(), 1);

        // Resting state after applying the first plan.
        let applied: Vec<_> = first
            .create
            .iter()
            .enumerate()
            .map(|(i, l)| order(100 + i as u64, l.rate.inner(), l.period_days))
            .collect();
        let second = reconcile(&desired, &applied, &[]);
        assert!(second.is_noop());
        assert_eq!(second.keep.len(), 3);

        let third = reconcile(&desired, &applied, &[]);
        assert_eq!(second, third);
    }

    #[test]
    fn test_tolerance_boundary() {
        let desired = vec![level(dec!(0.00030001), 30)];
        let current = vec![order(1, dec!(0.0003), 30)];
        let plan = reconcile(&desired, &current, &[]);
        assert_eq!(plan.create.len(), 1);
        assert_eq!(ids(&plan.cancel), vec![1]);

        let desired = vec![level(dec!(0.000300005), 30)];
        let plan = reconcile(&desired, &current, &[]);
        assert!(plan.is_noop());
    }

    #[test]
    fn test_period_mismatch_is_not_a_match() {
        let plan = reconcile(&[level(dec!(0.0005), 30)], &[order(1, dec!(0.0005), 60)], &[]);
        assert_eq!(plan.create.len(), 1);
        assert_eq!(plan.cancel.len(), 1);
    }

    #[test]
    fn test_protected_orders_never_cancelled() {
        let desired = vec![level(dec!(0.0005), 2)];
        let current = vec![order(1, dec!(0.0009), 30), order(2, dec!(0.0004), 2)];
        let plan = reconcile(&desired, &current, &[30]);

        assert_eq!(ids(&plan.protected), vec![1]);
        assert!(plan.cancel.iter().all(|o| o.period_days != 30));
        assert_eq!(ids(&plan.cancel), vec![2]);
    }

    #[test]
    fn test_no_duplicate_on_protected_slot() {
        let desired = vec![level(dec!(0.0009), 30)];
        let current = vec![order(1, dec!(0.0009), 30)];
        let plan = reconcile(&desired, &current, &[30]);
        assert!(plan.create.is_empty());
        assert!(plan.cancel.is_empty());
    }

    #[test]
    fn test_duplicate_levels_created_once() {
        let desired = vec![level(dec!(0.0012), 120), level(dec!(0.0012), 120)];
        let plan = reconcile(&desired, &[], &[]);
        assert_eq!(plan.create.len(), 1);
    }

    #[test]
    fn test_duplicate_level_not_stacked_on_kept_order() {
        let desired = vec![level(dec!(0.0012), 120), level(dec!(0.0012), 120)];
        let plan = reconcile(&desired, &[order(1, dec!(0.0012), 120)], &[]);
        assert_eq!(ids(&plan.keep), vec![1]);
        assert!(plan.create.is_empty());
    }

    #[test]
    fn test_stable_matching_prefers_received_order() {
        let desired = vec![level(dec!(0.0005), 30)];
        let current = vec![order(5, dec!(0.0005), 30), order(3, dec!(0.0005), 30)];
        let plan = reconcile(&desired, &current, &[]);
        assert_eq!(ids(&plan.keep), vec![5]);
        assert_eq!(ids(&plan.cancel), vec![3]);
    }
}
