//! Borrower demand parsing and scoring.

use lendbot_core::{Amount, BookEntry, Rate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::config::ScannerConfig;

/// Aggregated borrower demand at one (rate, period) book level.
///
/// Exists for one book snapshot only. `borrower_id` is derived locally
/// from rate, period and count and is used purely for dedup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BorrowerDemand {
    pub borrower_id: String,
    pub rate: Rate,
    pub period_days: u32,
    pub amount: Amount,
    pub order_count: u32,
    pub priority_score: Decimal,
}

/// `rate*1000*0.8 + min(amount/divisor, cap)*0.15 + max(0, (120-period)/divisor)*0.05`.
pub fn priority_score(rate: Rate, period_days: u32, amount: Amount, config: &ScannerConfig) -> Decimal {
    let rate_score = rate.inner() * dec!(1000) * dec!(0.8);
    let amount_score = (amount.inner() / config.amount_divisor).min(config.amount_cap) * dec!(0.15);
    let period_score = ((dec!(120) - Decimal::from(period_days)) / config.period_divisor)
        .max(Decimal::ZERO)
        * dec!(0.05);
    rate_score + amount_score + period_score
}

/// Keep borrower rows (negative amount, positive period), ranked by
/// priority score descending. Equal scores keep book order.
pub fn parse_demand(entries: &[BookEntry], config: &ScannerConfig) -> Vec<BorrowerDemand> {
    let mut demand: Vec<BorrowerDemand> = entries
        .iter()
        .filter(|e| e.is_demand() && e.period_days > 0)
        .map(|e| {
            let amount = e.abs_amount();
            BorrowerDemand {
                borrower_id: format!("{}_{}_{}", e.rate, e.period_days, e.count),
                rate: e.rate,
                period_days: e.period_days,
                amount,
                order_count: e.count,
                priority_score: priority_score(e.rate, e.period_days, amount, config),
            }
        })
        .collect();
    demand.sort_by(|a, b| b.priority_score.cmp(&a.priority_score));
    demand
}
