//! Active funding credit tracking.
//!
//! Polls the active credits per currency and diffs them against the
//! previous poll. The first poll for a currency only seeds the state.

use std::collections::HashMap;
use std::sync::Arc;

use lendbot_core::{now_ms, Currency, FundingCredit, OfferId};
use lendbot_exchange::DynExchange;
use lendbot_telemetry::Metrics;
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::CycleError;
use crate::guard::CycleGuard;

const MS_PER_DAY: u64 = 86_400_000;

/// A credit that disappeared since the last poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReturnedCredit {
    pub credit: FundingCredit,
    pub days_held: Decimal,
    /// Estimated interest over `days_held`, before exchange fees.
    pub interest: Decimal,
}

/// Days a credit was held, capped at its period.
///
/// Without a known opening time the full period is assumed.
pub fn days_held(credit: &FundingCredit, now_ms: u64) -> Decimal {
    let period = Decimal::from(credit.period_days);
    if credit.opened_at_ms == 0 {
        return period;
    }
    let held = Decimal::from(now_ms.saturating_sub(credit.opened_at_ms)) / Decimal::from(MS_PER_DAY);
    held.min(period)
}

pub fn returned_credit(credit: FundingCredit, now_ms: u64) -> ReturnedCredit {
    let days = days_held(&credit, now_ms);
    ReturnedCredit {
        interest: credit.amount.interest(credit.rate, days),
        days_held: days,
        credit,
    }
}

#[derive(Debug)]
pub struct CreditReport {
    pub currency: Currency,
    pub active: usize,
    /// First poll for this currency; nothing was diffed.
    pub seeded: bool,
    pub opened: Vec<FundingCredit>,
    pub returned: Vec<ReturnedCredit>,
    pub error: Option<CycleError>,
}

pub struct CreditWatcher {
    config: Arc<AppConfig>,
    exchange: DynExchange,
    guard: CycleGuard,
    known: Mutex<HashMap<Currency, HashMap<OfferId, FundingCredit>>>,
}

impl CreditWatcher {
    pub fn new(config: Arc<AppConfig>, exchange: DynExchange) -> Self {
        Self {
            config,
            exchange,
            guard: CycleGuard::new("credits"),
            known: Mutex::new(HashMap::new()),
        }
    }

    pub async fn poll_all(&self) -> Option<Vec<CreditReport>> {
        self.poll_all_at(now_ms()).await
    }

    /// Poll every currency, or `None` if a poll is already running.
    pub async fn poll_all_at(&self, now_ms: u64) -> Option<Vec<CreditReport>> {
        let _running = self.guard.try_enter()?;

        let mut reports = Vec::with_capacity(self.config.currencies.len());
        for currency in &self.config.currencies {
            let report = match self.exchange.list_credits(currency).await {
                Ok(credits) => self.diff(currency, credits, now_ms),
                Err(e) => {
                    warn!(currency = %currency, error = %e, "Credit poll failed");
                    CreditReport {
                        currency: currency.clone(),
                        active: 0,
                        seeded: false,
                        opened: Vec::new(),
                        returned: Vec::new(),
                        error: Some(CycleError::fetch("credits")(e)),
                    }
                }
            };
            let outcome = if report.error.is_none() { "ok" } else { "failed" };
            Metrics::cycle_completed("credits", currency.code(), outcome);
            reports.push(report);
        }
        Some(reports)
    }

    fn diff(&self, currency: &Currency, credits: Vec<FundingCredit>, now_ms: u64) -> CreditReport {
        let current: HashMap<OfferId, FundingCredit> =
            credits.into_iter().map(|c| (c.id, c)).collect();
        let active = current.len();
        Metrics::credits_active(currency.code(), active);

        let previous = self.known.lock().insert(currency.clone(), current.clone());
        let Some(previous) = previous else {
            info!(currency = %currency, active, "Credit tracking seeded");
            return CreditReport {
                currency: currency.clone(),
                active,
                seeded: true,
                opened: Vec::new(),
                returned: Vec::new(),
                error: None,
            };
        };

        let mut opened: Vec<FundingCredit> = current
            .values()
            .filter(|c| !previous.contains_key(&c.id))
            .cloned()
            .collect();
        opened.sort_by_key(|c| c.id);
        let mut returned: Vec<ReturnedCredit> = previous
            .into_values()
            .filter(|c| !current.contains_key(&c.id))
            .map(|c| returned_credit(c, now_ms))
            .collect();
        returned.sort_by_key(|r| r.credit.id);

        for credit in &opened {
            info!(
                currency = %currency,
                id = %credit.id,
                rate = %credit.rate,
                apr_pct = %credit.rate.apr_pct(),
                amount = %credit.amount,
                period = credit.period_days,
                "Credit opened"
            );
        }
        for r in &returned {
            info!(
                currency = %currency,
                id = %r.credit.id,
                amount = %r.credit.amount,
                days_held = %r.days_held.round_dp(2),
                interest = %r.interest.round_dp(6),
                "Credit returned"
            );
            Metrics::interest_estimate(currency.code(), r.interest.to_f64().unwrap_or(0.0));
        }
        Metrics::credit_event(currency.code(), "opened", opened.len());
        Metrics::credit_event(currency.code(), "returned", returned.len());

        CreditReport {
            currency: currency.clone(),
            active,
            seeded: false,
            opened,
            returned,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendbot_core::{Amount, Rate};
    use lendbot_exchange::MockExchange;
    use rust_decimal_macros::dec;

    fn usd() -> Currency {
        Currency::parse("USD").unwrap()
    }

    fn credit(id: u64, opened_at_ms: u64) -> FundingCredit {
        FundingCredit {
            id: OfferId(id),
            rate: Rate::new(dec!(0.0005)),
            period_days: 30,
            amount: Amount::from(1000),
            opened_at_ms,
        }
    }

    #[test]
    fn test_days_held_capped_at_period() {
        let c = credit(1, 1_000);
        assert_eq!(days_held(&c, 1_000 + 2 * MS_PER_DAY), dec!(2));
        assert_eq!(days_held(&c, 1_000 + 45 * MS_PER_DAY), dec!(30));
        assert_eq!(days_held(&credit(2, 0), 5 * MS_PER_DAY), dec!(30));
    }

    #[test]
    fn test_returned_credit_interest() {
        let r = returned_credit(credit(1, 0), 3 * MS_PER_DAY);
        // 1000 * 0.0005 * 30
        assert_eq!(r.interest, dec!(15));
    }

    #[tokio::test]
    async fn test_first_poll_seeds_then_diffs() {
        let mock = Arc::new(MockExchange::new());
        mock.set_credits(&usd(), vec![credit(1, 0), credit(2, 0)]);
        let watcher = CreditWatcher::new(Arc::new(AppConfig::default()), mock.clone());

        let first = watcher.poll_all_at(0).await.unwrap();
        assert!(first[0].seeded);
        assert_eq!(first[0].active, 2);
        assert!(first[0].opened.is_empty());

        mock.set_credits(&usd(), vec![credit(2, 0), credit(3, 0)]);
        let second = watcher.poll_all_at(0).await.unwrap();
        assert!(!second[0].seeded);
        assert_eq!(second[0].opened.iter().map(|c| c.id).collect::<Vec<_>>(), vec![OfferId(3)]);
        assert_eq!(second[0].returned.len(), 1);
        assert_eq!(second[0].returned[0].credit.id, OfferId(1));
    }
}
