//! Periodic status summary.
//!
//! Reads the per-currency counters and gauges back out of the Prometheus
//! registry and writes a compact summary to the log.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::metrics::{
    AVAILABLE_FUNDS, CREDITS_ACTIVE, CREDIT_EVENTS_TOTAL, CYCLES_TOTAL, INTEREST_ESTIMATE_TOTAL,
    OFFERS_CANCELLED_TOTAL, OFFERS_SUBMITTED_TOTAL, OPPORTUNITIES_TOTAL, PROTECTED_TENORS,
    RESTING_OFFERS,
};

/// Counters for one currency since process start.
#[derive(Debug, Clone, Serialize)]
pub struct CurrencyStatus {
    pub currency: String,
    pub strategy_cycles_ok: u64,
    pub strategy_cycles_failed: u64,
    pub opportunistic_cycles_ok: u64,
    pub opportunistic_cycles_failed: u64,
    pub offers_submitted: u64,
    pub offers_cancelled: u64,
    pub opportunities_executed: u64,
    pub credits_opened: u64,
    pub credits_returned: u64,
    pub interest_estimate: f64,
    pub resting_offers: u64,
    /// Resting offers placed by the opportunistic pass.
    pub resting_opportunistic: u64,
    pub active_credits: u64,
    pub protected_tenors: u64,
    pub available_funds: f64,
}

/// Builds and logs status summaries.
pub struct StatusReporter {
    currencies: Vec<String>,
    start_time: DateTime<Utc>,
}

const ORIGINS: [&str; 2] = ["ladder", "opportunistic"];
const CANCEL_REASONS: [&str; 4] = ["reconcile", "reset", "capital", "startup"];

impl StatusReporter {
    pub fn new(currencies: Vec<String>) -> Self {
        Self {
            currencies,
            start_time: Utc::now(),
        }
    }

    pub fn get_status(&self) -> Vec<CurrencyStatus> {
        self.currencies
            .iter()
            .map(|c| Self::currency_status(c.as_str()))
            .collect()
    }

    fn counter(counter: &prometheus::CounterVec, labels: &[&str]) -> u64 {
        counter.with_label_values(labels).get() as u64
    }

    fn gauge(gauge: &prometheus::GaugeVec, labels: &[&str]) -> f64 {
        gauge.with_label_values(labels).get()
    }

    fn currency_status(currency: &str) -> CurrencyStatus {
        let cycles = |cycle: &str, outcome: &str| {
            Self::counter(&CYCLES_TOTAL, &[cycle, currency, outcome])
        };
        CurrencyStatus {
            currency: currency.to_string(),
            strategy_cycles_ok: cycles("strategy", "ok"),
            strategy_cycles_failed: cycles("strategy", "failed"),
            opportunistic_cycles_ok: cycles("opportunistic", "ok"),
            opportunistic_cycles_failed: cycles("opportunistic", "failed"),
            offers_submitted: ORIGINS
                .iter()
                .map(|o| Self::counter(&OFFERS_SUBMITTED_TOTAL, &[currency, o]))
                .sum(),
            offers_cancelled: CANCEL_REASONS
                .iter()
                .map(|r| Self::counter(&OFFERS_CANCELLED_TOTAL, &[currency, r]))
                .sum(),
            opportunities_executed: Self::counter(&OPPORTUNITIES_TOTAL, &[currency, "executed"]),
            credits_opened: Self::counter(&CREDIT_EVENTS_TOTAL, &[currency, "opened"]),
            credits_returned: Self::counter(&CREDIT_EVENTS_TOTAL, &[currency, "returned"]),
            interest_estimate: INTEREST_ESTIMATE_TOTAL.with_label_values(&[currency]).get(),
            resting_offers: ORIGINS
                .iter()
                .map(|o| Self::gauge(&RESTING_OFFERS, &[currency, o]) as u64)
                .sum(),
            resting_opportunistic: Self::gauge(&RESTING_OFFERS, &[currency, "opportunistic"]) as u64,
            active_credits: Self::gauge(&CREDITS_ACTIVE, &[currency]) as u64,
            protected_tenors: Self::gauge(&PROTECTED_TENORS, &[currency]) as u64,
            available_funds: Self::gauge(&AVAILABLE_FUNDS, &[currency]),
        }
    }

    /// Write the summary to the log.
    pub fn output_summary(&self) {
        let uptime = Utc::now() - self.start_time;
        info!(
            since = %self.start_time.format("%Y-%m-%d %H:%M:%S UTC"),
            uptime_hours = uptime.num_hours(),
            uptime_minutes = uptime.num_minutes() % 60,
            "========== Lending status =========="
        );

        for s in self.get_status() {
            info!(
                currency = %s.currency,
                resting_offers = s.resting_offers,
                resting_opportunistic = s.resting_opportunistic,
                active_credits = s.active_credits,
                protected_tenors = s.protected_tenors,
                available_funds = %format!("{:.2}", s.available_funds),
                "Account"
            );
            info!(
                currency = %s.currency,
                strategy_ok = s.strategy_cycles_ok,
                strategy_failed = s.strategy_cycles_failed,
                opportunistic_ok = s.opportunistic_cycles_ok,
                opportunistic_failed = s.opportunistic_cycles_failed,
                "Cycles"
            );
            info!(
                currency = %s.currency,
                submitted = s.offers_submitted,
                cancelled = s.offers_cancelled,
                opportunities = s.opportunities_executed,
                credits_opened = s.credits_opened,
                credits_returned = s.credits_returned,
                interest_estimate = %format!("{:.4}", s.interest_estimate),
                "Activity"
            );
        }
    }

    pub fn to_json(&self) -> HashMap<String, CurrencyStatus> {
        self.get_status()
            .into_iter()
            .map(|s| (s.currency.clone(), s))
            .collect()
    }
}
