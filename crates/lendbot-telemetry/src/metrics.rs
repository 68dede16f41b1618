//! Prometheus metrics for the lending bot.
//!
//! Covers:
//! - Cycle outcomes and durations
//! - Offer submissions and cancellations
//! - Market signals fed into the ladder
//! - Opportunistic placements and protection windows
//! - Funding credits opened and returned
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a startup bug. These panics only occur
//! during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, GaugeVec,
    HistogramVec,
};

// ============================================================================
// Cycles
// ============================================================================

/// Cycle runs by outcome (ok/failed/skipped).
pub static CYCLES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lendbot_cycles_total",
        "Cycle runs by type, currency and outcome",
        &["cycle", "currency", "outcome"]
    )
    .unwrap()
});

pub static CYCLE_DURATION_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "lendbot_cycle_duration_ms",
        "Cycle wall time in milliseconds",
        &["cycle"],
        vec![50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0]
    )
    .unwrap()
});

/// Cycle invocations dropped because the previous one was still running.
pub static CYCLE_OVERLAP_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lendbot_cycle_overlap_total",
        "Cycle invocations skipped by the single-flight guard",
        &["cycle"]
    )
    .unwrap()
});

/// Market data fetches that fell back to a default.
pub static DATA_ISSUES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lendbot_data_issues_total",
        "Degraded market data inputs",
        &["currency", "kind"]
    )
    .unwrap()
});

// ============================================================================
// Offers
// ============================================================================

pub static OFFERS_SUBMITTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lendbot_offers_submitted_total",
        "Funding offers submitted",
        &["currency", "origin"]
    )
    .unwrap()
});

pub static OFFERS_CANCELLED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lendbot_offers_cancelled_total",
        "Funding offers cancelled",
        &["currency", "reason"]
    )
    .unwrap()
});

pub static SUBMISSION_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lendbot_submission_errors_total",
        "Failed submit or cancel calls",
        &["currency", "op"]
    )
    .unwrap()
});

/// Ladder levels dropped for lack of funds.
pub static LEVELS_SKIPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lendbot_levels_skipped_total",
        "Ladder levels skipped for insufficient funds",
        &["currency"]
    )
    .unwrap()
});

pub static RESTING_OFFERS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "lendbot_resting_offers",
        "Resting offers after the last cycle",
        &["currency", "origin"]
    )
    .unwrap()
});

pub static AVAILABLE_FUNDS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "lendbot_available_funds",
        "Available funding balance",
        &["currency"]
    )
    .unwrap()
});

// ============================================================================
// Signals
// ============================================================================

pub static SENTIMENT: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "lendbot_sentiment",
        "Funding utilization sentiment ratio",
        &["currency"]
    )
    .unwrap()
});

/// Daily rates of the last ladder (base, guess, dynamic minimum).
pub static LADDER_RATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "lendbot_ladder_rate",
        "Rates used to build the last ladder",
        &["currency", "kind"]
    )
    .unwrap()
});

pub static LADDER_STEPS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "lendbot_ladder_steps",
        "Step count of the last ladder",
        &["currency"]
    )
    .unwrap()
});

pub static PANIC_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lendbot_panic_total",
        "Cycles that detected a panic borrowing spike",
        &["currency"]
    )
    .unwrap()
});

// ============================================================================
// Opportunistic
// ============================================================================

/// Opportunities by outcome (executed/insufficient_funds/failed/notable).
pub static OPPORTUNITIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lendbot_opportunities_total",
        "Opportunistic placements by outcome",
        &["currency", "outcome"]
    )
    .unwrap()
});

pub static PROTECTED_TENORS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "lendbot_protected_tenors",
        "Tenors currently under a protection window",
        &["currency"]
    )
    .unwrap()
});

// ============================================================================
// Credits
// ============================================================================

pub static CREDITS_ACTIVE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "lendbot_credits_active",
        "Active funding credits",
        &["currency"]
    )
    .unwrap()
});

/// Credit changes (opened/returned).
pub static CREDIT_EVENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lendbot_credit_events_total",
        "Funding credits opened or returned",
        &["currency", "event"]
    )
    .unwrap()
});

pub static INTEREST_ESTIMATE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lendbot_interest_estimate_total",
        "Estimated interest earned on returned credits",
        &["currency"]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    pub fn cycle_completed(cycle: &str, currency: &str, outcome: &str) {
        CYCLES_TOTAL
            .with_label_values(&[cycle, currency, outcome])
            .inc();
    }

    pub fn cycle_duration(cycle: &str, duration_ms: f64) {
        CYCLE_DURATION_MS
            .with_label_values(&[cycle])
            .observe(duration_ms);
    }

    pub fn cycle_overlap(cycle: &str) {
        CYCLE_OVERLAP_TOTAL.with_label_values(&[cycle]).inc();
    }

    pub fn data_issue(currency: &str, kind: &str) {
        DATA_ISSUES_TOTAL.with_label_values(&[currency, kind]).inc();
    }

    pub fn offer_submitted(currency: &str, origin: &str) {
        OFFERS_SUBMITTED_TOTAL
            .with_label_values(&[currency, origin])
            .inc();
    }

    pub fn offer_cancelled(currency: &str, reason: &str) {
        OFFERS_CANCELLED_TOTAL
            .with_label_values(&[currency, reason])
            .inc();
    }

    pub fn submission_error(currency: &str, op: &str) {
        SUBMISSION_ERRORS_TOTAL
            .with_label_values(&[currency, op])
            .inc();
    }

    pub fn levels_skipped(currency: &str, count: usize) {
        LEVELS_SKIPPED_TOTAL
            .with_label_values(&[currency])
            .inc_by(count as f64);
    }

    pub fn resting_offers(currency: &str, origin: &str, count: usize) {
        RESTING_OFFERS
            .with_label_values(&[currency, origin])
            .set(count as f64);
    }

    pub fn available_funds(currency: &str, amount: f64) {
        AVAILABLE_FUNDS.with_label_values(&[currency]).set(amount);
    }

    pub fn sentiment(currency: &str, value: f64) {
        SENTIMENT.with_label_values(&[currency]).set(value);
    }

    pub fn ladder_rate(currency: &str, kind: &str, rate: f64) {
        LADDER_RATE.with_label_values(&[currency, kind]).set(rate);
    }

    pub fn ladder_steps(currency: &str, steps: u32) {
        LADDER_STEPS
            .with_label_values(&[currency])
            .set(f64::from(steps));
    }

    pub fn panic_detected(currency: &str) {
        PANIC_TOTAL.with_label_values(&[currency]).inc();
    }

    pub fn opportunity(currency: &str, outcome: &str) {
        OPPORTUNITIES_TOTAL
            .with_label_values(&[currency, outcome])
            .inc();
    }

    pub fn protected_tenors(currency: &str, count: usize) {
        PROTECTED_TENORS
            .with_label_values(&[currency])
            .set(count as f64);
    }

    pub fn credits_active(currency: &str, count: usize) {
        CREDITS_ACTIVE
            .with_label_values(&[currency])
            .set(count as f64);
    }

    pub fn credit_event(currency: &str, event: &str, count: usize) {
        CREDIT_EVENTS_TOTAL
            .with_label_values(&[currency, event])
            .inc_by(count as f64);
    }

    pub fn interest_estimate(currency: &str, amount: f64) {
        if amount > 0.0 {
            INTEREST_ESTIMATE_TOTAL
                .with_label_values(&[currency])
                .inc_by(amount);
        }
    }
}
