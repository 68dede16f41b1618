//! Regular ladder strategy pass.
//!
//! Per currency: fetch market data, plan the ladder, reconcile it against
//! resting offers, cancel stale offers, then fund and submit the missing
//! levels. Currencies run one after another; a failure in one currency
//! ends that currency's pass only.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use lendbot_core::{now_ms, Currency, Level, OfferRequest, Rate};
use lendbot_exchange::DynExchange;
use lendbot_strategy::signals::LOW_ROWS;
use lendbot_strategy::{
    allocate, available_funds, reconcile, DataIssue, LadderGenerator, MarketSnapshot, RateHistory,
};
use lendbot_telemetry::Metrics;
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::CycleError;
use crate::guard::CycleGuard;
use crate::market_data::fetch_book;
use crate::placement::OrderPlacer;
use crate::state::BotState;

/// Outcome of one strategy pass for one currency.
#[derive(Debug)]
pub struct StrategyReport {
    pub currency: Currency,
    pub sentiment: Decimal,
    pub base_rate: Rate,
    pub guess_rate: Rate,
    /// Dynamic minimum published for the opportunistic scanner.
    pub minimum_rate: Rate,
    pub levels: Vec<Level>,
    pub kept: usize,
    /// Offers submitted successfully.
    pub created: usize,
    /// Offers cancelled successfully.
    pub cancelled: usize,
    /// Resting offers left alone because their period is protected.
    pub protected: usize,
    /// Levels skipped for lack of funds.
    pub dropped: usize,
    /// Opportunistic offers still resting after the pass.
    pub resting_opportunistic: usize,
    pub issues: Vec<DataIssue>,
    pub panic: bool,
    pub full_reset: bool,
    pub error: Option<CycleError>,
}

impl StrategyReport {
    fn new(currency: &Currency) -> Self {
        Self {
            currency: currency.clone(),
            sentiment: Decimal::ONE,
            base_rate: Rate::ZERO,
            guess_rate: Rate::ZERO,
            minimum_rate: Rate::ZERO,
            levels: Vec::new(),
            kept: 0,
            created: 0,
            cancelled: 0,
            protected: 0,
            dropped: 0,
            resting_opportunistic: 0,
            issues: Vec::new(),
            panic: false,
            full_reset: false,
            error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Whether `local` falls on a full-reset slot.
pub fn full_reset_due(every_hours: u32, minute: u32, local: NaiveDateTime) -> bool {
    every_hours > 0 && local.hour() % every_hours == 0 && local.minute() == minute
}

pub struct StrategyCycle {
    config: Arc<AppConfig>,
    exchange: DynExchange,
    state: Arc<BotState>,
    placer: Arc<OrderPlacer>,
    generator: LadderGenerator,
    guard: CycleGuard,
    histories: Mutex<HashMap<Currency, RateHistory>>,
    /// Last (date, hour) a full reset ran, per currency.
    last_reset: Mutex<HashMap<Currency, (NaiveDate, u32)>>,
}

impl StrategyCycle {
    pub fn new(
        config: Arc<AppConfig>,
        exchange: DynExchange,
        state: Arc<BotState>,
        placer: Arc<OrderPlacer>,
    ) -> Self {
        let generator = LadderGenerator::new(config.strategy.clone(), config.tiers.clone());
        Self {
            config,
            exchange,
            state,
            placer,
            generator,
            guard: CycleGuard::new("strategy"),
            histories: Mutex::new(HashMap::new()),
            last_reset: Mutex::new(HashMap::new()),
        }
    }

    pub fn guard(&self) -> &CycleGuard {
        &self.guard
    }

    /// Run one pass over every currency at the current time.
    pub async fn run_all(&self) -> Option<Vec<StrategyReport>> {
        self.run_all_at(Local::now().naive_local(), now_ms()).await
    }

    /// Run one pass over every currency, or `None` if a pass is already running.
    pub async fn run_all_at(&self, local: NaiveDateTime, now_ms: u64) -> Option<Vec<StrategyReport>> {
        let _running = self.guard.try_enter()?;
        let started = Instant::now();

        let mut reports = Vec::with_capacity(self.config.currencies.len());
        for currency in &self.config.currencies {
            let report = self.run_currency(currency, local, now_ms).await;
            let outcome = if report.is_ok() { "ok" } else { "failed" };
            Metrics::cycle_completed("strategy", currency.code(), outcome);
            log_report(&report);
            reports.push(report);
        }

        Metrics::cycle_duration("strategy", started.elapsed().as_secs_f64() * 1000.0);
        Some(reports)
    }

    async fn run_currency(&self, currency: &Currency, local: NaiveDateTime, now_ms: u64) -> StrategyReport {
        let mut report = StrategyReport::new(currency);
        if let Err(e) = self.execute(currency, local, now_ms, &mut report).await {
            warn!(currency = %currency, error = %e, "Strategy pass aborted");
            report.error = Some(e);
        }
        report
    }

    async fn execute(
        &self,
        currency: &Currency,
        local: NaiveDateTime,
        now_ms: u64,
        report: &mut StrategyReport,
    ) -> Result<(), CycleError> {
        let schedule = &self.config.schedule;
        let strategy = &self.config.strategy;

        if self.take_reset_slot(currency, local) {
            info!(currency = %currency, hour = local.hour(), "Scheduled full reset");
            self.placer.cancel_all(currency, "reset").await?;
            report.full_reset = true;
        }

        // Market data. Failures degrade to defaults.
        let stats = match self.exchange.funding_stats(currency).await {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!(currency = %currency, error = %e, "Funding stats fetch failed");
                None
            }
        };
        let book = match fetch_book(
            self.exchange.as_ref(),
            currency,
            strategy.book_pages,
            strategy.book_depth,
        )
        .await
        {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!(currency = %currency, error = %e, "Funding book fetch failed");
                None
            }
        };
        let candles = match self
            .exchange
            .candles(currency, &strategy.candle_key, LOW_ROWS as u32)
            .await
        {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!(currency = %currency, error = %e, "Candle fetch failed");
                None
            }
        };

        let (snapshot, issues) = MarketSnapshot::build(
            stats.as_deref(),
            book.as_deref(),
            candles.as_deref(),
            &strategy.tenor_buckets,
        );
        debug!(
            currency = %currency,
            sentiment = %snapshot.sentiment.round_dp(4),
            rate_by_tenor = ?snapshot.rate_by_tenor(),
            peak_rate_by_tenor = ?snapshot.peak_rate_by_tenor(),
            volume_by_tenor = ?snapshot.volume_by_tenor(),
            "Market snapshot"
        );
        for issue in &issues {
            warn!(currency = %currency, issue = %issue, "Market data degraded");
            Metrics::data_issue(currency.code(), issue.kind());
        }
        report.issues = issues;

        let plan = {
            let mut histories = self.histories.lock();
            let history = histories
                .entry(currency.clone())
                .or_insert_with(|| RateHistory::new(strategy.history_window));
            self.generator.plan(&snapshot, history)
        };

        report.sentiment = plan.sentiment;
        report.base_rate = plan.base_rate();
        report.guess_rate = plan.inputs.guess_rate;
        report.minimum_rate = plan.inputs.minimum_rate;
        report.levels = plan.levels.clone();
        report.panic = plan.panic;
        self.state
            .publish_dynamic_minimum(currency, plan.inputs.minimum_rate);
        record_plan_metrics(currency, report, plan.inputs.step_count);

        // Reconcile against what is actually resting.
        let ticket = self.state.offers.listing_ticket();
        let listed = self
            .exchange
            .list_offers(currency)
            .await
            .map_err(CycleError::fetch("offers"))?;
        let resting = self.state.offers.refresh(currency, ticket, listed);
        let protected = self.state.protection.protected_periods(currency, now_ms);
        Metrics::protected_tenors(currency.code(), protected.len());

        let diff = reconcile(&plan.levels, &resting, &protected);
        report.kept = diff.keep.len();
        report.protected = diff.protected.len();

        let cancels = self
            .placer
            .cancel_orders(currency, &diff.cancel, "reconcile")
            .await;
        report.cancelled = cancels.completed;
        if let Some(e) = cancels.error {
            return Err(e);
        }
        if report.cancelled > 0 {
            pause(schedule.cancel_settle_ms).await;
        }

        let balance = self
            .exchange
            .wallet_balance(currency)
            .await
            .map_err(CycleError::fetch("balance"))?;
        let available = available_funds(balance, self.config.funds.retained);
        Metrics::available_funds(currency.code(), available.inner().to_f64().unwrap_or(0.0));

        let allocation = allocate(available, &diff.create, self.config.funds.minimum_order);
        if allocation.is_insufficient() {
            report.dropped = allocation.dropped.len();
            Metrics::levels_skipped(currency.code(), report.dropped);
            warn!(
                currency = %currency,
                available = %available,
                dropped = report.dropped,
                minimum_order = %self.config.funds.minimum_order,
                "Insufficient funds for every level"
            );
        }

        let requests: Vec<OfferRequest> = allocation.orders.iter().map(|o| o.to_request()).collect();
        let submits = self.placer.submit_all(currency, &requests).await;
        report.created = submits.completed;
        let (ladder, opportunistic) = self.state.offers.count_by_origin(currency);
        report.resting_opportunistic = opportunistic;
        Metrics::resting_offers(currency.code(), "ladder", ladder + report.created);
        Metrics::resting_offers(currency.code(), "opportunistic", opportunistic);
        match submits.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Claim the full-reset slot for `local` if one is due and unused.
    fn take_reset_slot(&self, currency: &Currency, local: NaiveDateTime) -> bool {
        let schedule = &self.config.schedule;
        if !full_reset_due(schedule.full_reset_every_hours, schedule.full_reset_minute, local) {
            return false;
        }
        let slot = (local.date(), local.hour());
        let mut last = self.last_reset.lock();
        if last.get(currency) == Some(&slot) {
            return false;
        }
        last.insert(currency.clone(), slot);
        true
    }
}

fn record_plan_metrics(currency: &Currency, report: &StrategyReport, steps: u32) {
    let code = currency.code();
    Metrics::sentiment(code, report.sentiment.to_f64().unwrap_or(1.0));
    Metrics::ladder_rate(code, "base", report.base_rate.inner().to_f64().unwrap_or(0.0));
    Metrics::ladder_rate(code, "guess", report.guess_rate.inner().to_f64().unwrap_or(0.0));
    Metrics::ladder_rate(code, "minimum", report.minimum_rate.inner().to_f64().unwrap_or(0.0));
    Metrics::ladder_steps(code, steps);
    if report.panic {
        Metrics::panic_detected(code);
    }
}

fn log_report(report: &StrategyReport) {
    info!(
        currency = %report.currency,
        sentiment = %report.sentiment.round_dp(4),
        base_rate = %report.base_rate,
        guess_rate = %report.guess_rate,
        minimum_rate = %report.minimum_rate,
        levels = report.levels.len(),
        kept = report.kept,
        created = report.created,
        cancelled = report.cancelled,
        protected = report.protected,
        dropped = report.dropped,
        resting_opportunistic = report.resting_opportunistic,
        panic = report.panic,
        full_reset = report.full_reset,
        ok = report.is_ok(),
        "Strategy pass complete"
    );
}

pub(crate) async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
