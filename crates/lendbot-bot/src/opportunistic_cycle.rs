//! Opportunistic placement pass.
//!
//! Scans the funding book for borrower demand that pays more than our best
//! resting offer and places at most one offer per currency for it. The
//! tenor of a placed offer is protected from ladder reconciliation for a
//! while so the next strategy pass does not cancel it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use lendbot_core::{now_ms, Amount, Currency, OfferId, ProtectionKey, RestingOrder};
use lendbot_exchange::DynExchange;
use lendbot_scanner::{
    capital_to_free, plan_order, ExecutionPlan, OpportunisticScanner, Opportunity, ScanContext,
    ScanResult,
};
use lendbot_strategy::available_funds;
use lendbot_telemetry::Metrics;
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::CycleError;
use crate::guard::CycleGuard;
use crate::market_data::fetch_book;
use crate::placement::OrderPlacer;
use crate::state::BotState;
use crate::strategy_cycle::pause;

/// What happened to the selected opportunity.
#[derive(Debug, Default)]
pub enum OpportunityOutcome {
    #[default]
    NoOpportunity,
    /// Observation mode: the offer that would have been placed.
    Observed {
        opportunity: Opportunity,
        plan: ExecutionPlan,
    },
    InsufficientFunds {
        opportunity: Opportunity,
        available: Amount,
    },
    Executed {
        opportunity: Opportunity,
        plan: ExecutionPlan,
        offer_id: Option<OfferId>,
        /// Annualized improvement above the notable threshold.
        notable: bool,
        /// Resting offer cancelled to fund this placement.
        freed: Option<RestingOrder>,
    },
}

impl OpportunityOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoOpportunity => "none",
            Self::Observed { .. } => "observed",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::Executed { .. } => "executed",
        }
    }

    pub fn is_notable(&self) -> bool {
        matches!(self, Self::Executed { notable: true, .. })
    }
}

/// Outcome of one opportunistic pass for one currency.
#[derive(Debug)]
pub struct OpportunisticReport {
    pub currency: Currency,
    pub scan: ScanResult,
    pub outcome: OpportunityOutcome,
    pub error: Option<CycleError>,
}

impl OpportunisticReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

pub struct OpportunisticCycle {
    config: Arc<AppConfig>,
    exchange: DynExchange,
    state: Arc<BotState>,
    placer: Arc<OrderPlacer>,
    guard: CycleGuard,
    scanners: Mutex<HashMap<Currency, OpportunisticScanner>>,
}

impl OpportunisticCycle {
    pub fn new(
        config: Arc<AppConfig>,
        exchange: DynExchange,
        state: Arc<BotState>,
        placer: Arc<OrderPlacer>,
    ) -> Self {
        Self {
            config,
            exchange,
            state,
            placer,
            guard: CycleGuard::new("opportunistic"),
            scanners: Mutex::new(HashMap::new()),
        }
    }

    pub fn guard(&self) -> &CycleGuard {
        &self.guard
    }

    pub async fn run_all(&self) -> Option<Vec<OpportunisticReport>> {
        self.run_all_at(now_ms()).await
    }

    /// Run one pass over every currency, or `None` if a pass is already running.
    pub async fn run_all_at(&self, now_ms: u64) -> Option<Vec<OpportunisticReport>> {
        let _running = self.guard.try_enter()?;
        let started = Instant::now();

        let purged = self.state.protection.purge_expired(now_ms);
        if purged > 0 {
            debug!(purged, "Protection windows expired");
        }

        let mut reports = Vec::with_capacity(self.config.currencies.len());
        for currency in &self.config.currencies {
            let mut report = OpportunisticReport {
                currency: currency.clone(),
                scan: ScanResult::default(),
                outcome: OpportunityOutcome::NoOpportunity,
                error: None,
            };
            if let Err(e) = self.execute(currency, now_ms, &mut report).await {
                warn!(currency = %currency, error = %e, "Opportunistic pass aborted");
                report.error = Some(e);
            }
            let outcome = if report.is_ok() { "ok" } else { "failed" };
            debug!(
                currency = %currency,
                outcome = report.outcome.label(),
                admitted = report.scan.opportunities.len(),
                ok = report.is_ok(),
                "Opportunistic pass complete"
            );
            Metrics::cycle_completed("opportunistic", currency.code(), outcome);
            reports.push(report);
        }

        Metrics::cycle_duration("opportunistic", started.elapsed().as_secs_f64() * 1000.0);
        Some(reports)
    }

    async fn execute(
        &self,
        currency: &Currency,
        now_ms: u64,
        report: &mut OpportunisticReport,
    ) -> Result<(), CycleError> {
        let scanner_cfg = &self.config.scanner;
        let minimum_order = self.config.funds.minimum_order;

        let book = fetch_book(
            self.exchange.as_ref(),
            currency,
            scanner_cfg.book_pages,
            scanner_cfg.book_depth,
        )
        .await
        .map_err(CycleError::fetch("book"))?;
        let ticket = self.state.offers.listing_ticket();
        let listed = self
            .exchange
            .list_offers(currency)
            .await
            .map_err(CycleError::fetch("offers"))?;
        let resting = self.state.offers.refresh(currency, ticket, listed);
        let protected = self.state.protection.protected_periods(currency, now_ms);
        let dynamic_minimum = self
            .state
            .dynamic_minimum(currency, self.config.strategy.minimum_rate);

        let ctx = ScanContext {
            resting: &resting,
            dynamic_minimum_rate: dynamic_minimum,
            protected_periods: &protected,
            now_ms,
        };
        report.scan = {
            let mut scanners = self.scanners.lock();
            scanners
                .entry(currency.clone())
                .or_insert_with(|| {
                    OpportunisticScanner::new(scanner_cfg.clone(), self.config.tiers.clone())
                })
                .scan(&book, &ctx)
        };

        let Some(opportunity) = report.scan.selected.clone() else {
            return Ok(());
        };
        info!(
            currency = %currency,
            borrower = %opportunity.demand.borrower_id,
            rate = %opportunity.demand.rate,
            apr_pct = %opportunity.demand.rate.apr_pct(),
            period = opportunity.demand.period_days,
            amount = %opportunity.demand.amount,
            threshold = %opportunity.threshold,
            "Opportunity found"
        );

        let mut available = self.available(currency).await?;
        let mut freed = None;
        if available < minimum_order {
            if let Some(order) = capital_to_free(&resting, &protected, opportunity.demand.rate) {
                info!(
                    currency = %currency,
                    id = %order.id,
                    rate = %order.rate,
                    amount = %order.amount,
                    "Freeing capital for opportunity"
                );
                if self.placer.cancel(currency, order, "capital").await? {
                    pause(self.config.schedule.opportunistic_settle_ms).await;
                    available = self.available(currency).await?;
                } else {
                    // Observation mode: assume the cancel released the amount.
                    available += order.amount;
                }
                freed = Some(order.clone());
            }
        }

        let Some(plan) = plan_order(&opportunity, available, minimum_order, scanner_cfg) else {
            warn!(
                currency = %currency,
                available = %available,
                minimum_order = %minimum_order,
                "Insufficient funds for opportunity"
            );
            Metrics::opportunity(currency.code(), "insufficient_funds");
            report.outcome = OpportunityOutcome::InsufficientFunds {
                opportunity,
                available,
            };
            return Ok(());
        };

        if !self.placer.is_live() {
            self.placer.submit(currency, &plan.to_request()).await?;
            Metrics::opportunity(currency.code(), "observed");
            report.outcome = OpportunityOutcome::Observed { opportunity, plan };
            return Ok(());
        }

        let offer_id = match self.placer.submit(currency, &plan.to_request()).await {
            Ok(id) => id,
            Err(e) => {
                Metrics::opportunity(currency.code(), "failed");
                return Err(e);
            }
        };

        let window = self.state.protection.protect(
            ProtectionKey::new(currency.clone(), plan.period_days),
            now_ms,
            scanner_cfg.protection_ms(),
        );
        let notable = opportunity.is_notable(scanner_cfg.notable_improvement_apr);
        Metrics::opportunity(currency.code(), "executed");
        if notable {
            Metrics::opportunity(currency.code(), "notable");
        }
        info!(
            currency = %currency,
            rate = %plan.rate,
            amount = %plan.amount,
            period = plan.period_days,
            improvement_apr_pct = %opportunity.improvement().apr_pct(),
            protected_until_ms = window.expires_at_ms,
            notable,
            "Opportunistic offer placed"
        );
        report.outcome = OpportunityOutcome::Executed {
            opportunity,
            plan,
            offer_id,
            notable,
            freed,
        };
        Ok(())
    }

    async fn available(&self, currency: &Currency) -> Result<Amount, CycleError> {
        let balance = self
            .exchange
            .wallet_balance(currency)
            .await
            .map_err(CycleError::fetch("balance"))?;
        let available = available_funds(balance, self.config.funds.retained);
        Metrics::available_funds(currency.code(), available.inner().to_f64().unwrap_or(0.0));
        Ok(available)
    }
}
