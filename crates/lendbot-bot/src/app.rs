//! Main application orchestration.
//!
//! Three periodic tasks share one exchange handle and one [`BotState`]:
//! - strategy pass (ladder planning, reconciliation, submission)
//! - opportunistic pass (borrower-demand capture)
//! - credit watcher (matched / returned loans)
//!
//! Each task is spawned per tick and guarded against overlapping itself.
//! Shutdown waits for spawned tasks before the final summary.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lendbot_exchange::DynExchange;
use lendbot_telemetry::StatusReporter;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{interval, timeout, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::credit_watch::CreditWatcher;
use crate::error::AppResult;
use crate::opportunistic_cycle::{OpportunisticCycle, OpportunisticReport, OpportunityOutcome};
use crate::placement::OrderPlacer;
use crate::state::BotState;
use crate::strategy_cycle::StrategyCycle;

/// How long shutdown waits for in-flight cycles.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Main application.
pub struct Application {
    config: Arc<AppConfig>,
    state: Arc<BotState>,
    placer: Arc<OrderPlacer>,
    strategy: Arc<StrategyCycle>,
    opportunistic: Arc<OpportunisticCycle>,
    credits: Arc<CreditWatcher>,
    status: StatusReporter,
}

impl Application {
    /// Build the application around an exchange handle.
    ///
    /// Fails on an invalid configuration.
    pub fn new(config: AppConfig, exchange: DynExchange) -> AppResult<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let state = Arc::new(BotState::new());
        let placer = Arc::new(OrderPlacer::new(
            exchange.clone(),
            state.clone(),
            config.mode,
            Duration::from_millis(config.schedule.submit_pause_ms),
        ));
        let strategy = Arc::new(StrategyCycle::new(
            config.clone(),
            exchange.clone(),
            state.clone(),
            placer.clone(),
        ));
        let opportunistic = Arc::new(OpportunisticCycle::new(
            config.clone(),
            exchange.clone(),
            state.clone(),
            placer.clone(),
        ));
        let credits = Arc::new(CreditWatcher::new(config.clone(), exchange));
        let status = StatusReporter::new(
            config
                .currencies
                .iter()
                .map(|c| c.code().to_string())
                .collect(),
        );

        Ok(Self {
            config,
            state,
            placer,
            strategy,
            opportunistic,
            credits,
            status,
        })
    }

    pub fn state(&self) -> &Arc<BotState> {
        &self.state
    }

    pub fn strategy(&self) -> &Arc<StrategyCycle> {
        &self.strategy
    }

    pub fn opportunistic(&self) -> &Arc<OpportunisticCycle> {
        &self.opportunistic
    }

    pub fn credits(&self) -> &Arc<CreditWatcher> {
        &self.credits
    }

    /// Cancel every resting offer before the first pass, when configured.
    ///
    /// A failed cancel-all is logged and startup continues.
    pub async fn startup(&self) {
        if !self.config.schedule.reset_on_startup {
            return;
        }
        for currency in &self.config.currencies {
            info!(currency = %currency, "Clearing resting offers on startup");
            if let Err(e) = self.placer.cancel_all(currency, "startup").await {
                warn!(currency = %currency, error = %e, "Startup cancel-all failed");
            }
        }
    }

    /// One strategy pass and one opportunistic pass, then exit.
    pub async fn run_once(&self) -> AppResult<()> {
        info!(mode = ?self.config.mode, "Running single pass");
        self.startup().await;
        self.strategy.run_all().await;
        if let Some(reports) = self.opportunistic.run_all().await {
            log_notable(&reports);
        }
        self.status.output_summary();
        Ok(())
    }

    /// Run until ctrl-c.
    pub async fn run(self) -> AppResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run the periodic tasks until `shutdown` completes, then wait for
    /// in-flight cycles to finish.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> AppResult<()> {
        let schedule = &self.config.schedule;
        info!(
            mode = ?self.config.mode,
            currencies = ?self.config.currencies.iter().map(|c| c.code()).collect::<Vec<_>>(),
            strategy_secs = schedule.strategy_interval_secs,
            opportunistic_secs = schedule.opportunistic_interval_secs,
            credit_secs = schedule.credit_check_interval_secs,
            "Starting application"
        );

        self.startup().await;

        let mut strategy_tick = ticker(schedule.strategy_interval());
        let mut opportunistic_tick = ticker(schedule.opportunistic_interval());
        let mut credit_tick = ticker(schedule.credit_check_interval());
        let mut status_tick = ticker(schedule.status_interval());
        // The first tick completes immediately; skip the status one.
        status_tick.tick().await;

        let mut tasks: JoinSet<&'static str> = JoinSet::new();
        tokio::pin!(shutdown);

        info!("Entering main loop");
        loop {
            tokio::select! {
                _ = strategy_tick.tick() => {
                    let cycle = self.strategy.clone();
                    tasks.spawn(async move {
                        cycle.run_all().await;
                        "strategy"
                    });
                }

                _ = opportunistic_tick.tick() => {
                    let cycle = self.opportunistic.clone();
                    tasks.spawn(async move {
                        if let Some(reports) = cycle.run_all().await {
                            log_notable(&reports);
                        }
                        "opportunistic"
                    });
                }

                _ = credit_tick.tick() => {
                    let watcher = self.credits.clone();
                    tasks.spawn(async move {
                        watcher.poll_all().await;
                        "credits"
                    });
                }

                _ = status_tick.tick() => {
                    self.status.output_summary();
                }

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_joined(joined);
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        if !tasks.is_empty() {
            info!(in_flight = tasks.len(), "Waiting for in-flight cycles");
            let drained = timeout(SHUTDOWN_GRACE, async {
                while let Some(joined) = tasks.join_next().await {
                    log_joined(joined);
                }
            })
            .await;
            if drained.is_err() {
                warn!(
                    aborted = tasks.len(),
                    grace_secs = SHUTDOWN_GRACE.as_secs(),
                    "Cycles still running after grace period, aborting"
                );
                tasks.abort_all();
            }
        }

        info!("Final status summary:");
        self.status.output_summary();
        Ok(())
    }
}

fn ticker(period: Duration) -> Interval {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tick
}

fn log_joined(joined: Result<&'static str, JoinError>) {
    match joined {
        Ok(cycle) => debug!(cycle, "Cycle task finished"),
        Err(e) => warn!(error = %e, "Cycle task failed"),
    }
}

fn log_notable(reports: &[OpportunisticReport]) {
    for report in reports.iter().filter(|r| r.outcome.is_notable()) {
        if let OpportunityOutcome::Executed {
            opportunity, plan, ..
        } = &report.outcome
        {
            info!(
                currency = %report.currency,
                borrower_rate = %opportunity.demand.rate,
                our_rate = %plan.rate,
                amount = %plan.amount,
                period = plan.period_days,
                improvement_apr_pct = %opportunity.improvement().apr_pct(),
                "Notable opportunistic placement"
            );
        }
    }
}
