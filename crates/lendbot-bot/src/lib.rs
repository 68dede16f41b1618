//! Margin-funding lending bot.
//!
//! Orchestrates the pure decision crates against a funding exchange:
//! - Regular strategy pass: ladder planning, reconciliation, submission
//! - Opportunistic pass: capture of above-market borrower demand
//! - Credit watcher: matched and returned loans
//! - Observation mode (plans logged only) / Trading mode

pub mod app;
pub mod config;
pub mod credit_watch;
pub mod error;
pub mod guard;
pub mod market_data;
pub mod offer_cache;
pub mod opportunistic_cycle;
pub mod placement;
pub mod state;
pub mod strategy_cycle;

pub use app::Application;
pub use config::{AppConfig, OperatingMode, ScheduleConfig};
pub use credit_watch::{CreditReport, CreditWatcher, ReturnedCredit};
pub use error::{AppError, AppResult, CycleError};
pub use opportunistic_cycle::{OpportunisticCycle, OpportunisticReport, OpportunityOutcome};
pub use placement::{OrderPlacer, PlacementResult};
pub use state::BotState;
pub use strategy_cycle::{StrategyCycle, StrategyReport};
