//! Rate-ladder decision engine.
//!
//! Pure computation, no I/O. One regular strategy pass flows through:
//!
//! ```text
//! raw market data ─▶ MarketSnapshot (signals)
//!                       │
//!                       ▼
//!          RateOptimizer + RateHistory ─▶ LadderGenerator ─▶ Vec<Level>
//!                                                            │
//!          wallet balance ─▶ FundAllocator ◀─────────────────┤
//!                                                            ▼
//!          resting orders + protected periods ─▶ Reconciler ─▶ keep / create / cancel
//! ```

pub mod allocator;
pub mod config;
pub mod ladder;
pub mod optimizer;
pub mod reconciler;
pub mod signals;

pub use allocator::{allocate, available_funds, AllocationPlan, DroppedLevel, PlannedOrder};
pub use config::{FundsConfig, StrategyConfig};
pub use ladder::{generate_levels, LadderGenerator, LadderInputs, LadderPlan};
pub use optimizer::{RateHistory, RateOptimizer, MAX_LADDER_STEPS};
pub use reconciler::{reconcile, ReconcilePlan, RATE_TOLERANCE};
pub use signals::{BucketStats, DataIssue, MarketSnapshot};
