//! Opportunistic borrower-demand scanner.
//!
//! Detects borrower demand on the funding book that pays more than our
//! best resting offer, and decides how to fund a single opportunistic
//! offer for it.
//!
//! ```text
//! book rows ─▶ demand::parse_demand ─▶ ranked BorrowerDemand
//!                                          │
//!        TrackedBorrowers (dedup) ◀────────┤
//!                                          ▼
//!                     OpportunisticScanner::scan ─▶ ScanResult { selected }
//!                                                          │
//!                                                          ▼
//!                         execution::{plan_order, capital_to_free}
//! ```

pub mod config;
pub mod demand;
pub mod execution;
pub mod scanner;
pub mod tracker;

pub use config::ScannerConfig;
pub use demand::{parse_demand, priority_score, BorrowerDemand};
pub use execution::{capital_to_free, plan_order, ExecutionPlan};
pub use scanner::{Opportunity, OpportunisticScanner, ScanContext, ScanResult};
pub use tracker::{TrackedBorrower, TrackedBorrowers};
