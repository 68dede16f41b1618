//! Observability for the lending bot.
//!
//! - Prometheus metrics for cycles, offers, signals and credits
//! - Structured logging with tracing
//! - Periodic status summaries

pub mod error;
pub mod logging;
pub mod metrics;
pub mod status;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use status::{CurrencyStatus, StatusReporter};
