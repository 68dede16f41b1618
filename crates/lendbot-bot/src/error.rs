//! Application error types.

use lendbot_exchange::ExchangeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    Core(#[from] lendbot_core::CoreError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] lendbot_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

/// Failure that ends one cycle early. Completed steps stay in effect.
#[derive(Debug, Error)]
pub enum CycleError {
    /// Reading account or market state failed.
    #[error("{what} fetch failed: {source}")]
    Fetch {
        what: &'static str,
        #[source]
        source: ExchangeError,
    },

    /// A submit or cancel call failed; remaining mutations were skipped.
    #[error("{op} failed: {source}")]
    Submission {
        op: &'static str,
        #[source]
        source: ExchangeError,
    },
}

impl CycleError {
    pub fn fetch(what: &'static str) -> impl FnOnce(ExchangeError) -> Self {
        move |source| Self::Fetch { what, source }
    }

    pub fn submission(op: &'static str) -> impl FnOnce(ExchangeError) -> Self {
        move |source| Self::Submission { op, source }
    }
}
