//! Exchange error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response shape: {0}")]
    Decode(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("API credentials not configured")]
    MissingCredentials,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExchangeError {
    /// Transport or server-side failures that may succeed on a later cycle.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpClient(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ExchangeError::HttpClient("timeout".into()).is_transient());
        assert!(ExchangeError::Status { status: 502, body: String::new() }.is_transient());
        assert!(ExchangeError::Status { status: 429, body: String::new() }.is_transient());
        assert!(!ExchangeError::Status { status: 400, body: String::new() }.is_transient());
        assert!(!ExchangeError::Rejected("ERROR".into()).is_transient());
    }
}
