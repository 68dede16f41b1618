//! Exchange client configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Base URL for public market data.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Base URL for authenticated endpoints.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Candle timeframe, e.g. "1h".
    #[serde(default = "default_candle_timeframe")]
    pub candle_timeframe: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            public_url: default_public_url(),
            auth_url: default_auth_url(),
            timeout_ms: default_timeout_ms(),
            candle_timeframe: default_candle_timeframe(),
        }
    }
}

fn default_public_url() -> String {
    "https://api-pub.bitfinex.com/v2".to_string()
}
fn default_auth_url() -> String {
    "https://api.bitfinex.com/v2".to_string()
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_candle_timeframe() -> String {
    "1h".to_string()
}
