//! Funding exchange boundary.
//!
//! - [`FundingExchange`]: the async interface the bot consumes
//! - [`BitfinexClient`]: REST v2 implementation with request signing
//! - [`MockExchange`]: scripted in-memory account for tests
//!
//! Wire rows are decoded into `lendbot-core` records in [`wire`]; nothing
//! past this crate sees the positional layout.

pub mod client;
pub mod config;
pub mod error;
pub mod exchange;
pub mod mock;
pub mod signing;
pub mod wire;

pub use client::BitfinexClient;
pub use config::ExchangeConfig;
pub use error::{ExchangeError, ExchangeResult};
pub use exchange::{BoxFuture, DynExchange, FundingExchange};
pub use mock::{ExchangeCall, MockExchange};
pub use signing::{sign_payload, Credentials, NonceSource};
