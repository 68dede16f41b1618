//! Core domain types for the funding-offer lending bot.
//!
//! This crate provides the vocabulary shared by every other crate:
//! - `Rate`, `Amount`: precision-safe daily rates and funding amounts
//! - `Currency`: funding currency code with exchange symbol mapping
//! - `Level`, `RestingOrder`, `OfferRequest`: ladder targets and live offers
//! - `FundingStat`, `BookEntry`, `Candle`: raw market-data records
//! - `TierTable`: rate-threshold → maximum-period table
//! - `ProtectionRegistry`: time-boxed exclusion of tenors from reconciliation

pub mod decimal;
pub mod error;
pub mod market;
pub mod protection;
pub mod tier;
pub mod types;

pub use decimal::{Amount, Rate};
pub use error::{CoreError, Result};
pub use market::{BookEntry, Candle, FundingStat};
pub use protection::{ProtectionKey, ProtectionRegistry, ProtectionWindow};
pub use tier::{RateTier, TierTable};
pub use types::{
    Currency, FundingCredit, Level, OfferId, OfferOrigin, OfferRequest, RestingOrder,
    TenorBucket,
};

/// Days per year used to annualize daily funding rates.
pub const DAYS_PER_YEAR: u32 = 365;

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
