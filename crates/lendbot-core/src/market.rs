//! Raw market-data records.
//!
//! These are what the exchange adapter decodes wire rows into. Signal
//! computation consumes them without knowing the wire layout.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Amount, Rate};

/// One funding-statistics row (newest first when returned as a history).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingStat {
    pub timestamp_ms: u64,
    /// Amount of funding currently used by borrowers.
    pub amount_used: Decimal,
}

/// One aggregated funding-book row.
///
/// Positive `amount` is lender supply (offers), negative is borrower demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookEntry {
    pub rate: Rate,
    pub period_days: u32,
    pub count: u32,
    pub amount: Decimal,
}

impl BookEntry {
    #[inline]
    pub fn is_demand(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    #[inline]
    pub fn abs_amount(&self) -> Amount {
        Amount::new(self.amount.abs())
    }
}

/// One rate candle (newest first when returned as a history).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp_ms: u64,
    pub open: Rate,
    pub close: Rate,
    pub high: Rate,
    pub low: Rate,
    pub volume: Decimal,
}
