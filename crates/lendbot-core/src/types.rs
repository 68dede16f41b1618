//! Funding-market domain records.
//!
//! `RestingOrder` and `FundingCredit` are observed read-only from the
//! exchange; their identity is the exchange-issued `OfferId`, never a
//! locally recomputed value.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decimal::{Amount, Rate};
use crate::error::{CoreError, Result};

/// Funding currency code (e.g. `USD`, `UST`).
///
/// Stored without the exchange's `f` prefix; use [`Currency::funding_symbol`]
/// for exchange requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Parse a currency code, accepting either `USD` or `fUSD`.
    pub fn parse(code: &str) -> Result<Self> {
        let trimmed = code.trim();
        let bare = match trimmed.strip_prefix('f') {
            Some(rest) if rest.len() >= 3 && rest.chars().all(|c| c.is_ascii_uppercase()) => rest,
            _ => trimmed,
        };
        if bare.len() < 3 || !bare.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidCurrency(code.to_string()));
        }
        Ok(Self(bare.to_ascii_uppercase()))
    }

    /// Currency code without prefix (`USD`).
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Funding symbol used by the exchange (`fUSD`).
    pub fn funding_symbol(&self) -> String {
        format!("f{}", self.0)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Currency {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.0
    }
}

/// Tenor bucket used to aggregate the order book.
///
/// Covers the inclusive period range `[min_days, max_days]` and is reported
/// under `label_days`. `max_days = None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenorBucket {
    pub label_days: u32,
    pub min_days: u32,
    #[serde(default)]
    pub max_days: Option<u32>,
}

impl TenorBucket {
    pub const fn new(label_days: u32, min_days: u32, max_days: Option<u32>) -> Self {
        Self {
            label_days,
            min_days,
            max_days,
        }
    }

    /// Whether a period (days) falls inside this bucket.
    pub fn contains(&self, period_days: u32) -> bool {
        period_days >= self.min_days && self.max_days.map_or(true, |max| period_days <= max)
    }

    /// Default bucket set `{2, 30, 60, 120}`.
    pub fn defaults() -> Vec<TenorBucket> {
        vec![
            TenorBucket::new(2, 2, Some(2)),
            TenorBucket::new(30, 30, Some(60)),
            TenorBucket::new(60, 61, Some(119)),
            TenorBucket::new(120, 121, None),
        ]
    }

    /// Validate that buckets are non-empty, disjoint and monotonically increasing.
    pub fn validate_set(buckets: &[TenorBucket]) -> Result<()> {
        if buckets.is_empty() {
            return Err(CoreError::InvalidConfig(
                "at least one tenor bucket is required".to_string(),
            ));
        }
        for b in buckets {
            if b.min_days == 0 {
                return Err(CoreError::InvalidConfig(format!(
                    "tenor bucket {} has zero min_days",
                    b.label_days
                )));
            }
            if let Some(max) = b.max_days {
                if max < b.min_days {
                    return Err(CoreError::InvalidConfig(format!(
                        "tenor bucket {} has max_days {} below min_days {}",
                        b.label_days, max, b.min_days
                    )));
                }
            }
        }
        for pair in buckets.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            let prev_max = prev.max_days.ok_or_else(|| {
                CoreError::InvalidConfig(format!(
                    "unbounded tenor bucket {} must be last",
                    prev.label_days
                ))
            })?;
            if next.min_days <= prev_max || next.label_days <= prev.label_days {
                return Err(CoreError::InvalidConfig(format!(
                    "tenor buckets {} and {} overlap or are out of order",
                    prev.label_days, next.label_days
                )));
            }
        }
        Ok(())
    }
}

/// One target level of the ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    /// Daily rate, rounded to five decimals.
    pub rate: Rate,
    /// Loan period in days.
    pub period_days: u32,
    /// Share of available funds, in (0, 1].
    pub fund_share: Decimal,
}

/// Who placed an offer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferOrigin {
    /// Regular ladder placement.
    #[default]
    Ladder,
    /// Opportunistic capture of above-market borrower demand.
    Opportunistic,
}

impl fmt::Display for OfferOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ladder => write!(f, "ladder"),
            Self::Opportunistic => write!(f, "opportunistic"),
        }
    }
}

/// Exchange-issued offer or credit identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferId(pub u64);

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A lend offer currently resting on the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestingOrder {
    pub id: OfferId,
    pub rate: Rate,
    pub period_days: u32,
    /// Absolute offered amount.
    pub amount: Amount,
    /// Placement tag; `Ladder` unless this process recorded otherwise.
    #[serde(default)]
    pub origin: OfferOrigin,
}

/// A new offer to submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRequest {
    pub rate: Rate,
    pub amount: Amount,
    pub period_days: u32,
    pub origin: OfferOrigin,
}

/// An active (matched) loan earning interest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingCredit {
    pub id: OfferId,
    pub rate: Rate,
    pub period_days: u32,
    pub amount: Amount,
    /// Loan opening time (Unix ms); 0 if unknown.
    #[serde(default)]
    pub opened_at_ms: u64,
}
