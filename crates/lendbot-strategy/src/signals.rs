//! Market signal extraction.
//!
//! Turns raw funding stats, funding-book rows and rate candles into the
//! scalar signals the ladder consumes. Missing or short data never fails
//! the pass: each gap is reported as a [`DataIssue`] and replaced by a
//! safe default (sentiment 1.0, or `None` for candle-derived rates).

use std::collections::BTreeMap;

use lendbot_core::{BookEntry, Candle, FundingStat, Rate, TenorBucket};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use thiserror::Error;

/// Funding-stat rows needed for sentiment: the current row plus 12 history rows.
pub const SENTIMENT_ROWS: usize = 13;
/// Candle rows needed for the 12 h high average.
pub const HIGH_AVG_ROWS: usize = 12;
/// Candle rows needed for the 24 h low.
pub const LOW_ROWS: usize = 24;

/// Placeholder rate used for every bucket when the book cannot be fetched.
const FALLBACK_BOOK_RATE: Decimal = dec!(0.0001);

/// A transient market-data problem that was replaced by a default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataIssue {
    #[error("funding stats unavailable, sentiment defaults to 1.0")]
    StatsUnavailable,

    #[error("only {rows} funding stat rows (need 13), sentiment defaults to 1.0")]
    InsufficientStats { rows: usize },

    #[error("historical funding utilization averages zero, sentiment defaults to 1.0")]
    ZeroUtilization,

    #[error("funding book unavailable, using placeholder rates")]
    BookUnavailable,

    #[error("candles unavailable, candle-derived rates excluded")]
    CandlesUnavailable,

    #[error("only {rows} candles (need {needed}) for {signal}")]
    InsufficientCandles {
        rows: usize,
        needed: usize,
        signal: &'static str,
    },
}

impl DataIssue {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StatsUnavailable => "stats_unavailable",
            Self::InsufficientStats { .. } => "insufficient_stats",
            Self::ZeroUtilization => "zero_utilization",
            Self::BookUnavailable => "book_unavailable",
            Self::CandlesUnavailable => "candles_unavailable",
            Self::InsufficientCandles { .. } => "insufficient_candles",
        }
    }
}

// ============================================================================
// Sentiment
// ============================================================================

/// Current funding utilization relative to its recent average.
///
/// `stats` is newest first; the ratio is `rows[0] / mean(rows[1..=12])`.
pub fn sentiment_from_stats(stats: &[FundingStat]) -> Result<Decimal, DataIssue> {
    if stats.len() < SENTIMENT_ROWS {
        return Err(DataIssue::InsufficientStats { rows: stats.len() });
    }
    let history = &stats[1..SENTIMENT_ROWS];
    let sum: Decimal = history.iter().map(|s| s.amount_used).sum();
    let avg = sum / Decimal::from(history.len());
    if avg.is_zero() {
        return Err(DataIssue::ZeroUtilization);
    }
    Ok(stats[0].amount_used / avg)
}

// ============================================================================
// Funding book aggregation
// ============================================================================

/// Aggregated book statistics for one tenor bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketStats {
    pub bucket: TenorBucket,
    /// Total absolute amount; starts at 1 so it is never zero.
    pub volume: Decimal,
    /// Highest rate seen in the bucket.
    pub peak_rate: Option<Rate>,
    /// Volume-weighted average rate.
    pub avg_rate: Rate,
    /// Book rows that landed in this bucket.
    pub entries: usize,
}

/// Aggregate book rows (both sides, absolute amounts) into buckets.
///
/// Rows whose period falls in no bucket are ignored. A bucket with no rows
/// inherits the previous bucket's average rate.
pub fn aggregate_book(entries: &[BookEntry], buckets: &[TenorBucket]) -> Vec<BucketStats> {
    let mut stats: Vec<(BucketStats, Decimal)> = buckets
        .iter()
        .map(|b| {
            (
                BucketStats {
                    bucket: *b,
                    volume: Decimal::ONE,
                    peak_rate: None,
                    avg_rate: Rate::ZERO,
                    entries: 0,
                },
                Decimal::ZERO,
            )
        })
        .collect();

    for entry in entries {
        let Some((bucket, weighted)) = stats
            .iter_mut()
            .find(|(s, _)| s.bucket.contains(entry.period_days))
        else {
            continue;
        };
        let amount = entry.amount.abs();
        bucket.volume += amount;
        *weighted += entry.rate.inner() * amount;
        bucket.entries += 1;
        if bucket.peak_rate.map_or(true, |peak| entry.rate > peak) {
            bucket.peak_rate = Some(entry.rate);
        }
    }

    let mut previous_avg: Option<Rate> = None;
    stats
        .into_iter()
        .map(|(mut s, weighted)| {
            s.avg_rate = match (s.entries, previous_avg) {
                (0, Some(prev)) => prev,
                _ => Rate::new(weighted / s.volume),
            };
            previous_avg = Some(s.avg_rate);
            s
        })
        .collect()
}

/// Placeholder statistics used when the book cannot be fetched.
pub fn fallback_book(buckets: &[TenorBucket]) -> Vec<BucketStats> {
    buckets
        .iter()
        .map(|b| BucketStats {
            bucket: *b,
            volume: Decimal::ONE,
            peak_rate: Some(Rate::new(FALLBACK_BOOK_RATE)),
            avg_rate: Rate::new(FALLBACK_BOOK_RATE),
            entries: 0,
        })
        .collect()
}

// ============================================================================
// Candles
// ============================================================================

/// Rates derived from recent 1 h candles (newest first).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CandleSignals {
    /// High of the most recent candle, before any safety factor.
    pub last_hour_high: Option<Rate>,
    /// Mean high over the last 12 candles.
    pub high_avg_12h: Option<Rate>,
    /// Lowest low over the last 24 candles.
    pub low_24h: Option<Rate>,
    /// Candle highs, newest first.
    pub recent_highs: Vec<Decimal>,
}

pub fn candle_signals(candles: &[Candle]) -> (CandleSignals, Vec<DataIssue>) {
    let mut issues = Vec::new();
    let rows = candles.len();

    let last_hour_high = candles.first().map(|c| c.high);
    if last_hour_high.is_none() {
        issues.push(DataIssue::InsufficientCandles {
            rows,
            needed: 1,
            signal: "last hour high",
        });
    }

    let high_avg_12h = if rows >= HIGH_AVG_ROWS {
        let sum: Decimal = candles[..HIGH_AVG_ROWS].iter().map(|c| c.high.inner()).sum();
        Some(Rate::new(sum / Decimal::from(HIGH_AVG_ROWS)))
    } else {
        issues.push(DataIssue::InsufficientCandles {
            rows,
            needed: HIGH_AVG_ROWS,
            signal: "12h high average",
        });
        None
    };

    let low_24h = if rows >= LOW_ROWS {
        candles[..LOW_ROWS].iter().map(|c| c.low).min()
    } else {
        issues.push(DataIssue::InsufficientCandles {
            rows,
            needed: LOW_ROWS,
            signal: "24h low",
        });
        None
    };

    let signals = CandleSignals {
        last_hour_high,
        high_avg_12h,
        low_24h,
        recent_highs: candles.iter().map(|c| c.high.inner()).collect(),
    };
    (signals, issues)
}

// ============================================================================
// MarketSnapshot
// ============================================================================

/// Immutable per-pass view of the market for one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketSnapshot {
    pub sentiment: Decimal,
    /// Bucket statistics in ascending tenor order.
    pub buckets: Vec<BucketStats>,
    pub candles: CandleSignals,
}

impl MarketSnapshot {
    /// Build a snapshot from whatever data was fetched.
    ///
    /// `None` for an input means the fetch failed.
    pub fn build(
        stats: Option<&[FundingStat]>,
        book: Option<&[BookEntry]>,
        candles: Option<&[Candle]>,
        buckets: &[TenorBucket],
    ) -> (Self, Vec<DataIssue>) {
        let mut issues = Vec::new();

        let sentiment = match stats {
            Some(rows) => sentiment_from_stats(rows).unwrap_or_else(|issue| {
                issues.push(issue);
                Decimal::ONE
            }),
            None => {
                issues.push(DataIssue::StatsUnavailable);
                Decimal::ONE
            }
        };

        let bucket_stats = match book {
            Some(entries) => aggregate_book(entries, buckets),
            None => {
                issues.push(DataIssue::BookUnavailable);
                fallback_book(buckets)
            }
        };

        let candle_stats = match candles {
            Some(rows) => {
                let (signals, candle_issues) = candle_signals(rows);
                issues.extend(candle_issues);
                signals
            }
            None => {
                issues.push(DataIssue::CandlesUnavailable);
                CandleSignals::default()
            }
        };

        (
            Self {
                sentiment,
                buckets: bucket_stats,
                candles: candle_stats,
            },
            issues,
        )
    }

    /// Weighted average rate of the shortest bucket.
    pub fn short_avg_rate(&self) -> Rate {
        self.buckets.first().map_or(Rate::ZERO, |b| b.avg_rate)
    }

    /// Total book volume across buckets.
    pub fn total_volume(&self) -> Decimal {
        self.buckets.iter().map(|b| b.volume).sum()
    }

    pub fn rate_by_tenor(&self) -> BTreeMap<u32, Rate> {
        self.buckets
            .iter()
            .map(|b| (b.bucket.label_days, b.avg_rate))
            .collect()
    }

    pub fn peak_rate_by_tenor(&self) -> BTreeMap<u32, Option<Rate>> {
        self.buckets
            .iter()
            .map(|b| (b.bucket.label_days, b.peak_rate))
            .collect()
    }

    pub fn volume_by_tenor(&self) -> BTreeMap<u32, Decimal> {
        self.buckets
            .iter()
            .map(|b| (b.bucket.label_days, b.volume))
            .collect()
    }
}

/// Upper-bound rate guess for a bucket.
///
/// `avg * (1 + (adjustment_ratio - 1) * base_steps) * sentiment_ratio`.
pub fn guess_rate(
    avg_rate: Rate,
    rate_adjustment_ratio: Decimal,
    base_steps: u32,
    sentiment_ratio: Decimal,
) -> Rate {
    let last_step = Decimal::ONE + (rate_adjustment_ratio - Decimal::ONE) * Decimal::from(base_steps);
    avg_rate * (last_step * sentiment_ratio)
}
