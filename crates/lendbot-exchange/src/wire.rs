//! Wire row decoding.
//!
//! REST v2 answers with positional arrays. Optional fields are resolved
//! here once: a missing amount decodes as zero, and rows without a usable
//! rate or period are dropped.

use std::str::FromStr;

use lendbot_core::{
    Amount, BookEntry, Candle, Currency, FundingCredit, FundingStat, OfferId, OfferOrigin, Rate,
    RestingOrder,
};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::{ExchangeError, ExchangeResult};

// Funding stats row
const STAT_MTS: usize = 0;
const STAT_AMOUNT_USED: usize = 8;

// Book row: [rate, period, count, amount]
const BOOK_RATE: usize = 0;
const BOOK_PERIOD: usize = 1;
const BOOK_COUNT: usize = 2;
const BOOK_AMOUNT: usize = 3;

// Candle row: [mts, open, close, high, low, volume]
const CANDLE_MTS: usize = 0;
const CANDLE_OPEN: usize = 1;
const CANDLE_CLOSE: usize = 2;
const CANDLE_HIGH: usize = 3;
const CANDLE_LOW: usize = 4;
const CANDLE_VOLUME: usize = 5;

// Wallet row
const WALLET_TYPE: usize = 0;
const WALLET_CURRENCY: usize = 1;
const WALLET_AVAILABLE: usize = 4;

// Funding offer row
const OFFER_ID: usize = 0;
const OFFER_AMOUNT: usize = 4;
const OFFER_RATE: usize = 14;
const OFFER_PERIOD: usize = 15;

// Funding credit row
const CREDIT_ID: usize = 0;
const CREDIT_AMOUNT: usize = 5;
const CREDIT_RATE: usize = 11;
const CREDIT_PERIOD: usize = 12;
const CREDIT_OPENED: usize = 13;

// Notification: [mts, type, message_id, null, payload, code, status, text]
const NOTIFY_PAYLOAD: usize = 4;
const NOTIFY_STATUS: usize = 6;
const NOTIFY_TEXT: usize = 7;

fn rows<'a>(value: &'a Value, what: &str) -> ExchangeResult<&'a [Value]> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| ExchangeError::Decode(format!("{what} response is not an array")))
}

fn decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
}

fn decimal_at(row: &[Value], idx: usize) -> Option<Decimal> {
    row.get(idx).and_then(decimal)
}

fn u64_at(row: &[Value], idx: usize) -> Option<u64> {
    let v = row.get(idx)?;
    v.as_u64().or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

fn period_at(row: &[Value], idx: usize) -> Option<u32> {
    u64_at(row, idx)
        .and_then(|p| u32::try_from(p).ok())
        .filter(|p| *p > 0)
}

fn as_row(value: &Value) -> Option<&[Value]> {
    value.as_array().map(Vec::as_slice)
}

pub fn parse_funding_stats(value: &Value) -> ExchangeResult<Vec<FundingStat>> {
    Ok(rows(value, "funding stats")?
        .iter()
        .filter_map(as_row)
        .map(|row| FundingStat {
            timestamp_ms: u64_at(row, STAT_MTS).unwrap_or(0),
            amount_used: decimal_at(row, STAT_AMOUNT_USED).unwrap_or(Decimal::ZERO),
        })
        .collect())
}

pub fn parse_book(value: &Value) -> ExchangeResult<Vec<BookEntry>> {
    Ok(rows(value, "funding book")?
        .iter()
        .filter_map(as_row)
        .filter_map(|row| {
            Some(BookEntry {
                rate: Rate::new(decimal_at(row, BOOK_RATE)?),
                period_days: period_at(row, BOOK_PERIOD)?,
                count: u64_at(row, BOOK_COUNT)
                    .and_then(|c| u32::try_from(c).ok())
                    .unwrap_or(0),
                amount: decimal_at(row, BOOK_AMOUNT).unwrap_or(Decimal::ZERO),
            })
        })
        .collect())
}

pub fn parse_candles(value: &Value) -> ExchangeResult<Vec<Candle>> {
    Ok(rows(value, "candles")?
        .iter()
        .filter_map(as_row)
        .filter_map(|row| {
            let high = decimal_at(row, CANDLE_HIGH)?;
            let low = decimal_at(row, CANDLE_LOW)?;
            Some(Candle {
                timestamp_ms: u64_at(row, CANDLE_MTS).unwrap_or(0),
                open: Rate::new(decimal_at(row, CANDLE_OPEN).unwrap_or(low)),
                close: Rate::new(decimal_at(row, CANDLE_CLOSE).unwrap_or(low)),
                high: Rate::new(high),
                low: Rate::new(low),
                volume: decimal_at(row, CANDLE_VOLUME).unwrap_or(Decimal::ZERO),
            })
        })
        .collect())
}

/// Available balance of the funding wallet for `currency`; zero when absent.
pub fn parse_funding_balance(value: &Value, currency: &Currency) -> ExchangeResult<Amount> {
    let balance = rows(value, "wallets")?
        .iter()
        .filter_map(as_row)
        .find(|row| {
            row.get(WALLET_TYPE).and_then(Value::as_str) == Some("funding")
                && row.get(WALLET_CURRENCY).and_then(Value::as_str) == Some(currency.code())
        })
        .and_then(|row| decimal_at(row, WALLET_AVAILABLE))
        .unwrap_or(Decimal::ZERO);
    Ok(Amount::new(balance).non_negative())
}

pub fn parse_offers(value: &Value) -> ExchangeResult<Vec<RestingOrder>> {
    Ok(rows(value, "funding offers")?
        .iter()
        .filter_map(as_row)
        .filter_map(|row| {
            Some(RestingOrder {
                id: OfferId(u64_at(row, OFFER_ID)?),
                rate: Rate::new(decimal_at(row, OFFER_RATE)?),
                period_days: period_at(row, OFFER_PERIOD)?,
                amount: Amount::new(decimal_at(row, OFFER_AMOUNT).unwrap_or(Decimal::ZERO).abs()),
                origin: OfferOrigin::Ladder,
            })
        })
        .collect())
}

pub fn parse_credits(value: &Value) -> ExchangeResult<Vec<FundingCredit>> {
    Ok(rows(value, "funding credits")?
        .iter()
        .filter_map(as_row)
        .filter_map(|row| {
            Some(FundingCredit {
                id: OfferId(u64_at(row, CREDIT_ID)?),
                rate: Rate::new(decimal_at(row, CREDIT_RATE)?),
                period_days: period_at(row, CREDIT_PERIOD)?,
                amount: Amount::new(decimal_at(row, CREDIT_AMOUNT).unwrap_or(Decimal::ZERO).abs()),
                opened_at_ms: u64_at(row, CREDIT_OPENED).unwrap_or(0),
            })
        })
        .collect())
}

/// Accept a write-endpoint notification.
///
/// Fails unless the status is `SUCCESS`. Returns the id of the offer in the
/// payload when there is one.
pub fn parse_notification(value: &Value) -> ExchangeResult<Option<OfferId>> {
    let row = rows(value, "notification")?;
    let status = row.get(NOTIFY_STATUS).and_then(Value::as_str).unwrap_or("");
    if status != "SUCCESS" {
        let text = row
            .get(NOTIFY_TEXT)
            .and_then(Value::as_str)
            .unwrap_or("no message");
        return Err(ExchangeError::Rejected(format!("{status}: {text}")));
    }
    Ok(row
        .get(NOTIFY_PAYLOAD)
        .and_then(as_row)
        .and_then(|payload| u64_at(payload, OFFER_ID))
        .map(OfferId))
}
