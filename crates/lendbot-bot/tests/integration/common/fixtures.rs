//! Market data and application fixtures.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use lendbot_bot::{AppConfig, Application, OperatingMode, ScheduleConfig};
use lendbot_core::{Amount, BookEntry, Candle, Currency, FundingStat, Rate};
use lendbot_exchange::MockExchange;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const NOW_MS: u64 = 1_700_000_000_000;

pub fn usd() -> Currency {
    Currency::parse("USD").unwrap()
}

/// 03:00 local, outside every full-reset slot.
pub fn quiet_hour() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 14)
        .unwrap()
        .and_hms_opt(3, 0, 0)
        .unwrap()
}

pub fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 14)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn entry(rate: Decimal, period_days: u32, count: u32, amount: Decimal) -> BookEntry {
    BookEntry {
        rate: Rate::new(rate),
        period_days,
        count,
        amount,
    }
}

/// Utilization doubled against its 12-row average.
pub fn stats() -> Vec<FundingStat> {
    (0..13)
        .map(|i| FundingStat {
            timestamp_ms: NOW_MS - i * 3_600_000,
            amount_used: if i == 0 { dec!(2000) } else { dec!(1000) },
        })
        .collect()
}

pub fn ladder_book() -> Vec<BookEntry> {
    vec![
        entry(dec!(0.0005), 2, 5, dec!(10000)),
        entry(dec!(0.0006), 30, 3, dec!(5000)),
        entry(dec!(0.0007), 60, 2, dec!(3000)),
        entry(dec!(0.0009), 120, 1, dec!(2000)),
    ]
}

/// One borrower paying 0.0012 for 30 days, plus ordinary supply.
pub fn opportunity_book() -> Vec<BookEntry> {
    vec![
        entry(dec!(0.0012), 30, 1, dec!(-20000)),
        entry(dec!(0.0005), 2, 5, dec!(10000)),
    ]
}

pub fn candles() -> Vec<Candle> {
    (0..24)
        .map(|i| Candle {
            timestamp_ms: NOW_MS - i * 3_600_000,
            open: Rate::new(dec!(0.0004)),
            close: Rate::new(dec!(0.0005)),
            high: Rate::new(dec!(0.0006)),
            low: Rate::new(dec!(0.0003)),
            volume: dec!(100000),
        })
        .collect()
}

pub fn config(mode: OperatingMode) -> AppConfig {
    AppConfig {
        mode,
        schedule: ScheduleConfig::default().without_pauses(),
        ..Default::default()
    }
}

/// Mock with every market feed scripted and `balance` in USD.
pub fn scripted_exchange(book: Vec<BookEntry>, balance: u64) -> Arc<MockExchange> {
    let mock = Arc::new(MockExchange::new());
    mock.set_stats(stats());
    mock.set_book(book);
    mock.set_candles(candles());
    mock.set_balance(&usd(), Amount::from(balance));
    mock
}

pub fn app(mock: &Arc<MockExchange>, mode: OperatingMode) -> Application {
    Application::new(config(mode), mock.clone()).unwrap()
}
