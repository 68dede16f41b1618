//! Multi-page market data fetches shared by both cycles.

use lendbot_core::{BookEntry, Currency};
use lendbot_exchange::{ExchangeResult, FundingExchange};
use tracing::{debug, warn};

/// Fetch book pages `0..pages` and concatenate them.
///
/// A failed first page fails the whole fetch. A later failure or an empty
/// page ends paging with what was collected so far.
pub async fn fetch_book(
    exchange: &dyn FundingExchange,
    currency: &Currency,
    pages: u32,
    depth: u32,
) -> ExchangeResult<Vec<BookEntry>> {
    let mut entries = Vec::new();
    for page in 0..pages {
        match exchange.book_page(currency, page, depth).await {
            Ok(rows) if rows.is_empty() => break,
            Ok(rows) => entries.extend(rows),
            Err(e) if page == 0 => return Err(e),
            Err(e) => {
                warn!(currency = %currency, page, error = %e, "Book page fetch failed, using partial book");
                break;
            }
        }
    }
    debug!(currency = %currency, rows = entries.len(), "Funding book fetched");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendbot_core::Rate;
    use lendbot_exchange::{ExchangeCall, MockExchange};
    use rust_decimal_macros::dec;

    fn usd() -> Currency {
        Currency::parse("USD").unwrap()
    }

    #[tokio::test]
    async fn test_stops_at_empty_page() {
        let mock = MockExchange::new();
        mock.set_book(vec![BookEntry {
            rate: Rate::new(dec!(0.0005)),
            period_days: 2,
            count: 1,
            amount: dec!(1000),
        }]);

        let book = fetch_book(&mock, &usd(), 5, 100).await.unwrap();
        assert_eq!(book.len(), 1);
        let pages = mock
            .calls()
            .into_iter()
            .filter(|c| matches!(c, ExchangeCall::BookPage { .. }))
            .count();
        assert_eq!(pages, 2);
    }

    #[tokio::test]
    async fn test_first_page_failure_is_error() {
        let mock = MockExchange::new();
        assert!(fetch_book(&mock, &usd(), 5, 100).await.is_err());
    }
}
