//! Scripted in-memory exchange for tests.
//!
//! Keeps one funding account: a balance per currency and a list of resting
//! offers. Submitting locks the offer amount out of the balance, cancelling
//! releases it. Every call is recorded for verification.

use std::collections::HashMap;

use lendbot_core::{
    Amount, BookEntry, Candle, Currency, FundingCredit, FundingStat, OfferId, OfferRequest, Rate,
    RestingOrder,
};
use parking_lot::Mutex;

use crate::error::{ExchangeError, ExchangeResult};
use crate::exchange::{BoxFuture, FundingExchange};

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeCall {
    FundingStats(Currency),
    BookPage { currency: Currency, page: u32 },
    Candles(Currency),
    WalletBalance(Currency),
    ListOffers(Currency),
    ListCredits(Currency),
    Submit { currency: Currency, request: OfferRequest },
    Cancel(OfferId),
    CancelAll(Currency),
}

#[derive(Debug, Default)]
struct MockState {
    stats: Option<Vec<FundingStat>>,
    book: Option<Vec<BookEntry>>,
    candles: Option<Vec<Candle>>,
    balances: HashMap<Currency, Amount>,
    offers: Vec<(Currency, RestingOrder)>,
    credits: HashMap<Currency, Vec<FundingCredit>>,
    next_id: u64,
    /// Successful submits allowed before every further submit fails.
    submit_budget: Option<usize>,
    fail_cancel: bool,
    calls: Vec<ExchangeCall>,
}

/// Mock funding exchange.
///
/// Market data starts unavailable (every fetch fails) until scripted with
/// the `set_*` methods. The first page of the book holds every scripted
/// row; further pages are empty.
#[derive(Debug)]
pub struct MockExchange {
    state: Mutex<MockState>,
}

impl Default for MockExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    pub fn set_stats(&self, stats: Vec<FundingStat>) {
        self.state.lock().stats = Some(stats);
    }

    pub fn set_book(&self, book: Vec<BookEntry>) {
        self.state.lock().book = Some(book);
    }

    pub fn set_candles(&self, candles: Vec<Candle>) {
        self.state.lock().candles = Some(candles);
    }

    pub fn set_balance(&self, currency: &Currency, amount: Amount) {
        self.state.lock().balances.insert(currency.clone(), amount);
    }

    pub fn set_credits(&self, currency: &Currency, credits: Vec<FundingCredit>) {
        self.state.lock().credits.insert(currency.clone(), credits);
    }

    /// Place a resting offer directly, without touching the balance.
    pub fn insert_offer(
        &self,
        currency: &Currency,
        rate: Rate,
        period_days: u32,
        amount: Amount,
    ) -> OfferId {
        let mut state = self.state.lock();
        let id = OfferId(state.next_id);
        state.next_id += 1;
        state.offers.push((
            currency.clone(),
            RestingOrder {
                id,
                rate,
                period_days,
                amount,
                origin: Default::default(),
            },
        ));
        id
    }

    /// Let `successes` more submits through, then fail the rest.
    pub fn fail_submits_after(&self, successes: usize) {
        self.state.lock().submit_budget = Some(successes);
    }

    pub fn set_fail_cancel(&self, fail: bool) {
        self.state.lock().fail_cancel = fail;
    }

    pub fn balance(&self, currency: &Currency) -> Amount {
        self.state
            .lock()
            .balances
            .get(currency)
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    pub fn offers(&self, currency: &Currency) -> Vec<RestingOrder> {
        self.state
            .lock()
            .offers
            .iter()
            .filter(|(c, _)| c == currency)
            .map(|(_, o)| o.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<ExchangeCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn submitted(&self) -> Vec<OfferRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ExchangeCall::Submit { request, .. } => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn cancelled(&self) -> Vec<OfferId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ExchangeCall::Cancel(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ExchangeCall) {
        self.state.lock().calls.push(call);
    }
}

fn unavailable(what: &str) -> ExchangeError {
    ExchangeError::Status {
        status: 503,
        body: format!("{what} not scripted"),
    }
}

impl FundingExchange for MockExchange {
    fn funding_stats<'a>(
        &'a self,
        currency: &'a Currency,
    ) -> BoxFuture<'a, ExchangeResult<Vec<FundingStat>>> {
        Box::pin(async move {
            self.record(ExchangeCall::FundingStats(currency.clone()));
            self.state.lock().stats.clone().ok_or_else(|| unavailable("stats"))
        })
    }

    fn book_page<'a>(
        &'a self,
        currency: &'a Currency,
        page: u32,
        _depth: u32,
    ) -> BoxFuture<'a, ExchangeResult<Vec<BookEntry>>> {
        Box::pin(async move {
            self.record(ExchangeCall::BookPage {
                currency: currency.clone(),
                page,
            });
            let book = self.state.lock().book.clone().ok_or_else(|| unavailable("book"))?;
            Ok(if page == 0 { book } else { Vec::new() })
        })
    }

    fn candles<'a>(
        &'a self,
        currency: &'a Currency,
        _key: &'a str,
        limit: u32,
    ) -> BoxFuture<'a, ExchangeResult<Vec<Candle>>> {
        Box::pin(async move {
            self.record(ExchangeCall::Candles(currency.clone()));
            let mut candles = self
                .state
                .lock()
                .candles
                .clone()
                .ok_or_else(|| unavailable("candles"))?;
            candles.truncate(limit as usize);
            Ok(candles)
        })
    }

    fn wallet_balance<'a>(&'a self, currency: &'a Currency) -> BoxFuture<'a, ExchangeResult<Amount>> {
        Box::pin(async move {
            self.record(ExchangeCall::WalletBalance(currency.clone()));
            Ok(self.balance(currency))
        })
    }

    fn list_offers<'a>(
        &'a self,
        currency: &'a Currency,
    ) -> BoxFuture<'a, ExchangeResult<Vec<RestingOrder>>> {
        Box::pin(async move {
            self.record(ExchangeCall::ListOffers(currency.clone()));
            Ok(self.offers(currency))
        })
    }

    fn list_credits<'a>(
        &'a self,
        currency: &'a Currency,
    ) -> BoxFuture<'a, ExchangeResult<Vec<FundingCredit>>> {
        Box::pin(async move {
            self.record(ExchangeCall::ListCredits(currency.clone()));
            Ok(self
                .state
                .lock()
                .credits
                .get(currency)
                .cloned()
                .unwrap_or_default())
        })
    }

    fn submit_offer<'a>(
        &'a self,
        currency: &'a Currency,
        request: &'a OfferRequest,
    ) -> BoxFuture<'a, ExchangeResult<Option<OfferId>>> {
        Box::pin(async move {
            self.record(ExchangeCall::Submit {
                currency: currency.clone(),
                request: request.clone(),
            });
            let mut state = self.state.lock();
            if let Some(budget) = state.submit_budget.as_mut() {
                if *budget == 0 {
                    return Err(ExchangeError::Rejected("ERROR: scripted failure".into()));
                }
                *budget -= 1;
            }
            let balance = state.balances.get(currency).copied().unwrap_or(Amount::ZERO);
            if request.amount > balance {
                return Err(ExchangeError::Rejected(
                    "ERROR: Invalid offer: not enough balance".into(),
                ));
            }
            state.balances.insert(currency.clone(), balance - request.amount);

            let id = OfferId(state.next_id);
            state.next_id += 1;
            state.offers.push((
                currency.clone(),
                RestingOrder {
                    id,
                    rate: request.rate,
                    period_days: request.period_days,
                    amount: request.amount,
                    origin: Default::default(),
                },
            ));
            Ok(Some(id))
        })
    }

    fn cancel_offer(&self, id: OfferId) -> BoxFuture<'_, ExchangeResult<()>> {
        Box::pin(async move {
            self.record(ExchangeCall::Cancel(id));
            let mut state = self.state.lock();
            if state.fail_cancel {
                return Err(ExchangeError::Rejected("ERROR: scripted failure".into()));
            }
            let Some(pos) = state.offers.iter().position(|(_, o)| o.id == id) else {
                return Err(ExchangeError::Rejected(format!("ERROR: offer {id} not found")));
            };
            let (currency, order) = state.offers.remove(pos);
            *state.balances.entry(currency).or_default() += order.amount;
            Ok(())
        })
    }

    fn cancel_all<'a>(&'a self, currency: &'a Currency) -> BoxFuture<'a, ExchangeResult<()>> {
        Box::pin(async move {
            self.record(ExchangeCall::CancelAll(currency.clone()));
            let mut state = self.state.lock();
            if state.fail_cancel {
                return Err(ExchangeError::Rejected("ERROR: scripted failure".into()));
            }
            let (cancelled, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.offers)
                .into_iter()
                .partition(|(c, _)| c == currency);
            state.offers = kept;
            let released: Amount = cancelled.iter().map(|(_, o)| o.amount).sum();
            *state.balances.entry(currency.clone()).or_default() += released;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendbot_core::OfferOrigin;
    use rust_decimal_macros::dec;

    fn usd() -> Currency {
        Currency::parse("USD").unwrap()
    }

    fn request(amount: u64) -> OfferRequest {
        OfferRequest {
            rate: Rate::new(dec!(0.0005)),
            amount: Amount::from(amount),
            period_days: 30,
            origin: OfferOrigin::Ladder,
        }
    }

    #[tokio::test]
    async fn test_submit_and_cancel_move_funds() {
        let mock = MockExchange::new();
        mock.set_balance(&usd(), Amount::from(1000));

        let id = mock.submit_offer(&usd(), &request(400)).await.unwrap().unwrap();
        assert_eq!(mock.balance(&usd()), Amount::from(600));
        assert_eq!(mock.offers(&usd()).len(), 1);

        mock.cancel_offer(id).await.unwrap();
        assert_eq!(mock.balance(&usd()), Amount::from(1000));
        assert!(mock.offers(&usd()).is_empty());
        assert_eq!(mock.cancelled(), vec![id]);
    }

    #[tokio::test]
    async fn test_submit_rejects_overdraw() {
        let mock = MockExchange::new();
        mock.set_balance(&usd(), Amount::from(100));
        assert!(mock.submit_offer(&usd(), &request(150)).await.is_err());
        assert_eq!(mock.balance(&usd()), Amount::from(100));
    }

    #[tokio::test]
    async fn test_scripted_submit_failure() {
        let mock = MockExchange::new();
        mock.set_balance(&usd(), Amount::from(1000));
        mock.fail_submits_after(1);
        assert!(mock.submit_offer(&usd(), &request(200)).await.is_ok());
        assert!(mock.submit_offer(&usd(), &request(200)).await.is_err());
        assert_eq!(mock.submitted().len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_all_releases_currency_only() {
        let mock = MockExchange::new();
        let eur = Currency::parse("EUR").unwrap();
        mock.insert_offer(&usd(), Rate::new(dec!(0.0005)), 2, Amount::from(300));
        mock.insert_offer(&eur, Rate::new(dec!(0.0005)), 2, Amount::from(200));

        mock.cancel_all(&usd()).await.unwrap();
        assert!(mock.offers(&usd()).is_empty());
        assert_eq!(mock.offers(&eur).len(), 1);
        assert_eq!(mock.balance(&usd()), Amount::from(300));
    }

    #[tokio::test]
    async fn test_unscripted_market_data_fails() {
        let mock = MockExchange::new();
        assert!(mock.funding_stats(&usd()).await.is_err());
        mock.set_book(vec![]);
        assert!(mock.book_page(&usd(), 0, 100).await.unwrap().is_empty());
    }
}
