//! Funding exchange abstraction.
//!
//! Everything the bot needs from the venue goes through [`FundingExchange`],
//! so cycles can run against the live client or against [`MockExchange`]
//! in tests.
//!
//! [`MockExchange`]: crate::mock::MockExchange

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use lendbot_core::{
    Amount, BookEntry, Candle, Currency, FundingCredit, FundingStat, OfferId, OfferRequest,
    RestingOrder,
};

use crate::error::ExchangeResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Market data and offer management for one funding account.
///
/// Histories (`funding_stats`, `candles`) are returned newest first.
/// Resting offers come back with [`OfferOrigin::Ladder`]; the caller
/// re-tags the ones it placed opportunistically.
///
/// [`OfferOrigin::Ladder`]: lendbot_core::OfferOrigin::Ladder
pub trait FundingExchange: Send + Sync {
    fn funding_stats<'a>(&'a self, currency: &'a Currency)
        -> BoxFuture<'a, ExchangeResult<Vec<FundingStat>>>;

    /// One page of the aggregated funding book.
    fn book_page<'a>(
        &'a self,
        currency: &'a Currency,
        page: u32,
        depth: u32,
    ) -> BoxFuture<'a, ExchangeResult<Vec<BookEntry>>>;

    /// Rate candles for the aggregate `key` (e.g. "a30:p2:p30").
    fn candles<'a>(
        &'a self,
        currency: &'a Currency,
        key: &'a str,
        limit: u32,
    ) -> BoxFuture<'a, ExchangeResult<Vec<Candle>>>;

    /// Available balance of the funding wallet.
    fn wallet_balance<'a>(&'a self, currency: &'a Currency) -> BoxFuture<'a, ExchangeResult<Amount>>;

    fn list_offers<'a>(&'a self, currency: &'a Currency)
        -> BoxFuture<'a, ExchangeResult<Vec<RestingOrder>>>;

    fn list_credits<'a>(&'a self, currency: &'a Currency)
        -> BoxFuture<'a, ExchangeResult<Vec<FundingCredit>>>;

    /// Place a lend offer. Returns the exchange id when the response has one.
    fn submit_offer<'a>(
        &'a self,
        currency: &'a Currency,
        request: &'a OfferRequest,
    ) -> BoxFuture<'a, ExchangeResult<Option<OfferId>>>;

    fn cancel_offer(&self, id: OfferId) -> BoxFuture<'_, ExchangeResult<()>>;

    fn cancel_all<'a>(&'a self, currency: &'a Currency) -> BoxFuture<'a, ExchangeResult<()>>;
}

/// Arc wrapper for FundingExchange trait objects.
pub type DynExchange = Arc<dyn FundingExchange>;
