//! Last observed resting offers and their origin tags.
//!
//! The exchange stays authoritative. This cache only remembers what each
//! cycle last saw, plus which offers the bot placed opportunistically, so
//! refreshed orders come back with the right [`OfferOrigin`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use lendbot_core::{Currency, OfferId, OfferOrigin, RestingOrder};
use parking_lot::RwLock;

/// Position of an exchange listing request in the cache's event order.
///
/// Taken before `list_offers` is awaited, so tags recorded while the
/// request was in flight are recognised as newer than the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ListingTicket(u64);

#[derive(Debug, Clone, Copy)]
struct OriginTag {
    origin: OfferOrigin,
    recorded: u64,
}

#[derive(Debug, Default)]
struct CurrencyOffers {
    orders: Vec<RestingOrder>,
    origins: HashMap<OfferId, OriginTag>,
}

#[derive(Debug, Default)]
pub struct OfferCache {
    inner: RwLock<HashMap<Currency, CurrencyOffers>>,
    sequence: AtomicU64,
}

impl OfferCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// Ticket for a listing about to be requested from the exchange.
    pub fn listing_ticket(&self) -> ListingTicket {
        ListingTicket(self.next_sequence())
    }

    /// Remember who placed `id`.
    pub fn record_origin(&self, currency: &Currency, id: OfferId, origin: OfferOrigin) {
        let recorded = self.next_sequence();
        self.inner
            .write()
            .entry(currency.clone())
            .or_default()
            .origins
            .insert(id, OriginTag { origin, recorded });
    }

    /// Replace the cached offers with an exchange listing requested at `ticket`.
    ///
    /// Orders are stamped with their recorded origin (default ladder). Tags
    /// of offers missing from the listing are dropped unless they were
    /// recorded after the listing was requested.
    pub fn refresh(
        &self,
        currency: &Currency,
        ticket: ListingTicket,
        mut orders: Vec<RestingOrder>,
    ) -> Vec<RestingOrder> {
        let mut inner = self.inner.write();
        let entry = inner.entry(currency.clone()).or_default();

        entry
            .origins
            .retain(|id, tag| tag.recorded > ticket.0 || orders.iter().any(|o| o.id == *id));
        for order in &mut orders {
            order.origin = entry
                .origins
                .get(&order.id)
                .map(|tag| tag.origin)
                .unwrap_or_default();
        }
        entry.orders = orders.clone();
        orders
    }

    /// Drop one offer after a successful cancel.
    pub fn forget(&self, currency: &Currency, id: OfferId) {
        if let Some(entry) = self.inner.write().get_mut(currency) {
            entry.orders.retain(|o| o.id != id);
            entry.origins.remove(&id);
        }
    }

    /// Drop everything for `currency` after a cancel-all.
    pub fn clear(&self, currency: &Currency) {
        if let Some(entry) = self.inner.write().get_mut(currency) {
            entry.orders.clear();
            entry.origins.clear();
        }
    }

    #[must_use]
    pub fn count(&self, currency: &Currency) -> usize {
        self.inner.read().get(currency).map_or(0, |e| e.orders.len())
    }

    /// Cached offers per origin as `(ladder, opportunistic)`.
    #[must_use]
    pub fn count_by_origin(&self, currency: &Currency) -> (usize, usize) {
        self.inner.read().get(currency).map_or((0, 0), |e| {
            let opportunistic = e
                .orders
                .iter()
                .filter(|o| o.origin == OfferOrigin::Opportunistic)
                .count();
            (e.orders.len() - opportunistic, opportunistic)
        })
    }
}
