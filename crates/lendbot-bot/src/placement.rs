//! Sequential, fail-fast order mutations.
//!
//! All submits and cancels go through [`OrderPlacer`]. In observation mode
//! it logs what it would do and touches nothing.

use std::sync::Arc;
use std::time::Duration;

use lendbot_core::{Currency, OfferId, OfferRequest, RestingOrder};
use lendbot_exchange::DynExchange;
use lendbot_telemetry::Metrics;
use tracing::{info, warn};

use crate::config::OperatingMode;
use crate::error::CycleError;
use crate::state::BotState;

/// Outcome of a batch of mutations.
#[derive(Debug, Default)]
pub struct PlacementResult {
    /// Mutations that reached the exchange successfully.
    pub completed: usize,
    /// First failure; later items were not attempted.
    pub error: Option<CycleError>,
}

pub struct OrderPlacer {
    exchange: DynExchange,
    state: Arc<BotState>,
    mode: OperatingMode,
    submit_pause: Duration,
}

impl OrderPlacer {
    pub fn new(
        exchange: DynExchange,
        state: Arc<BotState>,
        mode: OperatingMode,
        submit_pause: Duration,
    ) -> Self {
        Self {
            exchange,
            state,
            mode,
            submit_pause,
        }
    }

    pub fn is_live(&self) -> bool {
        self.mode == OperatingMode::Trading
    }

    pub async fn cancel(
        &self,
        currency: &Currency,
        order: &RestingOrder,
        reason: &'static str,
    ) -> Result<bool, CycleError> {
        if !self.is_live() {
            info!(
                currency = %currency,
                id = %order.id,
                rate = %order.rate,
                period = order.period_days,
                reason,
                "Observation mode: would cancel offer"
            );
            return Ok(false);
        }

        match self.exchange.cancel_offer(order.id).await {
            Ok(()) => {
                self.state.offers.forget(currency, order.id);
                Metrics::offer_cancelled(currency.code(), reason);
                info!(
                    currency = %currency,
                    id = %order.id,
                    rate = %order.rate,
                    period = order.period_days,
                    reason,
                    "Offer cancelled"
                );
                Ok(true)
            }
            Err(e) => {
                Metrics::submission_error(currency.code(), "cancel");
                warn!(currency = %currency, id = %order.id, error = %e, "Cancel failed");
                Err(CycleError::submission("cancel")(e))
            }
        }
    }

    /// Cancel in order, stopping at the first failure.
    pub async fn cancel_orders(
        &self,
        currency: &Currency,
        orders: &[RestingOrder],
        reason: &'static str,
    ) -> PlacementResult {
        let mut result = PlacementResult::default();
        for order in orders {
            match self.cancel(currency, order, reason).await {
                Ok(true) => result.completed += 1,
                Ok(false) => {}
                Err(e) => {
                    result.error = Some(e);
                    break;
                }
            }
        }
        result
    }

    pub async fn cancel_all(&self, currency: &Currency, reason: &'static str) -> Result<(), CycleError> {
        if !self.is_live() {
            info!(currency = %currency, reason, "Observation mode: would cancel all offers");
            return Ok(());
        }
        let resting = self.state.offers.count(currency);
        self.exchange
            .cancel_all(currency)
            .await
            .map_err(|e| {
                Metrics::submission_error(currency.code(), "cancel_all");
                CycleError::submission("cancel_all")(e)
            })?;
        self.state.offers.clear(currency);
        for _ in 0..resting {
            Metrics::offer_cancelled(currency.code(), reason);
        }
        info!(currency = %currency, reason, "All offers cancelled");
        Ok(())
    }

    /// Submit one offer and tag it with its origin.
    pub async fn submit(
        &self,
        currency: &Currency,
        request: &OfferRequest,
    ) -> Result<Option<OfferId>, CycleError> {
        if !self.is_live() {
            info!(
                currency = %currency,
                rate = %request.rate,
                amount = %request.amount,
                period = request.period_days,
                origin = %request.origin,
                "Observation mode: would submit offer"
            );
            return Ok(None);
        }

        match self.exchange.submit_offer(currency, request).await {
            Ok(id) => {
                if let Some(id) = id {
                    self.state.offers.record_origin(currency, id, request.origin);
                }
                Metrics::offer_submitted(currency.code(), &request.origin.to_string());
                info!(
                    currency = %currency,
                    id = ?id.map(|i| i.0),
                    rate = %request.rate,
                    apr_pct = %request.rate.apr_pct(),
                    amount = %request.amount,
                    period = request.period_days,
                    origin = %request.origin,
                    "Offer submitted"
                );
                if !self.submit_pause.is_zero() {
                    tokio::time::sleep(self.submit_pause).await;
                }
                Ok(id)
            }
            Err(e) => {
                Metrics::submission_error(currency.code(), "submit");
                warn!(
                    currency = %currency,
                    rate = %request.rate,
                    amount = %request.amount,
                    period = request.period_days,
                    error = %e,
                    "Submit failed"
                );
                Err(CycleError::submission("submit")(e))
            }
        }
    }

    /// Submit in order, stopping at the first failure.
    pub async fn submit_all(&self, currency: &Currency, requests: &[OfferRequest]) -> PlacementResult {
        let mut result = PlacementResult::default();
        for request in requests {
            match self.submit(currency, request).await {
                Ok(_) if self.is_live() => result.completed += 1,
                Ok(_) => {}
                Err(e) => {
                    result.error = Some(e);
                    break;
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendbot_core::{Amount, OfferOrigin, Rate};
    use lendbot_exchange::MockExchange;
    use rust_decimal_macros::dec;

    fn usd() -> Currency {
        Currency::parse("USD").unwrap()
    }

    fn request(amount: u64, origin: OfferOrigin) -> OfferRequest {
        OfferRequest {
            rate: Rate::new(dec!(0.0006)),
            amount: Amount::from(amount),
            period_days: 60,
            origin,
        }
    }

    fn placer(mock: &Arc<MockExchange>, mode: OperatingMode) -> (OrderPlacer, Arc<BotState>) {
        let state = Arc::new(BotState::new());
        let placer = OrderPlacer::new(mock.clone(), state.clone(), mode, Duration::ZERO);
        (placer, state)
    }

    #[tokio::test]
    async fn test_submit_all_fails_fast() {
        let mock = Arc::new(MockExchange::new());
        mock.set_balance(&usd(), Amount::from(1000));
        mock.fail_submits_after(1);
        let (placer, _) = placer(&mock, OperatingMode::Trading);

        let requests = vec![
            request(200, OfferOrigin::Ladder),
            request(200, OfferOrigin::Ladder),
            request(200, OfferOrigin::Ladder),
        ];
        let result = placer.submit_all(&usd(), &requests).await;
        assert_eq!(result.completed, 1);
        assert!(matches!(
            result.error,
            Some(CycleError::Submission { op: "submit", .. })
        ));
        // The third request was never attempted.
        assert_eq!(mock.submitted().len(), 2);
    }

    #[tokio::test]
    async fn test_submit_records_origin() {
        let mock = Arc::new(MockExchange::new());
        mock.set_balance(&usd(), Amount::from(1000));
        let (placer, state) = placer(&mock, OperatingMode::Trading);

        let id = placer
            .submit(&usd(), &request(300, OfferOrigin::Opportunistic))
            .await
            .unwrap()
            .unwrap();
        let ticket = state.offers.listing_ticket();
        let orders = state.offers.refresh(&usd(), ticket, mock.offers(&usd()));
        assert_eq!(orders[0].id, id);
        assert_eq!(orders[0].origin, OfferOrigin::Opportunistic);
    }

    #[tokio::test]
    async fn test_observation_mode_touches_nothing() {
        let mock = Arc::new(MockExchange::new());
        let id = mock.insert_offer(&usd(), Rate::new(dec!(0.0003)), 2, Amount::from(200));
        let (placer, _) = placer(&mock, OperatingMode::Observation);

        let order = mock.offers(&usd()).remove(0);
        assert!(!placer.cancel(&usd(), &order, "reconcile").await.unwrap());
        let result = placer
            .submit_all(&usd(), &[request(200, OfferOrigin::Ladder)])
            .await;
        assert_eq!(result.completed, 0);
        placer.cancel_all(&usd(), "startup").await.unwrap();

        assert!(mock.calls().is_empty());
        assert_eq!(mock.offers(&usd())[0].id, id);
    }

    #[tokio::test]
    async fn test_cancel_orders_fails_fast() {
        let mock = Arc::new(MockExchange::new());
        mock.insert_offer(&usd(), Rate::new(dec!(0.0003)), 2, Amount::from(200));
        mock.insert_offer(&usd(), Rate::new(dec!(0.0004)), 2, Amount::from(200));
        mock.set_fail_cancel(true);
        let (placer, _) = placer(&mock, OperatingMode::Trading);

        let result = placer
            .cancel_orders(&usd(), &mock.offers(&usd()), "reconcile")
            .await;
        assert_eq!(result.completed, 0);
        assert!(result.error.is_some());
        assert_eq!(mock.cancelled().len(), 1);
    }
}
