//! Bitfinex REST v2 funding client.

use std::time::Duration;

use lendbot_core::{
    Amount, BookEntry, Candle, Currency, FundingCredit, FundingStat, OfferId, OfferRequest,
    RestingOrder,
};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::ExchangeConfig;
use crate::error::{ExchangeError, ExchangeResult};
use crate::exchange::{BoxFuture, FundingExchange};
use crate::signing::{sign_payload, Credentials, NonceSource};
use crate::wire;

/// Offer submission body.
#[derive(Debug, Serialize)]
struct SubmitOfferBody {
    #[serde(rename = "type")]
    order_type: &'static str,
    symbol: String,
    amount: String,
    rate: String,
    period: u32,
    flags: u32,
}

impl SubmitOfferBody {
    fn new(currency: &Currency, request: &OfferRequest) -> Self {
        Self {
            order_type: "LIMIT",
            symbol: currency.funding_symbol(),
            amount: request.amount.to_string(),
            rate: request.rate.to_string(),
            period: request.period_days,
            flags: 0,
        }
    }
}

#[derive(Debug, Serialize)]
struct CancelOfferBody {
    id: u64,
}

#[derive(Debug, Serialize)]
struct CancelAllBody {
    currency: String,
}

/// Funding client for Bitfinex. Public endpoints work without credentials.
pub struct BitfinexClient {
    http: Client,
    config: ExchangeConfig,
    credentials: Option<Credentials>,
    nonces: NonceSource,
}

impl BitfinexClient {
    pub fn new(config: ExchangeConfig, credentials: Option<Credentials>) -> ExchangeResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ExchangeError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        info!(
            public_url = %config.public_url,
            authenticated = credentials.is_some(),
            "Exchange client created"
        );

        Ok(Self {
            http,
            config,
            credentials,
            nonces: NonceSource::new(),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    async fn get_public(&self, path: &str) -> ExchangeResult<Value> {
        let url = format!("{}/{}", self.config.public_url, path);
        debug!(url = %url, "GET");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ExchangeError::HttpClient(format!("HTTP request failed: {e}")))?;
        Self::read_json(response).await
    }

    async fn post_auth<B: Serialize>(&self, path: &str, body: &B) -> ExchangeResult<Value> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or(ExchangeError::MissingCredentials)?;
        let body = serde_json::to_string(body)?;
        let nonce = self.nonces.next();
        let signature = sign_payload(&creds.api_secret, path, nonce, &body)?;

        let url = format!("{}/{}", self.config.auth_url, path);
        debug!(url = %url, "POST");
        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .header("bfx-nonce", nonce.to_string())
            .header("bfx-apikey", &creds.api_key)
            .header("bfx-signature", signature)
            .body(body)
            .send()
            .await
            .map_err(|e| ExchangeError::HttpClient(format!("HTTP request failed: {e}")))?;
        Self::read_json(response).await
    }

    async fn read_json(response: reqwest::Response) -> ExchangeResult<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .await
            .map_err(|e| ExchangeError::HttpClient(format!("Failed to parse response: {e}")))
    }

    fn candle_path(&self, currency: &Currency, key: &str, limit: u32) -> String {
        format!(
            "candles/trade:{}:{}:{}/hist?limit={}",
            self.config.candle_timeframe,
            currency.funding_symbol(),
            key,
            limit
        )
    }
}

impl FundingExchange for BitfinexClient {
    fn funding_stats<'a>(
        &'a self,
        currency: &'a Currency,
    ) -> BoxFuture<'a, ExchangeResult<Vec<FundingStat>>> {
        Box::pin(async move {
            let path = format!("funding/stats/{}/hist", currency.funding_symbol());
            wire::parse_funding_stats(&self.get_public(&path).await?)
        })
    }

    fn book_page<'a>(
        &'a self,
        currency: &'a Currency,
        page: u32,
        depth: u32,
    ) -> BoxFuture<'a, ExchangeResult<Vec<BookEntry>>> {
        Box::pin(async move {
            let path = format!("book/{}/P{page}?len={depth}", currency.funding_symbol());
            wire::parse_book(&self.get_public(&path).await?)
        })
    }

    fn candles<'a>(
        &'a self,
        currency: &'a Currency,
        key: &'a str,
        limit: u32,
    ) -> BoxFuture<'a, ExchangeResult<Vec<Candle>>> {
        Box::pin(async move {
            let path = self.candle_path(currency, key, limit);
            wire::parse_candles(&self.get_public(&path).await?)
        })
    }

    fn wallet_balance<'a>(&'a self, currency: &'a Currency) -> BoxFuture<'a, ExchangeResult<Amount>> {
        Box::pin(async move {
            let value = self.post_auth("auth/r/wallets", &serde_json::json!({})).await?;
            wire::parse_funding_balance(&value, currency)
        })
    }

    fn list_offers<'a>(
        &'a self,
        currency: &'a Currency,
    ) -> BoxFuture<'a, ExchangeResult<Vec<RestingOrder>>> {
        Box::pin(async move {
            let path = format!("auth/r/funding/offers/{}", currency.funding_symbol());
            wire::parse_offers(&self.post_auth(&path, &serde_json::json!({})).await?)
        })
    }

    fn list_credits<'a>(
        &'a self,
        currency: &'a Currency,
    ) -> BoxFuture<'a, ExchangeResult<Vec<FundingCredit>>> {
        Box::pin(async move {
            let path = format!("auth/r/funding/credits/{}", currency.funding_symbol());
            wire::parse_credits(&self.post_auth(&path, &serde_json::json!({})).await?)
        })
    }

    fn submit_offer<'a>(
        &'a self,
        currency: &'a Currency,
        request: &'a OfferRequest,
    ) -> BoxFuture<'a, ExchangeResult<Option<OfferId>>> {
        Box::pin(async move {
            let body = SubmitOfferBody::new(currency, request);
            let value = self.post_auth("auth/w/funding/offer/submit", &body).await?;
            wire::parse_notification(&value)
        })
    }

    fn cancel_offer(&self, id: OfferId) -> BoxFuture<'_, ExchangeResult<()>> {
        Box::pin(async move {
            let value = self
                .post_auth("auth/w/funding/offer/cancel", &CancelOfferBody { id: id.0 })
                .await?;
            wire::parse_notification(&value).map(|_| ())
        })
    }

    fn cancel_all<'a>(&'a self, currency: &'a Currency) -> BoxFuture<'a, ExchangeResult<()>> {
        Box::pin(async move {
            let body = CancelAllBody {
                currency: currency.code().to_string(),
            };
            let value = self.post_auth("auth/w/funding/offer/cancel/all", &body).await?;
            wire::parse_notification(&value).map(|_| ())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendbot_core::{OfferOrigin, Rate};
    use rust_decimal_macros::dec;

    #[test]
    fn test_submit_body_serialization() {
        let usd = Currency::parse("USD").unwrap();
        let request = OfferRequest {
            rate: Rate::new(dec!(0.0012)),
            amount: Amount::from(600),
            period_days: 30,
            origin: OfferOrigin::Opportunistic,
        };
        let json = serde_json::to_string(&SubmitOfferBody::new(&usd, &request)).unwrap();
        assert_eq!(
            json,
            r#"{"type":"LIMIT","symbol":"fUSD","amount":"600","rate":"0.0012","period":30,"flags":0}"#
        );
    }

    #[test]
    fn test_candle_path() {
        let client = BitfinexClient::new(ExchangeConfig::default(), None).unwrap();
        let usd = Currency::parse("fUSD").unwrap();
        assert_eq!(
            client.candle_path(&usd, "a30:p2:p30", 24),
            "candles/trade:1h:fUSD:a30:p2:p30/hist?limit=24"
        );
    }

    #[tokio::test]
    async fn test_authenticated_call_requires_credentials() {
        let client = BitfinexClient::new(ExchangeConfig::default(), None).unwrap();
        assert!(!client.has_credentials());
        let usd = Currency::parse("USD").unwrap();
        let err = client.list_offers(&usd).await.unwrap_err();
        assert!(matches!(err, ExchangeError::MissingCredentials));
    }
}
