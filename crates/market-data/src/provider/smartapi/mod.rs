//! Angel One SmartAPI quote provider.
//!
//! Prices tokens through the REST market quote endpoint using an existing
//! session (API key, client code and JWT). Session creation (login + TOTP)
//! happens outside this crate.
//!
//! # API Endpoints
//!
//! - Session check: `GET {base}/rest/secure/angelbroking/user/v1/getProfile`
//! - Quotes: `POST {base}/rest/secure/angelbroking/market/v1/quote/`
//!
//! # Response Format
//!
//! Every response is wrapped in `{status, message, errorcode, data}`. Quote
//! data splits into `fetched` rows and `unfetched` tokens.

mod models;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::errors::MarketDataError;
use crate::models::{ExchangeTokens, QuoteBatch, QuoteMode};
use crate::provider::{QuoteProvider, RateLimit, DEFAULT_MAX_TOKENS_PER_REQUEST};

use models::{Envelope, QuoteData, QuoteRequest};

pub const DEFAULT_BASE_URL: &str = "https://apiconnect.angelone.in";
const PROFILE_PATH: &str = "/rest/secure/angelbroking/user/v1/getProfile";
const QUOTE_PATH: &str = "/rest/secure/angelbroking/market/v1/quote/";
const PROVIDER_ID: &str = "SMARTAPI";

/// Default HTTP request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Session credentials issued by the broker.
#[derive(Clone)]
pub struct SmartApiCredentials {
    pub api_key: String,
    pub client_code: String,
    pub jwt_token: String,
}

impl std::fmt::Debug for SmartApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartApiCredentials")
            .field("client_code", &self.client_code)
            .finish_non_exhaustive()
    }
}

/// Tunables for [`SmartApiProvider`].
#[derive(Clone, Debug)]
pub struct SmartApiOptions {
    pub base_url: String,
    pub timeout: Duration,
    pub max_tokens_per_request: usize,
    pub rate_limit: RateLimit,
}

impl Default for SmartApiOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: REQUEST_TIMEOUT,
            max_tokens_per_request: DEFAULT_MAX_TOKENS_PER_REQUEST,
            rate_limit: RateLimit {
                // Broker budget for the quote endpoint
                requests_per_minute: 500,
                burst_capacity: 1,
                min_delay: Duration::from_secs(1),
            },
        }
    }
}

/// SmartAPI provider for live quotes.
///
/// # Example
///
/// ```ignore
/// let provider = SmartApiProvider::new(credentials, SmartApiOptions::default())?;
/// provider.connect().await?;
/// let batch = provider.fetch_quotes(QuoteMode::Full, &tokens).await?;
/// ```
pub struct SmartApiProvider {
    client: Client,
    credentials: SmartApiCredentials,
    options: SmartApiOptions,
    connected: AtomicBool,
}

impl SmartApiProvider {
    pub fn new(
        credentials: SmartApiCredentials,
        options: SmartApiOptions,
    ) -> Result<Self, MarketDataError> {
        let client = Client::builder().timeout(options.timeout).build()?;

        Ok(Self {
            client,
            credentials,
            options,
            connected: AtomicBool::new(false),
        })
    }

    fn headers(&self) -> Result<HeaderMap, MarketDataError> {
        let value = |raw: &str| {
            HeaderValue::from_str(raw).map_err(|e| MarketDataError::SessionUnavailable {
                provider: PROVIDER_ID.to_string(),
                message: format!("credential is not a valid header value: {}", e),
            })
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            value(&format!("Bearer {}", self.credentials.jwt_token))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("x-usertype", HeaderValue::from_static("USER"));
        headers.insert("x-sourceid", HeaderValue::from_static("WEB"));
        headers.insert("x-clientlocalip", HeaderValue::from_static("127.0.0.1"));
        headers.insert("x-clientpublicip", HeaderValue::from_static("127.0.0.1"));
        headers.insert("x-macaddress", HeaderValue::from_static("00:00:00:00:00:00"));
        headers.insert("x-privatekey", value(&self.credentials.api_key)?);
        Ok(headers)
    }

    /// Send a request and unwrap the response envelope.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<T>, MarketDataError> {
        let response = request
            .headers(self.headers()?)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if let Some(err) = map_http_status(status) {
            self.note_failure(&err);
            return Err(err);
        }

        let body = response.text().await.map_err(map_transport_error)?;
        let envelope: Envelope<T> =
            serde_json::from_str(&body).map_err(|e| MarketDataError::InvalidResponse {
                provider: PROVIDER_ID.to_string(),
                message: e.to_string(),
            })?;

        if !envelope.status {
            let err = map_envelope_error(&envelope.errorcode, &envelope.message);
            self.note_failure(&err);
            return Err(err);
        }

        Ok(envelope.data)
    }

    fn note_failure(&self, err: &MarketDataError) {
        if matches!(err, MarketDataError::SessionUnavailable { .. }) {
            self.connected.store(false, Ordering::SeqCst);
        }
    }
}

/// Maps reqwest failures that happen before a status code is available.
fn map_transport_error(err: reqwest::Error) -> MarketDataError {
    if err.is_timeout() {
        MarketDataError::Timeout {
            provider: PROVIDER_ID.to_string(),
        }
    } else {
        MarketDataError::Network(err)
    }
}

fn map_http_status(status: StatusCode) -> Option<MarketDataError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::TOO_MANY_REQUESTS => MarketDataError::RateLimited {
            provider: PROVIDER_ID.to_string(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => MarketDataError::SessionUnavailable {
            provider: PROVIDER_ID.to_string(),
            message: format!("HTTP error: {}", status),
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => MarketDataError::Timeout {
            provider: PROVIDER_ID.to_string(),
        },
        _ => MarketDataError::ProviderError {
            provider: PROVIDER_ID.to_string(),
            message: format!("HTTP error: {}", status),
        },
    })
}

/// Maps a `status: false` envelope to an error.
///
/// `AG8001`..`AG8003` are the invalid / expired / missing token codes.
fn map_envelope_error(errorcode: &str, message: &str) -> MarketDataError {
    if errorcode.starts_with("AG800") {
        return MarketDataError::SessionUnavailable {
            provider: PROVIDER_ID.to_string(),
            message: format!("{} ({})", message, errorcode),
        };
    }
    if message.to_ascii_lowercase().contains("access rate") {
        return MarketDataError::RateLimited {
            provider: PROVIDER_ID.to_string(),
        };
    }
    MarketDataError::ProviderError {
        provider: PROVIDER_ID.to_string(),
        message: if errorcode.is_empty() {
            message.to_string()
        } else {
            format!("{} ({})", message, errorcode)
        },
    }
}

#[async_trait]
impl QuoteProvider for SmartApiProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn rate_limit(&self) -> RateLimit {
        self.options.rate_limit.clone()
    }

    fn max_tokens_per_request(&self) -> usize {
        self.options.max_tokens_per_request
    }

    async fn connect(&self) -> Result<(), MarketDataError> {
        let url = format!("{}{}", self.options.base_url, PROFILE_PATH);
        let result = self
            .send::<serde_json::Value>(self.client.get(&url))
            .await;

        match result {
            Ok(_) => {
                debug!(
                    "SmartAPI session validated for client {}",
                    self.credentials.client_code
                );
                self.connected.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn fetch_quotes(
        &self,
        mode: QuoteMode,
        tokens: &ExchangeTokens,
    ) -> Result<QuoteBatch, MarketDataError> {
        let requested = tokens.total();
        let limit = self.max_tokens_per_request();
        if requested > limit {
            return Err(MarketDataError::RequestTooLarge { requested, limit });
        }
        if requested == 0 {
            return Ok(QuoteBatch {
                status: true,
                ..QuoteBatch::default()
            });
        }

        let url = format!("{}{}", self.options.base_url, QUOTE_PATH);
        let body = QuoteRequest {
            mode,
            exchange_tokens: tokens,
        };
        let data: QuoteData = self
            .send(self.client.post(&url).json(&body))
            .await?
            .unwrap_or_default();

        let mut batch = QuoteBatch {
            status: true,
            fetched: Vec::with_capacity(data.fetched.len()),
            unfetched: Vec::new(),
        };
        for row in data.fetched {
            match row.into_snapshot() {
                Ok(snapshot) => batch.fetched.push(snapshot),
                Err(token) => batch.unfetched.push(token),
            }
        }
        for entry in &data.unfetched {
            match entry.token() {
                Some(token) => batch.unfetched.push(token.to_string()),
                None => warn!("SmartAPI returned an unfetched entry without a token"),
            }
        }

        debug!(
            "SmartAPI {} quotes: {} requested, {} fetched, {} unfetched",
            mode,
            requested,
            batch.fetched.len(),
            batch.unfetched.len()
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RetryClass;
    use crate::models::ExchangeSegment;

    fn provider() -> SmartApiProvider {
        SmartApiProvider::new(
            SmartApiCredentials {
                api_key: "key".to_string(),
                client_code: "A123".to_string(),
                jwt_token: "jwt".to_string(),
            },
            SmartApiOptions {
                // Nothing listens here; tests must not reach the network
                base_url: "http://127.0.0.1:9".to_string(),
                max_tokens_per_request: 2,
                ..SmartApiOptions::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_oversized_request_is_rejected_before_io() {
        let provider = provider();
        let mut tokens = ExchangeTokens::new();
        tokens.push(ExchangeSegment::Nfo, "1");
        tokens.push(ExchangeSegment::Nfo, "2");
        tokens.push(ExchangeSegment::Nse, "3");

        let err = provider
            .fetch_quotes(QuoteMode::Full, &tokens)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MarketDataError::RequestTooLarge {
                requested: 3,
                limit: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_request_short_circuits() {
        let provider = provider();
        let batch = provider
            .fetch_quotes(QuoteMode::Ltp, &ExchangeTokens::new())
            .await
            .unwrap();
        assert!(batch.status);
        assert!(batch.fetched.is_empty());
        assert!(!provider.is_connected());
    }

    #[test]
    fn test_envelope_error_mapping() {
        let err = map_envelope_error("AG8001", "Invalid Token");
        assert_eq!(err.retry_class(), RetryClass::Reconnect);

        let err = map_envelope_error("", "Access denied because of exceeding access rate");
        assert!(err.is_rate_limited());

        let err = map_envelope_error("AB1004", "Something Went Wrong, Please Try After Sometime");
        assert_eq!(err.retry_class(), RetryClass::NextCycle);
        assert_eq!(
            err.to_string(),
            "Provider error: SMARTAPI - Something Went Wrong, Please Try After Sometime (AB1004)"
        );
    }

    #[test]
    fn test_http_status_mapping() {
        assert!(map_http_status(StatusCode::OK).is_none());
        assert!(map_http_status(StatusCode::TOO_MANY_REQUESTS)
            .unwrap()
            .is_rate_limited());
        assert_eq!(
            map_http_status(StatusCode::UNAUTHORIZED)
                .unwrap()
                .retry_class(),
            RetryClass::Reconnect
        );
        assert!(matches!(
            map_http_status(StatusCode::BAD_GATEWAY),
            Some(MarketDataError::ProviderError { .. })
        ));
    }

    #[test]
    fn test_credentials_debug_hides_secrets() {
        let creds = SmartApiCredentials {
            api_key: "secret-key".to_string(),
            client_code: "A123".to_string(),
            jwt_token: "secret-jwt".to_string(),
        };
        let printed = format!("{:?}", creds);
        assert!(printed.contains("A123"));
        assert!(!printed.contains("secret"));
    }
}
