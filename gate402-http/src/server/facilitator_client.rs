//! A [`Facilitator`] that talks to a _remote_ x402 facilitator over HTTP.
//!
//! [`FacilitatorClient`] posts to the `/verify` and `/settle` endpoints of a
//! facilitator and decodes the JSON replies.
//!
//! ## Timeouts
//!
//! The underlying [`reqwest::Client`] is built once from a
//! [`FacilitatorClientConfig`] and never mutated afterwards. Its timeout
//! applies uniformly to both calls and defaults to
//! [`DEFAULT_FACILITATOR_TIMEOUT`]. An expired timeout is a transport error,
//! never a business rejection, and nothing is retried.
//!
//! ## Error Handling
//!
//! [`FacilitatorClientError`] captures the failing stage:
//! - URL construction
//! - HTTP transport failures, including timeouts
//! - JSON deserialization errors
//! - Unexpected HTTP status responses

use std::fmt::Display;
use std::time::Duration;

use gate402::facilitator::Facilitator;
use gate402::proto::{SettleRequest, SettleResponse, VerifyRequest, VerifyResponse};
use http::{HeaderMap, StatusCode};
use reqwest::Client;
use url::Url;

#[cfg(feature = "telemetry")]
use tracing::{Instrument, Span};

use crate::constants::DEFAULT_FACILITATOR_TIMEOUT;

/// Immutable settings a [`FacilitatorClient`] is built from.
#[derive(Debug, Clone)]
pub struct FacilitatorClientConfig {
    /// Base URL; `verify` and `settle` are resolved relative to it.
    pub base_url: Url,
    /// Timeout applied to every request.
    pub timeout: Duration,
    /// Static headers sent with every request (e.g. an API key).
    pub headers: HeaderMap,
}

impl FacilitatorClientConfig {
    /// Creates a configuration with the default timeout and no extra headers.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_FACILITATOR_TIMEOUT,
            headers: HeaderMap::new(),
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets headers sent with every request.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// Parses and normalizes a base URL to exactly one trailing slash, so that
/// `https://f.example/facilitator` and `https://f.example/facilitator//`
/// both resolve `verify` to `https://f.example/facilitator/verify`.
impl TryFrom<&str> for FacilitatorClientConfig {
    type Error = FacilitatorClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let mut normalized = value.trim().trim_end_matches('/').to_owned();
        normalized.push('/');
        let url = Url::parse(&normalized).map_err(|e| FacilitatorClientError::UrlParse {
            context: "Failed to parse base url",
            source: e,
        })?;
        Ok(Self::new(url))
    }
}

/// A client for communicating with a remote x402 facilitator.
#[derive(Clone, Debug)]
pub struct FacilitatorClient {
    /// Base URL of the facilitator (e.g. `https://facilitator.example/`)
    base_url: Url,
    /// Full URL to `POST /verify` requests
    verify_url: Url,
    /// Full URL to `POST /settle` requests
    settle_url: Url,
    /// Shared HTTP client carrying timeout and default headers
    client: Client,
    /// Timeout the client was built with
    timeout: Duration,
}

impl Facilitator for FacilitatorClient {
    type Error = FacilitatorClientError;

    /// Verifies a payment payload with the facilitator.
    #[cfg(feature = "telemetry")]
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, Self::Error> {
        with_span(
            Self::verify(self, request),
            tracing::info_span!(
                "x402.facilitator_client.verify",
                timeout = ?self.timeout,
                otel.status_code = tracing::field::Empty,
                error.message = tracing::field::Empty,
            ),
        )
        .await
    }

    /// Verifies a payment payload with the facilitator.
    #[cfg(not(feature = "telemetry"))]
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, Self::Error> {
        Self::verify(self, request).await
    }

    /// Settles a verified payment with the facilitator.
    #[cfg(feature = "telemetry")]
    async fn settle(&self, request: &SettleRequest) -> Result<SettleResponse, Self::Error> {
        with_span(
            Self::settle(self, request),
            tracing::info_span!(
                "x402.facilitator_client.settle",
                timeout = ?self.timeout,
                otel.status_code = tracing::field::Empty,
                error.message = tracing::field::Empty,
            ),
        )
        .await
    }

    /// Settles a verified payment with the facilitator.
    #[cfg(not(feature = "telemetry"))]
    async fn settle(&self, request: &SettleRequest) -> Result<SettleResponse, Self::Error> {
        Self::settle(self, request).await
    }
}

/// Errors that can occur while interacting with a remote facilitator.
///
/// Every variant is a transport-class failure: the facilitator did not give
/// a usable answer.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    /// URL parse error.
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        /// Human-readable context.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP transport error, including timeouts.
    #[error("HTTP error: {context}: {source}")]
    Http {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// JSON deserialization error.
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// Unexpected HTTP status code.
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        /// Human-readable context.
        context: &'static str,
        /// The HTTP status code.
        status: StatusCode,
        /// The response body.
        body: String,
    },
    /// Failed to read response body.
    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
}

impl FacilitatorClientError {
    /// Returns `true` if the request gave up waiting for the facilitator.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Http { source, .. } | Self::ResponseBodyRead { source, .. } => {
                source.is_timeout()
            }
            _ => false,
        }
    }
}

impl FacilitatorClient {
    /// Returns the base URL used by this client.
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the computed `./verify` URL relative to [`FacilitatorClient::base_url`].
    pub const fn verify_url(&self) -> &Url {
        &self.verify_url
    }

    /// Returns the computed `./settle` URL relative to [`FacilitatorClient::base_url`].
    pub const fn settle_url(&self) -> &Url {
        &self.settle_url
    }

    /// Returns the timeout applied to every request.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Builds a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] if URL construction fails or the
    /// HTTP client cannot be built.
    pub fn try_new(config: FacilitatorClientConfig) -> Result<Self, FacilitatorClientError> {
        let FacilitatorClientConfig {
            base_url,
            timeout,
            headers,
        } = config;
        let verify_url =
            base_url
                .join("./verify")
                .map_err(|e| FacilitatorClientError::UrlParse {
                    context: "Failed to construct ./verify URL",
                    source: e,
                })?;
        let settle_url =
            base_url
                .join("./settle")
                .map_err(|e| FacilitatorClientError::UrlParse {
                    context: "Failed to construct ./settle URL",
                    source: e,
                })?;
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(FacilitatorClientError::ClientBuild)?;
        Ok(Self {
            base_url,
            verify_url,
            settle_url,
            client,
            timeout,
        })
    }

    /// Sends a `POST /verify` request to the facilitator.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] if the HTTP request fails.
    pub async fn verify(
        &self,
        request: &VerifyRequest,
    ) -> Result<VerifyResponse, FacilitatorClientError> {
        self.post_json(&self.verify_url, "POST /verify", request)
            .await
    }

    /// Sends a `POST /settle` request to the facilitator.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] if the HTTP request fails.
    pub async fn settle(
        &self,
        request: &SettleRequest,
    ) -> Result<SettleResponse, FacilitatorClientError> {
        self.post_json(&self.settle_url, "POST /settle", request)
            .await
    }

    /// POSTs `payload` as JSON and decodes a `200` reply as `R`.
    ///
    /// `context` is a human-readable identifier used in tracing and error messages (e.g. `"POST /verify"`).
    async fn post_json<T, R>(
        &self,
        url: &Url,
        context: &'static str,
        payload: &T,
    ) -> Result<R, FacilitatorClientError>
    where
        T: serde::Serialize + Sync + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let http_response = self
            .client
            .post(url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| FacilitatorClientError::Http { context, source: e })?;

        let result = if http_response.status() == StatusCode::OK {
            http_response
                .json::<R>()
                .await
                .map_err(|e| FacilitatorClientError::JsonDeserialization { context, source: e })
        } else {
            let status = http_response.status();
            let body = http_response
                .text()
                .await
                .map_err(|e| FacilitatorClientError::ResponseBodyRead { context, source: e })?;
            Err(FacilitatorClientError::HttpStatus {
                context,
                status,
                body,
            })
        };

        record_result_on_span(&result);

        result
    }
}

impl TryFrom<&str> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_new(FacilitatorClientConfig::try_from(value)?)
    }
}

impl TryFrom<String> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

/// Records the outcome of a request on a tracing span, including status and errors.
#[cfg(feature = "telemetry")]
fn record_result_on_span<R, E: Display>(result: &Result<R, E>) {
    let span = Span::current();
    match result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
        }
        Err(err) => {
            span.record("otel.status_code", "ERROR");
            span.record("error.message", tracing::field::display(err));
            tracing::event!(tracing::Level::ERROR, error = %err, "Request to facilitator failed");
        }
    }
}

/// Records the outcome of a request on a tracing span, including status and errors.
/// Noop if telemetry feature is off.
#[cfg(not(feature = "telemetry"))]
fn record_result_on_span<R, E: Display>(_result: &Result<R, E>) {}

/// Instruments a future with a given tracing span.
#[cfg(feature = "telemetry")]
fn with_span<F: Future>(fut: F, span: Span) -> impl Future<Output = F::Output> {
    fut.instrument(span)
}
