//! The payment gate: the per-request verify-then-settle state machine.
//!
//! ```text
//! START ─ no header ──────────────────────────────▶ PaymentRequired (402)
//!       ─ header does not decode ─────────────────▶ MalformedProof (400)
//!       ─ no requirement matches scheme/network ──▶ NoMatchingRequirements (402)
//!       ─ verify transport error ─────────────────▶ VerificationUnavailable (500)
//!       ─ every candidate invalid ────────────────▶ Invalid (402, last reason)
//!       ─ settle transport error ─────────────────▶ SettlementUnavailable (500)
//!       ─ settle reports failure ─────────────────▶ SettlementFailed (500)
//!       ─ settle succeeds ────────────────────────▶ Paid → handler runs
//! ```
//!
//! Settlement is only ever attempted for a requirement that verified, is
//! attempted at most once per request, and runs on its own task so that a
//! client hanging up cannot cancel it halfway.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::Request;
use axum::response::Response;
use gate402::config::ResourceConfig;
use gate402::facilitator::Facilitator;
use gate402::proto::{
    PaymentPayload, PaymentRequirements, ResourceInfo, SettleRequest, SettleResponse,
    VerifyRequest, VerifyResponse, WireFormat,
};
use gate402::requirements::{RequirementsError, build_requirements};
use gate402::scheme::MechanismRegistry;
use http::HeaderMap;
use tower::{Service, ServiceExt};

#[cfg(feature = "telemetry")]
use tracing::{Instrument, instrument};

use super::error::Rejection;
use super::render::{Renderer, settled_response};
use crate::headers::{decode_proof_header, find_proof};

/// What the protected handler learns about the payment that unlocked it.
///
/// Inserted into the request extensions before the handler runs, so axum
/// handlers can take it as `Extension<PaymentContext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentContext {
    /// Paying address, when the facilitator reported one.
    pub payer: Option<String>,
    /// Settlement transaction identifier.
    pub transaction: String,
    /// Network the payment settled on.
    pub network: String,
    /// The requirement the payment satisfied.
    pub requirements: PaymentRequirements,
}

impl PaymentContext {
    /// The settlement receipt returned to the client.
    #[must_use]
    pub fn receipt(&self) -> SettleResponse {
        SettleResponse::Success {
            payer: self.payer.clone(),
            transaction: self.transaction.clone(),
            network: self.network.clone(),
        }
    }
}

/// A settled payment, holding the right to run the protected handler once.
#[derive(Debug)]
pub struct Paid {
    context: PaymentContext,
    format: WireFormat,
}

impl Paid {
    /// Details of the settled payment.
    #[must_use]
    pub const fn context(&self) -> &PaymentContext {
        &self.context
    }

    /// Runs `inner` with the payment context attached and finishes its
    /// response with the settlement receipt.
    pub async fn run<S>(self, inner: S, mut req: Request) -> Response
    where
        S: Service<Request, Response = Response, Error = Infallible>,
    {
        req.extensions_mut().insert(self.context.clone());

        #[cfg(feature = "telemetry")]
        let response = inner.oneshot(req).instrument(tracing::info_span!("inner")).await;
        #[cfg(not(feature = "telemetry"))]
        let response = inner.oneshot(req).await;

        let response = match response {
            Ok(response) => response,
            Err(never) => match never {},
        };
        settled_response(self.format, response, &self.context).await
    }
}

/// A requirement the facilitator accepted, waiting to be settled.
struct Verified<'a> {
    request: VerifyRequest,
    requirements: &'a PaymentRequirements,
    payer: Option<String>,
}

/// Payment gate for one protected resource.
///
/// Requirements are built once, at construction, from static configuration
/// and a frozen mechanism registry; nothing about the gate changes while it
/// serves requests.
#[derive(Debug)]
pub struct Gate<F> {
    facilitator: F,
    mechanisms: Arc<MechanismRegistry>,
    accepts: Vec<PaymentRequirements>,
    resource: ResourceInfo,
    format: WireFormat,
}

impl<F> Gate<F> {
    /// Builds the gate for `config`, speaking the current wire format.
    ///
    /// # Errors
    ///
    /// Returns [`RequirementsError`] when any payment option cannot be
    /// turned into a requirement, including when no mechanism is registered
    /// for it. This is meant to stop the service from starting.
    pub fn new(
        facilitator: F,
        mechanisms: Arc<MechanismRegistry>,
        config: &ResourceConfig,
    ) -> Result<Self, RequirementsError> {
        let accepts = build_requirements(config, &mechanisms)?;
        Ok(Self {
            facilitator,
            mechanisms,
            accepts,
            resource: config.resource_info(),
            format: WireFormat::default(),
        })
    }

    /// Selects the wire format of challenges, receipts and facilitator bodies.
    #[must_use]
    pub fn with_wire_format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }

    /// The offered requirements, in configuration order.
    #[must_use]
    pub fn accepts(&self) -> &[PaymentRequirements] {
        &self.accepts
    }

    /// The protected resource.
    #[must_use]
    pub const fn resource(&self) -> &ResourceInfo {
        &self.resource
    }

    /// The wire format in use.
    #[must_use]
    pub const fn wire_format(&self) -> WireFormat {
        self.format
    }

    /// The facilitator payments are verified and settled with.
    #[must_use]
    pub const fn facilitator(&self) -> &F {
        &self.facilitator
    }

    /// Renderer for this gate's rejections.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        Renderer {
            format: self.format,
            accepts: &self.accepts,
            resource: &self.resource,
        }
    }
}

impl<F> Gate<F>
where
    F: Facilitator + Clone + 'static,
{
    /// Evaluates the payment carried by `headers`.
    ///
    /// Returns [`Paid`] only after settlement succeeded.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] the request ended in.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "x402.gate.evaluate",
            skip_all,
            fields(resource = %self.resource.url, format = %self.format)
        )
    )]
    pub async fn evaluate(&self, headers: &HeaderMap) -> Result<Paid, Rejection> {
        let header = find_proof(headers, self.format).ok_or(Rejection::PaymentRequired)?;
        let payload = decode_proof_header(header).map_err(|err| {
            #[cfg(feature = "telemetry")]
            tracing::info!(error = %err, "Rejected undecodable payment header");
            Rejection::MalformedProof(err.to_string())
        })?;
        let verified = self.verify(&payload).await?;
        self.settle(verified).await
    }

    /// Runs the whole gate for `req`: the handler on success, the rendered
    /// rejection otherwise.
    pub async fn handle<S>(&self, inner: S, req: Request) -> Response
    where
        S: Service<Request, Response = Response, Error = Infallible>,
    {
        let outcome = self.evaluate(req.headers()).await;
        match outcome {
            Ok(paid) => paid.run(inner, req).await,
            Err(rejection) => self.renderer().rejection(&rejection),
        }
    }

    /// Verifies the proof against each matching requirement in order and
    /// returns the first one the facilitator accepts.
    async fn verify<'a>(&'a self, payload: &PaymentPayload) -> Result<Verified<'a>, Rejection> {
        let mut last_invalid = None;
        let candidates = self
            .accepts
            .iter()
            .filter(|r| r.scheme == payload.scheme && r.network == payload.network);

        for requirements in candidates {
            let mechanism = self
                .mechanisms
                .resolve(&requirements.scheme, &requirements.network)?;
            if let Err(err) = mechanism.check_payload(payload) {
                last_invalid = Some(Rejection::Invalid {
                    reason: err.reason().to_string(),
                    message: Some(err.to_string()),
                    payer: None,
                });
                continue;
            }

            let request = self
                .format
                .verify_request(payload, requirements, &self.resource);
            match self.facilitator.verify(&request).await {
                Ok(VerifyResponse::Valid { payer }) => {
                    return Ok(Verified {
                        request,
                        requirements,
                        payer,
                    });
                }
                Ok(VerifyResponse::Invalid {
                    reason,
                    message,
                    payer,
                }) => {
                    #[cfg(feature = "telemetry")]
                    tracing::warn!(
                        reason = %reason,
                        network = %requirements.network,
                        pay_to = %requirements.pay_to,
                        "Payment proof rejected by facilitator"
                    );
                    last_invalid = Some(Rejection::Invalid {
                        reason,
                        message,
                        payer,
                    });
                }
                Err(err) => {
                    #[cfg(feature = "telemetry")]
                    tracing::error!(error = %err, "Payment verification call failed");
                    return Err(Rejection::VerificationUnavailable(err.to_string()));
                }
            }
        }

        Err(last_invalid.unwrap_or(Rejection::NoMatchingRequirements))
    }

    /// Settles a verified payment exactly once.
    async fn settle(&self, verified: Verified<'_>) -> Result<Paid, Rejection> {
        let Verified {
            request,
            requirements,
            payer,
        } = verified;
        let request = SettleRequest::from(request);
        let facilitator = self.facilitator.clone();

        // Detached so that dropping the request future does not drop the call.
        let outcome = tokio::spawn(async move { facilitator.settle(&request).await }).await;

        match outcome {
            Ok(Ok(SettleResponse::Success {
                payer: settled_payer,
                transaction,
                network,
            })) => {
                #[cfg(feature = "telemetry")]
                tracing::info!(transaction = %transaction, network = %network, "Payment settled");
                Ok(Paid {
                    context: PaymentContext {
                        payer: settled_payer.or(payer),
                        transaction,
                        network,
                        requirements: requirements.clone(),
                    },
                    format: self.format,
                })
            }
            Ok(Ok(SettleResponse::Error {
                reason,
                message,
                network,
            })) => {
                #[cfg(feature = "telemetry")]
                tracing::error!(reason = %reason, network = %network, "Payment settlement rejected");
                Err(Rejection::SettlementFailed {
                    reason,
                    message,
                    network,
                })
            }
            Ok(Err(err)) => {
                #[cfg(feature = "telemetry")]
                tracing::error!(error = %err, "Payment settlement call failed");
                Err(Rejection::SettlementUnavailable(err.to_string()))
            }
            Err(err) => {
                #[cfg(feature = "telemetry")]
                tracing::error!(error = %err, "Payment settlement task failed");
                Err(Rejection::SettlementUnavailable(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{PAYMENT_RESPONSE_HEADER, PAYMENT_SIGNATURE_HEADER, X_PAYMENT_HEADER};
    use crate::headers::decode_settle_response;
    use axum::Json;
    use axum::body::{Body, to_bytes};
    use axum::response::IntoResponse;
    use gate402::amount::Price;
    use gate402::config::PaymentOption;
    use gate402::proto::{Base64Bytes, PaymentVerificationError, RequirementsBody};
    use gate402::scheme::{AssetAmount, Mechanism, MechanismError};
    use http::{HeaderValue, StatusCode};
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    #[error("facilitator unreachable")]
    struct Unreachable;

    type VerifyFn = fn(&VerifyRequest) -> Result<VerifyResponse, Unreachable>;
    type SettleFn = fn(&SettleRequest) -> Result<SettleResponse, Unreachable>;

    /// Facilitator answering from fixed functions and counting its calls.
    #[derive(Clone)]
    struct Stub {
        verify: VerifyFn,
        settle: SettleFn,
        settle_delay: Duration,
        verify_calls: Arc<AtomicUsize>,
        settle_calls: Arc<AtomicUsize>,
        settled: Arc<AtomicUsize>,
    }

    impl Stub {
        fn new(verify: VerifyFn, settle: SettleFn) -> Self {
            Self {
                verify,
                settle,
                settle_delay: Duration::ZERO,
                verify_calls: Arc::default(),
                settle_calls: Arc::default(),
                settled: Arc::default(),
            }
        }

        fn verify_calls(&self) -> usize {
            self.verify_calls.load(Ordering::SeqCst)
        }

        fn settle_calls(&self) -> usize {
            self.settle_calls.load(Ordering::SeqCst)
        }
    }

    impl Facilitator for Stub {
        type Error = Unreachable;

        async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, Unreachable> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            (self.verify)(request)
        }

        async fn settle(&self, request: &SettleRequest) -> Result<SettleResponse, Unreachable> {
            self.settle_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.settle_delay).await;
            let result = (self.settle)(request);
            self.settled.fetch_add(1, Ordering::SeqCst);
            result
        }
    }

    fn valid(_: &VerifyRequest) -> Result<VerifyResponse, Unreachable> {
        Ok(VerifyResponse::valid(Some("0xPAYER".into())))
    }

    fn settles(_: &SettleRequest) -> Result<SettleResponse, Unreachable> {
        Ok(SettleResponse::Success {
            payer: None,
            transaction: "0xabc".into(),
            network: "base-sepolia".into(),
        })
    }

    /// Six-decimal token; rejects proofs marked as expired.
    struct Flat;

    impl Mechanism for Flat {
        fn scheme(&self) -> &str {
            "exact"
        }

        fn parse_price(
            &self,
            price: &Price,
            _asset: &str,
            _network: &str,
        ) -> Result<AssetAmount, MechanismError> {
            Ok(AssetAmount {
                asset: "0xUSDC".into(),
                amount: price.to_atomic(6)?,
                extra: None,
            })
        }

        fn check_payload(&self, payload: &PaymentPayload) -> Result<(), PaymentVerificationError> {
            if payload.payload.get("expired") == Some(&Value::Bool(true)) {
                return Err(PaymentVerificationError::Expired);
            }
            Ok(())
        }
    }

    fn registry() -> Arc<MechanismRegistry> {
        let flat: Arc<dyn Mechanism> = Arc::new(Flat);
        Arc::new(
            MechanismRegistry::new()
                .with("base-sepolia", Arc::clone(&flat))
                .with("base", flat),
        )
    }

    fn option(pay_to: &str) -> PaymentOption {
        PaymentOption::new("base-sepolia", "$0.01".parse().unwrap(), pay_to)
    }

    fn gate(stub: &Stub) -> Gate<Stub> {
        let config = ResourceConfig::new("/echo")
            .with_description("Echo")
            .with_option(option("0xWALLET"));
        Gate::new(stub.clone(), registry(), &config).unwrap()
    }

    fn proof(network: &str, payload: Value) -> HeaderValue {
        let encoded = Base64Bytes::encode_json(&json!({
            "x402Version": 2,
            "scheme": "exact",
            "network": network,
            "payload": payload
        }))
        .unwrap();
        HeaderValue::from_bytes(encoded.as_ref()).unwrap()
    }

    fn paid_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            PAYMENT_SIGNATURE_HEADER,
            proof("base-sepolia", json!({"signature": "0xabc"})),
        );
        headers
    }

    fn request(headers: HeaderMap) -> Request {
        let mut req = Request::new(Body::from(r#"{"hello":"world"}"#));
        *req.headers_mut() = headers;
        req
    }

    /// Echo handler that counts its runs and reports the payment context it saw.
    fn echo(
        runs: &Arc<AtomicUsize>,
    ) -> impl Service<Request, Response = Response, Error = Infallible> + Clone {
        let runs = Arc::clone(runs);
        tower::service_fn(move |req: Request| {
            let runs = Arc::clone(&runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                let seen = req
                    .extensions()
                    .get::<PaymentContext>()
                    .map(|c| c.transaction.clone());
                Ok::<_, Infallible>(
                    Json(json!({"echo": {"hello": "world"}, "seen": seen})).into_response(),
                )
            }
        })
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn no_header_challenges_with_built_requirements() {
        let stub = Stub::new(valid, settles);
        let gate = gate(&stub);
        let runs = Arc::default();

        let response = gate.handle(echo(&runs), request(HeaderMap::new())).await;
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Payment required");
        assert_eq!(body["x402Version"], 2);
        assert_eq!(body["accepts"], serde_json::to_value(gate.accepts()).unwrap());
        assert_eq!(body["accepts"][0]["amount"], "10000");
        assert_eq!(body["accepts"][0]["payTo"], "0xWALLET");
        assert_eq!(stub.verify_calls(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_header_is_a_client_error() {
        let stub = Stub::new(valid, settles);
        let gate = gate(&stub);
        let mut headers = HeaderMap::new();
        headers.insert(PAYMENT_SIGNATURE_HEADER, HeaderValue::from_static("%%%"));

        let response = gate.handle(echo(&Arc::default()), request(headers)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .starts_with("Invalid payment header")
        );
        assert_eq!(stub.verify_calls(), 0);
    }

    #[tokio::test]
    async fn invalid_proof_is_never_settled() {
        let stub = Stub::new(
            |_| {
                Ok(VerifyResponse::Invalid {
                    reason: "X".into(),
                    message: None,
                    payer: None,
                })
            },
            settles,
        );
        let gate = gate(&stub);
        let runs = Arc::default();

        let response = gate.handle(echo(&runs), request(paid_headers())).await;
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let body = json_body(response).await;
        assert_eq!(body["reason"], "X");
        assert_eq!(body["accepts"][0]["network"], "base-sepolia");
        assert_eq!(stub.verify_calls(), 1);
        assert_eq!(stub.settle_calls(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn settled_payment_runs_handler_and_merges_receipt() {
        let stub = Stub::new(valid, settles);
        let gate = gate(&stub);
        let runs = Arc::default();

        let response = gate.handle(echo(&runs), request(paid_headers())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let receipt = response.headers()[PAYMENT_RESPONSE_HEADER]
            .to_str()
            .unwrap()
            .to_owned();
        assert_eq!(
            decode_settle_response(&receipt).unwrap(),
            SettleResponse::Success {
                payer: Some("0xPAYER".into()),
                transaction: "0xabc".into(),
                network: "base-sepolia".into(),
            }
        );
        assert_eq!(
            json_body(response).await,
            json!({
                "echo": {"hello": "world"},
                "seen": "0xabc",
                "paid": true,
                "transaction": "0xabc",
                "network": "base-sepolia",
                "payer": "0xPAYER"
            })
        );
        assert_eq!(stub.settle_calls(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_settlement_never_runs_handler() {
        let stub = Stub::new(valid, |_| {
            Ok(SettleResponse::Error {
                reason: "Y".into(),
                message: None,
                network: "base-sepolia".into(),
            })
        });
        let gate = gate(&stub);
        let runs = Arc::default();

        let response = gate.handle(echo(&runs), request(paid_headers())).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["reason"], "Y");
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn verify_transport_error_is_a_server_error() {
        let stub = Stub::new(|_| Err(Unreachable), settles);
        let gate = gate(&stub);

        let response = gate.handle(echo(&Arc::default()), request(paid_headers())).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(
            body["error"],
            "Payment verification failed: facilitator unreachable"
        );
        assert_eq!(stub.settle_calls(), 0);
    }

    #[tokio::test]
    async fn settle_transport_error_is_not_retried() {
        let stub = Stub::new(valid, |_| Err(Unreachable));
        let gate = gate(&stub);
        let runs = Arc::default();

        let response = gate.handle(echo(&runs), request(paid_headers())).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(
            body["error"],
            "Payment settlement failed: facilitator unreachable"
        );
        assert_eq!(stub.settle_calls(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn proof_for_unoffered_network_is_challenged() {
        let stub = Stub::new(valid, settles);
        let gate = gate(&stub);
        let mut headers = HeaderMap::new();
        headers.insert(X_PAYMENT_HEADER, proof("base", json!({"signature": "0xabc"})));

        let err = gate.evaluate(&headers).await.unwrap_err();
        assert_eq!(err, Rejection::NoMatchingRequirements);
        assert_eq!(stub.verify_calls(), 0);
    }

    #[tokio::test]
    async fn local_check_rejects_before_verify() {
        let stub = Stub::new(valid, settles);
        let gate = gate(&stub);
        let mut headers = HeaderMap::new();
        headers.insert(
            PAYMENT_SIGNATURE_HEADER,
            proof("base-sepolia", json!({"expired": true})),
        );

        let err = gate.evaluate(&headers).await.unwrap_err();
        assert_eq!(err.reason(), Some("invalid_payment_expired"));
        assert_eq!(err.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(stub.verify_calls(), 0);
    }

    fn pay_to(request: &VerifyRequest) -> &str {
        match &request.payment_requirements {
            RequirementsBody::Current(r) => &r.pay_to,
            RequirementsBody::Legacy(r) => &r.pay_to,
        }
    }

    fn two_options(stub: &Stub) -> Gate<Stub> {
        let config = ResourceConfig::new("/echo")
            .with_option(option("0xFIRST"))
            .with_option(option("0xSECOND"));
        Gate::new(stub.clone(), registry(), &config).unwrap()
    }

    #[tokio::test]
    async fn settles_first_requirement_that_verifies() {
        let stub = Stub::new(
            |req| {
                if pay_to(req) == "0xFIRST" {
                    Ok(VerifyResponse::invalid("invalid_exact_evm_payload_recipient_mismatch"))
                } else {
                    Ok(VerifyResponse::valid(None))
                }
            },
            settles,
        );
        let gate = two_options(&stub);

        let paid = gate.evaluate(&paid_headers()).await.unwrap();
        assert_eq!(paid.context().requirements.pay_to, "0xSECOND");
        assert_eq!(paid.context().payer, None);
        assert_eq!(stub.verify_calls(), 2);
        assert_eq!(stub.settle_calls(), 1);
    }

    #[tokio::test]
    async fn reports_last_invalid_reason() {
        let stub = Stub::new(
            |req| {
                let reason = if pay_to(req) == "0xFIRST" {
                    "first"
                } else {
                    "second"
                };
                Ok(VerifyResponse::invalid(reason))
            },
            settles,
        );
        let gate = two_options(&stub);

        let err = gate.evaluate(&paid_headers()).await.unwrap_err();
        assert_eq!(err.reason(), Some("second"));
        assert_eq!(stub.settle_calls(), 0);
    }

    #[tokio::test]
    async fn legacy_format_reads_only_x_payment() {
        let stub = Stub::new(valid, settles);
        let gate = gate(&stub).with_wire_format(WireFormat::Legacy);

        let err = gate.evaluate(&paid_headers()).await.unwrap_err();
        assert_eq!(err, Rejection::PaymentRequired);

        let mut headers = HeaderMap::new();
        headers.insert(
            X_PAYMENT_HEADER,
            proof("base-sepolia", json!({"signature": "0xabc"})),
        );
        gate.evaluate(&headers).await.unwrap();
        assert_eq!(stub.settle_calls(), 1);
    }

    #[tokio::test]
    async fn abandoned_request_still_settles_once() {
        let mut stub = Stub::new(valid, settles);
        stub.settle_delay = Duration::from_millis(200);
        let gate = gate(&stub);

        let headers = paid_headers();
        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), gate.evaluate(&headers)).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(stub.settle_calls(), 1);
        assert_eq!(stub.settled.load(Ordering::SeqCst), 1);
    }

    fn valid_unless_short(request: &VerifyRequest) -> Result<VerifyResponse, Unreachable> {
        if request.payment_payload.payload.get("short") == Some(&Value::Bool(true)) {
            Ok(VerifyResponse::invalid("insufficient_funds"))
        } else {
            valid(request)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_settle_only_verified_payments() {
        let mut stub = Stub::new(valid_unless_short, settles);
        stub.settle_delay = Duration::from_millis(10);
        let gate = Arc::new(gate(&stub));

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..12 {
            let gate = Arc::clone(&gate);
            let short = i % 3 == 0;
            tasks.spawn(async move {
                let mut headers = HeaderMap::new();
                headers.insert(
                    PAYMENT_SIGNATURE_HEADER,
                    proof("base-sepolia", json!({"signature": "0xabc", "short": short})),
                );
                (short, gate.evaluate(&headers).await)
            });
        }

        let mut paid = 0;
        while let Some(joined) = tasks.join_next().await {
            let (short, outcome) = joined.unwrap();
            if short {
                assert_eq!(outcome.unwrap_err().reason(), Some("insufficient_funds"));
            } else {
                assert_eq!(outcome.unwrap().context().transaction, "0xabc");
                paid += 1;
            }
        }
        assert_eq!(paid, 8);
        assert_eq!(stub.verify_calls(), 12);
        assert_eq!(stub.settle_calls(), 8);
    }

    #[test]
    #[allow(clippy::assertions_on_constants)]
    fn paid_cannot_be_duplicated() {
        use std::marker::PhantomData;

        struct Check<T>(PhantomData<T>);
        trait NotClone {
            const CLONE: bool = false;
        }
        impl<T> NotClone for Check<T> {}
        #[allow(dead_code)]
        impl<T: Clone> Check<T> {
            const CLONE: bool = true;
        }

        assert!(<Check<PaymentContext>>::CLONE);
        assert!(!<Check<Paid>>::CLONE);
    }
}
