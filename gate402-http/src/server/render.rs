//! Deterministic mapping from gate outcomes to HTTP responses.
//!
//! | Outcome | Status | Body |
//! |---|---|---|
//! | no proof, no match, invalid proof | 402 | challenge (+ `reason` when invalid) |
//! | undecodable proof | 400 | `{"error"}` |
//! | facilitator unreachable, settlement failed, mechanism missing | 500 | `{"error"}` (+ `reason`) |
//! | settled | handler's | handler's body merged with the receipt |
//!
//! The challenge is written in the configured [`WireFormat`]; in the
//! current format it is also base64-encoded into `PAYMENT-REQUIRED`.

use axum::Json;
use axum::body::{Body, to_bytes};
use axum::response::{IntoResponse, Response};
use gate402::proto::{PaymentRequirements, ResourceInfo, WireFormat, v1, v2};
use http::HeaderMap;
use http::StatusCode;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;

use super::error::Rejection;
use super::paygate::PaymentContext;
use crate::constants::PAYMENT_REQUIRED_HEADER;
use crate::headers::{encode_header_value, receipt_header};

/// A `402 Payment Required` body in either wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Challenge {
    /// `x402Version: 2`.
    Current(v2::PaymentRequired),
    /// `x402Version: 1`.
    Legacy(v1::PaymentRequired),
}

impl Challenge {
    /// Builds the challenge listing every offered requirement.
    #[must_use]
    pub fn new(
        format: WireFormat,
        error: impl Into<String>,
        accepts: &[PaymentRequirements],
        resource: &ResourceInfo,
    ) -> Self {
        match format {
            WireFormat::Current => Self::Current(v2::PaymentRequired::new(error, accepts, resource)),
            WireFormat::Legacy => Self::Legacy(v1::PaymentRequired::new(error, accepts, resource)),
        }
    }
}

#[derive(Serialize)]
struct ChallengeBody<'a> {
    #[serde(flatten)]
    challenge: &'a Challenge,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

/// Renders rejections for one protected resource.
#[derive(Debug, Clone, Copy)]
pub struct Renderer<'a> {
    /// Wire format of challenges.
    pub format: WireFormat,
    /// Offered requirements, in configuration order.
    pub accepts: &'a [PaymentRequirements],
    /// The protected resource.
    pub resource: &'a ResourceInfo,
}

impl Renderer<'_> {
    /// The challenge carrying `error`.
    #[must_use]
    pub fn challenge(&self, error: impl Into<String>) -> Challenge {
        Challenge::new(self.format, error, self.accepts, self.resource)
    }

    /// Renders a terminal non-success state.
    #[must_use]
    pub fn rejection(&self, rejection: &Rejection) -> Response {
        let status = rejection.status();
        if !rejection.is_challenge() {
            let body = ErrorBody {
                error: rejection.to_string(),
                reason: rejection.reason(),
            };
            return (status, Json(body)).into_response();
        }

        let challenge = self.challenge(rejection.to_string());
        let body = ChallengeBody {
            challenge: &challenge,
            reason: rejection.reason(),
        };
        let mut response = (status, Json(body)).into_response();
        if self.format == WireFormat::Current {
            let encoded = encode_header_value(&challenge);
            #[cfg(feature = "telemetry")]
            if let Err(err) = &encoded {
                tracing::error!(error = %err, "Failed to encode PAYMENT-REQUIRED header");
            }
            if let Ok(value) = encoded {
                response.headers_mut().insert(PAYMENT_REQUIRED_HEADER, value);
            }
        }
        response
    }
}

/// Finishes the handler's response for a settled payment.
///
/// A successful JSON-object body gains `paid`, `transaction`, `network`
/// and, when known, `payer`. Any other body and any non-2xx status pass
/// through unchanged. The receipt header is always attached.
pub async fn settled_response(
    format: WireFormat,
    response: Response,
    context: &PaymentContext,
) -> Response {
    let mut response = if response.status().is_success() && is_json(response.headers()) {
        merge_receipt(response, context).await
    } else {
        response
    };
    let encoded = encode_header_value(&context.receipt());
    #[cfg(feature = "telemetry")]
    if let Err(err) = &encoded {
        tracing::error!(error = %err, "Failed to encode settlement receipt header");
    }
    if let Ok(value) = encoded {
        response.headers_mut().insert(receipt_header(format), value);
    }
    response
}

async fn merge_receipt(response: Response, context: &PaymentContext) -> Response {
    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            let body = ErrorBody {
                error: format!("Failed to read handler response: {err}"),
                reason: None,
            };
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
        }
    };

    let merged = match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(mut object)) => {
            object.insert("paid".into(), Value::Bool(true));
            object.insert("transaction".into(), context.transaction.clone().into());
            object.insert("network".into(), context.network.clone().into());
            if let Some(payer) = &context.payer {
                object.insert("payer".into(), payer.clone().into());
            }
            serde_json::to_vec(&object).ok()
        }
        _ => None,
    };

    match merged {
        Some(merged) => {
            parts.headers.remove(CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(merged))
        }
        None => Response::from_parts(parts, Body::from(bytes)),
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::decode_settle_response;
    use gate402::proto::{Base64Bytes, SettleResponse};
    use serde_json::json;

    fn accepts() -> Vec<PaymentRequirements> {
        vec![PaymentRequirements {
            scheme: "exact".into(),
            network: "base-sepolia".into(),
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            amount: "10000".into(),
            pay_to: "0xWALLET".into(),
            max_timeout_seconds: 60,
            extra: Some(json!({"name": "USDC", "version": "2"})),
        }]
    }

    fn resource() -> ResourceInfo {
        ResourceInfo {
            url: "/echo".into(),
            description: "Echo".into(),
            mime_type: "application/json".into(),
        }
    }

    fn context() -> PaymentContext {
        PaymentContext {
            payer: Some("0xPAYER".into()),
            transaction: "0xabc".into(),
            network: "base-sepolia".into(),
            requirements: accepts().remove(0),
        }
    }

    async fn body(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn current_challenge_mirrors_body_in_header() {
        let accepts = accepts();
        let resource = resource();
        let renderer = Renderer {
            format: WireFormat::Current,
            accepts: &accepts,
            resource: &resource,
        };
        let response = renderer.rejection(&Rejection::PaymentRequired);
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let header = response.headers()[PAYMENT_REQUIRED_HEADER]
            .to_str()
            .unwrap()
            .to_owned();
        let body: Value = serde_json::from_slice(&body(response).await).unwrap();
        let from_header: Value = serde_json::from_slice(
            &Base64Bytes::from(header.as_str()).decode().unwrap(),
        )
        .unwrap();
        assert_eq!(body, from_header);
        assert_eq!(
            body,
            json!({
                "x402Version": 2,
                "error": "Payment required",
                "resource": {"url": "/echo", "description": "Echo", "mimeType": "application/json"},
                "accepts": [{
                    "scheme": "exact",
                    "network": "base-sepolia",
                    "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
                    "amount": "10000",
                    "payTo": "0xWALLET",
                    "maxTimeoutSeconds": 60,
                    "extra": {"name": "USDC", "version": "2"}
                }]
            })
        );
    }

    #[tokio::test]
    async fn legacy_challenge_carries_reason() {
        let accepts = accepts();
        let resource = resource();
        let renderer = Renderer {
            format: WireFormat::Legacy,
            accepts: &accepts,
            resource: &resource,
        };
        let response = renderer.rejection(&Rejection::Invalid {
            reason: "insufficient_funds".into(),
            message: None,
            payer: None,
        });
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert!(!response.headers().contains_key(PAYMENT_REQUIRED_HEADER));
        let body: Value = serde_json::from_slice(&body(response).await).unwrap();
        assert_eq!(body["x402Version"], 1);
        assert_eq!(body["error"], "Invalid payment");
        assert_eq!(body["reason"], "insufficient_funds");
        assert_eq!(body["accepts"][0]["maxAmountRequired"], "10000");
        assert_eq!(body["accepts"][0]["resource"], "/echo");
    }

    #[tokio::test]
    async fn server_faults_render_error_body() {
        let accepts = accepts();
        let resource = resource();
        let renderer = Renderer {
            format: WireFormat::Current,
            accepts: &accepts,
            resource: &resource,
        };
        let response = renderer.rejection(&Rejection::SettlementFailed {
            reason: "unexpected_settle_error".into(),
            message: None,
            network: "base-sepolia".into(),
        });
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_slice(&body(response).await).unwrap();
        assert_eq!(
            body,
            json!({"error": "Payment settlement failed", "reason": "unexpected_settle_error"})
        );
    }

    #[tokio::test]
    async fn merges_receipt_into_json_object() {
        let handler = Json(json!({"echo": {"hello": "world"}})).into_response();
        let response = settled_response(WireFormat::Current, handler, &context()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let receipt = response.headers()[crate::constants::PAYMENT_RESPONSE_HEADER]
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
        let body: Value = serde_json::from_slice(&body(response).await).unwrap();
        assert_eq!(
            body,
            json!({
                "echo": {"hello": "world"},
                "paid": true,
                "transaction": "0xabc",
                "network": "base-sepolia",
                "payer": "0xPAYER"
            })
        );
    }

    #[tokio::test]
    async fn passes_other_bodies_through() {
        let list = Json(json!([1, 2, 3])).into_response();
        let response = settled_response(WireFormat::Legacy, list, &context()).await;
        assert!(
            response
                .headers()
                .contains_key(crate::constants::X_PAYMENT_RESPONSE_HEADER)
        );
        assert_eq!(body(response).await, b"[1,2,3]");

        let text = "plain".into_response();
        let response = settled_response(WireFormat::Current, text, &context()).await;
        assert_eq!(body(response).await, b"plain");

        let failed = (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "down"})),
        )
            .into_response();
        let response = settled_response(WireFormat::Current, failed, &context()).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = serde_json::from_slice(&body(response).await).unwrap();
        assert_eq!(body, json!({"error": "down"}));
    }
}
