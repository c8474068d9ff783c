//! HTTP header encoding and decoding for x402 protocol messages.
//!
//! Proofs, challenges and receipts travel as base64 of their JSON form in
//! `PAYMENT-SIGNATURE`, `PAYMENT-REQUIRED`, `PAYMENT-RESPONSE` and the
//! legacy `X-PAYMENT` / `X-PAYMENT-RESPONSE` headers.

use gate402::proto::{Base64Bytes, PaymentPayload, SettleResponse, WireFormat};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

use crate::constants::{
    PAYMENT_RESPONSE_HEADER, PAYMENT_SIGNATURE_HEADER, X_PAYMENT_HEADER, X_PAYMENT_RESPONSE_HEADER,
};
use crate::error::{HeaderEncodeError, MalformedProof};

/// Finds the payment proof header for `format`.
///
/// The current format reads `PAYMENT-SIGNATURE` and falls back to
/// `X-PAYMENT`; the legacy format reads only `X-PAYMENT`.
#[must_use]
pub fn find_proof(headers: &HeaderMap, format: WireFormat) -> Option<&HeaderValue> {
    match format {
        WireFormat::Current => headers
            .get(PAYMENT_SIGNATURE_HEADER)
            .or_else(|| headers.get(X_PAYMENT_HEADER)),
        WireFormat::Legacy => headers.get(X_PAYMENT_HEADER),
    }
}

/// Header carrying the settlement receipt in `format`.
#[must_use]
pub const fn receipt_header(format: WireFormat) -> HeaderName {
    match format {
        WireFormat::Current => PAYMENT_RESPONSE_HEADER,
        WireFormat::Legacy => X_PAYMENT_RESPONSE_HEADER,
    }
}

/// Decodes a raw proof header value.
///
/// # Errors
///
/// Returns [`MalformedProof`] if the value is not visible ASCII or does not
/// decode into a [`PaymentPayload`].
pub fn decode_proof_header(value: &HeaderValue) -> Result<PaymentPayload, MalformedProof> {
    let text = value.to_str().map_err(|_| MalformedProof::NotAscii)?;
    decode_payment_payload(text)
}

/// Decodes a `PAYMENT-SIGNATURE` or `X-PAYMENT` value into a [`PaymentPayload`].
///
/// # Errors
///
/// Returns [`MalformedProof`] naming the first layer that failed: base64,
/// UTF-8, JSON, protocol version or payload shape.
pub fn decode_payment_payload(header_value: &str) -> Result<PaymentPayload, MalformedProof> {
    let bytes = Base64Bytes::from(header_value).decode()?;
    let text = std::str::from_utf8(&bytes)?;
    let value: serde_json::Value = serde_json::from_str(text).map_err(MalformedProof::Json)?;
    if let Some(version) = value.get("x402Version").and_then(serde_json::Value::as_u64)
        && !matches!(version, 1 | 2)
    {
        return Err(MalformedProof::UnsupportedVersion(version));
    }
    serde_json::from_value(value).map_err(MalformedProof::Schema)
}

/// Encodes any protocol message as a base64 header value.
///
/// # Errors
///
/// Returns [`HeaderEncodeError`] if serialization fails.
pub fn encode_header_value<T: Serialize + ?Sized>(
    value: &T,
) -> Result<HeaderValue, HeaderEncodeError> {
    let encoded = Base64Bytes::encode_json(value)?;
    Ok(HeaderValue::from_bytes(encoded.as_ref())?)
}

/// Decodes a `PAYMENT-RESPONSE` or `X-PAYMENT-RESPONSE` value.
///
/// # Errors
///
/// Returns [`MalformedProof`] on base64 or JSON failure.
pub fn decode_settle_response(header_value: &str) -> Result<SettleResponse, MalformedProof> {
    let bytes = Base64Bytes::from(header_value).decode()?;
    serde_json::from_slice(&bytes).map_err(MalformedProof::Schema)
}
