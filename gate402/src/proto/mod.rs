//! Wire format types for x402 payment messages.
//!
//! Two protocol generations are spoken on the wire and selected per
//! deployment through [`WireFormat`]:
//!
//! - **current** ([`v2`]): `x402Version: 2`, resource metadata next to the
//!   requirement list, requirements carry `amount`
//! - **legacy** ([`v1`]): `x402Version: 1`, resource metadata flattened into
//!   every requirement, requirements carry `maxAmountRequired`
//!
//! The gate always reasons about the current [`PaymentRequirements`] shape
//! and converts at the edges.
//!
//! # Key Types
//!
//! - [`PaymentRequirements`] - One accepted way to pay for a resource
//! - [`PaymentPayload`] - The decoded payment proof sent by a client
//! - [`VerifyRequest`] / [`VerifyResponse`] - Facilitator verification messages
//! - [`SettleRequest`] / [`SettleResponse`] - Facilitator settlement messages
//! - [`PaymentVerificationError`] - Local proof checks that fail before any remote call

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub mod encoding;
pub mod v1;
pub mod v2;
pub mod version;

pub use encoding::Base64Bytes;
pub use version::Version;

/// One accepted way to pay for a resource.
///
/// `amount` is an integer in the asset's smallest unit, kept as a string so
/// no JSON consumer rounds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme tag, e.g. `"exact"`.
    pub scheme: String,
    /// Network name, e.g. `"base-sepolia"`.
    pub network: String,
    /// Token contract address.
    pub asset: String,
    /// Required amount in the asset's smallest unit.
    pub amount: String,
    /// Recipient address.
    pub pay_to: String,
    /// Seconds a signed proof stays acceptable.
    pub max_timeout_seconds: u64,
    /// Scheme-specific data, such as the token's EIP-712 domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// Describes the resource being paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    /// URL (or path) of the protected resource.
    pub url: String,
    /// What the payment grants access to.
    #[serde(default)]
    pub description: String,
    /// MIME type of the resource body.
    #[serde(default)]
    pub mime_type: String,
}

/// Selects which protocol generation the gate speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// `x402Version: 2` bodies and `PAYMENT-*` headers.
    #[default]
    #[serde(alias = "v2")]
    Current,
    /// `x402Version: 1` bodies and `X-PAYMENT*` headers.
    #[serde(alias = "v1")]
    Legacy,
}

impl WireFormat {
    /// The `x402Version` tag written by this format.
    #[must_use]
    pub const fn version(self) -> u8 {
        match self {
            Self::Current => v2::X402Version2::VALUE,
            Self::Legacy => v1::X402Version1::VALUE,
        }
    }

    /// Shapes a requirement the way this format sends it to a facilitator.
    #[must_use]
    pub fn requirements_body(
        self,
        requirements: &PaymentRequirements,
        resource: &ResourceInfo,
    ) -> RequirementsBody {
        match self {
            Self::Current => RequirementsBody::Current(requirements.clone()),
            Self::Legacy => RequirementsBody::Legacy(v1::PaymentRequirements::from_current(
                requirements,
                resource,
            )),
        }
    }

    /// Builds the facilitator verification request for one candidate requirement.
    #[must_use]
    pub fn verify_request(
        self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
        resource: &ResourceInfo,
    ) -> VerifyRequest {
        VerifyRequest {
            x402_version: self.version(),
            payment_payload: payload.clone(),
            payment_requirements: self.requirements_body(requirements, resource),
        }
    }
}

impl Display for WireFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Current => f.write_str("current"),
            Self::Legacy => f.write_str("legacy"),
        }
    }
}

impl FromStr for WireFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "current" | "v2" | "2" => Ok(Self::Current),
            "legacy" | "v1" | "1" => Ok(Self::Legacy),
            other => Err(format!(
                "unknown wire format {other:?}, expected \"current\" or \"legacy\""
            )),
        }
    }
}

/// A payment requirement in whichever shape the wire format dictates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequirementsBody {
    /// `amount` shape.
    Current(PaymentRequirements),
    /// `maxAmountRequired` shape.
    Legacy(v1::PaymentRequirements),
}

/// A client's payment proof, decoded from the payment header.
///
/// Two JSON shapes are accepted: the flat one
/// (`{x402Version, scheme, network, payload}`) and the one that echoes the
/// accepted requirement (`{x402Version, accepted: {scheme, network, ..},
/// payload}`). Serialization writes back the shape that was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentPayload {
    /// Protocol version declared by the client (1 or 2).
    pub x402_version: u8,
    /// Scheme the client paid with.
    pub scheme: String,
    /// Network the client paid on.
    pub network: String,
    /// Scheme-specific signed authorization.
    pub payload: serde_json::Value,
    /// The requirement the client says it accepted, if it echoed one.
    pub accepted: Option<PaymentRequirements>,
    /// The resource the client says it paid for, if it echoed one.
    pub resource: Option<ResourceInfo>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentPayloadWire {
    x402_version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    network: Option<String>,
    payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    accepted: Option<PaymentRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource: Option<ResourceInfo>,
}

impl Serialize for PaymentPayload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let echoed = self.accepted.is_some();
        let wire = PaymentPayloadWire {
            x402_version: self.x402_version,
            scheme: (!echoed).then(|| self.scheme.clone()),
            network: (!echoed).then(|| self.network.clone()),
            payload: self.payload.clone(),
            accepted: self.accepted.clone(),
            resource: self.resource.clone(),
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PaymentPayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = PaymentPayloadWire::deserialize(deserializer)?;
        if !matches!(wire.x402_version, 1 | 2) {
            return Err(serde::de::Error::custom(format!(
                "unsupported x402Version {}",
                wire.x402_version
            )));
        }
        if wire.payload.is_null() {
            return Err(serde::de::Error::custom("payload must not be null"));
        }
        let scheme = wire
            .scheme
            .or_else(|| wire.accepted.as_ref().map(|a| a.scheme.clone()))
            .ok_or_else(|| serde::de::Error::missing_field("scheme"))?;
        let network = wire
            .network
            .or_else(|| wire.accepted.as_ref().map(|a| a.network.clone()))
            .ok_or_else(|| serde::de::Error::missing_field("network"))?;
        Ok(Self {
            x402_version: wire.x402_version,
            scheme,
            network,
            payload: wire.payload,
            accepted: wire.accepted,
            resource: wire.resource,
        })
    }
}

/// Body of `POST /verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Protocol version of the request.
    pub x402_version: u8,
    /// The client's proof, forwarded as decoded.
    pub payment_payload: PaymentPayload,
    /// The requirement the proof is checked against.
    pub payment_requirements: RequirementsBody,
}

/// Body of `POST /settle`. Same shape as [`VerifyRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettleRequest(VerifyRequest);

impl SettleRequest {
    /// Returns the wrapped request.
    #[must_use]
    pub const fn inner(&self) -> &VerifyRequest {
        &self.0
    }
}

impl From<VerifyRequest> for SettleRequest {
    fn from(request: VerifyRequest) -> Self {
        Self(request)
    }
}

/// Outcome of a facilitator verification call.
///
/// On the wire `invalidReason` is absent exactly when `isValid` is `true`;
/// a body violating that fails to deserialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResponse {
    /// The proof is sound and sufficient.
    Valid {
        /// The paying address, when the facilitator reports one.
        payer: Option<String>,
    },
    /// The proof was rejected.
    Invalid {
        /// Machine-readable reason.
        reason: String,
        /// Optional human-readable detail.
        message: Option<String>,
        /// The paying address, when known.
        payer: Option<String>,
    },
}

impl VerifyResponse {
    /// Constructs a valid response.
    #[must_use]
    pub const fn valid(payer: Option<String>) -> Self {
        Self::Valid { payer }
    }

    /// Constructs an invalid response with the given reason.
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
            message: None,
            payer: None,
        }
    }

    /// Returns `true` if the response is [`VerifyResponse::Valid`].
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponseWire {
    is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
    #[serde(default)]
    invalid_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    invalid_message: Option<String>,
}

impl Serialize for VerifyResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wire = match self {
            Self::Valid { payer } => VerifyResponseWire {
                is_valid: true,
                payer: payer.clone(),
                invalid_reason: None,
                invalid_message: None,
            },
            Self::Invalid {
                reason,
                message,
                payer,
            } => VerifyResponseWire {
                is_valid: false,
                payer: payer.clone(),
                invalid_reason: Some(reason.clone()),
                invalid_message: message.clone(),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VerifyResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = VerifyResponseWire::deserialize(deserializer)?;
        match (wire.is_valid, wire.invalid_reason) {
            (true, None) => Ok(Self::Valid { payer: wire.payer }),
            (true, Some(_)) => Err(serde::de::Error::custom(
                "invalidReason must be null when isValid is true",
            )),
            (false, Some(reason)) => Ok(Self::Invalid {
                reason,
                message: wire.invalid_message,
                payer: wire.payer,
            }),
            (false, None) => Err(serde::de::Error::missing_field("invalidReason")),
        }
    }
}

/// Outcome of a facilitator settlement call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleResponse {
    /// The payment was executed.
    Success {
        /// The paying address, when the facilitator reports one.
        payer: Option<String>,
        /// Transaction identifier.
        transaction: String,
        /// Network the payment settled on.
        network: String,
    },
    /// Settlement did not happen.
    Error {
        /// Machine-readable reason.
        reason: String,
        /// Optional human-readable detail.
        message: Option<String>,
        /// Network the settlement was attempted on.
        network: String,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettleResponseWire {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transaction: Option<String>,
    #[serde(default)]
    network: String,
}

impl Serialize for SettleResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wire = match self {
            Self::Success {
                payer,
                transaction,
                network,
            } => SettleResponseWire {
                success: true,
                error_reason: None,
                error_message: None,
                payer: payer.clone(),
                transaction: Some(transaction.clone()),
                network: network.clone(),
            },
            Self::Error {
                reason,
                message,
                network,
            } => SettleResponseWire {
                success: false,
                error_reason: Some(reason.clone()),
                error_message: message.clone(),
                payer: None,
                transaction: None,
                network: network.clone(),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SettleResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = SettleResponseWire::deserialize(deserializer)?;
        if wire.success {
            let transaction = wire
                .transaction
                .filter(|tx| !tx.is_empty())
                .ok_or_else(|| serde::de::Error::missing_field("transaction"))?;
            Ok(Self::Success {
                payer: wire.payer,
                transaction,
                network: wire.network,
            })
        } else {
            let reason = wire
                .error_reason
                .ok_or_else(|| serde::de::Error::missing_field("errorReason"))?;
            Ok(Self::Error {
                reason,
                message: wire.error_message,
                network: wire.network,
            })
        }
    }
}

/// Machine-readable codes for proofs rejected by local checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    /// The scheme payload is structurally wrong.
    InvalidFormat,
    /// The authorization window has not opened yet.
    InvalidPaymentEarly,
    /// The authorization window has closed.
    InvalidPaymentExpired,
}

impl ErrorReason {
    /// Returns the wire code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidFormat => "invalid_format",
            Self::InvalidPaymentEarly => "invalid_payment_early",
            Self::InvalidPaymentExpired => "invalid_payment_expired",
        }
    }
}

impl Display for ErrorReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proof that a mechanism rejects before asking the facilitator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentVerificationError {
    /// The scheme payload is structurally wrong.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    /// The authorization's `validAfter` lies in the future.
    #[error("Payment authorization is not yet valid")]
    Early,
    /// The authorization's `validBefore` has passed.
    #[error("Payment authorization is expired")]
    Expired,
}

impl PaymentVerificationError {
    /// Returns the machine-readable reason for this error.
    #[must_use]
    pub const fn reason(&self) -> ErrorReason {
        match self {
            Self::InvalidFormat(_) => ErrorReason::InvalidFormat,
            Self::Early => ErrorReason::InvalidPaymentEarly,
            Self::Expired => ErrorReason::InvalidPaymentExpired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn verify_response_valid_without_payer() {
        let parsed: VerifyResponse = serde_json::from_value(json!({"isValid": true})).unwrap();
        assert_eq!(parsed, VerifyResponse::valid(None));
    }

    #[test]
    fn verify_response_invalid_requires_reason() {
        let parsed: VerifyResponse = serde_json::from_value(json!({
            "isValid": false,
            "invalidReason": "insufficient_funds",
            "payer": "0xabc"
        }))
        .unwrap();
        assert_eq!(
            parsed,
            VerifyResponse::Invalid {
                reason: "insufficient_funds".into(),
                message: None,
                payer: Some("0xabc".into()),
            }
        );
        assert!(serde_json::from_value::<VerifyResponse>(json!({"isValid": false})).is_err());
        assert!(
            serde_json::from_value::<VerifyResponse>(
                json!({"isValid": true, "invalidReason": "x"})
            )
            .is_err()
        );
    }

    #[test]
    fn settle_response_shapes() {
        let ok: SettleResponse = serde_json::from_value(json!({
            "success": true,
            "transaction": "0xabc",
            "network": "base-sepolia"
        }))
        .unwrap();
        assert_eq!(
            ok,
            SettleResponse::Success {
                payer: None,
                transaction: "0xabc".into(),
                network: "base-sepolia".into(),
            }
        );
        let failed: SettleResponse = serde_json::from_value(json!({
            "success": false,
            "errorReason": "Y",
            "network": "base-sepolia"
        }))
        .unwrap();
        assert!(matches!(failed, SettleResponse::Error { ref reason, .. } if reason == "Y"));
        assert!(
            serde_json::from_value::<SettleResponse>(json!({"success": true, "network": "x"}))
                .is_err()
        );
    }

    #[test]
    fn settle_response_serializes_camel_case() {
        let value = serde_json::to_value(SettleResponse::Error {
            reason: "Y".into(),
            message: None,
            network: "base".into(),
        })
        .unwrap();
        assert_eq!(
            value,
            json!({"success": false, "errorReason": "Y", "network": "base"})
        );
    }

    #[test]
    fn payload_flat_shape() {
        let payload: PaymentPayload = serde_json::from_value(json!({
            "x402Version": 1,
            "scheme": "exact",
            "network": "base-sepolia",
            "payload": {"signature": "0x00"}
        }))
        .unwrap();
        assert_eq!(payload.scheme, "exact");
        assert_eq!(payload.network, "base-sepolia");
        assert!(payload.accepted.is_none());
        let back = serde_json::to_value(&payload).unwrap();
        assert_eq!(back["scheme"], "exact");
    }

    #[test]
    fn payload_echoing_accepted_requirement() {
        let payload: PaymentPayload = serde_json::from_value(json!({
            "x402Version": 2,
            "accepted": {
                "scheme": "exact",
                "network": "base",
                "asset": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
                "amount": "10000",
                "payTo": "0xWALLET",
                "maxTimeoutSeconds": 60
            },
            "payload": {"signature": "0x00"}
        }))
        .unwrap();
        assert_eq!(payload.scheme, "exact");
        assert_eq!(payload.network, "base");
        let back = serde_json::to_value(&payload).unwrap();
        assert!(back.get("scheme").is_none());
        assert_eq!(back["accepted"]["amount"], "10000");
    }

    #[test]
    fn payload_rejects_missing_fields_and_versions() {
        let missing_network = json!({"x402Version": 1, "scheme": "exact", "payload": {}});
        assert!(serde_json::from_value::<PaymentPayload>(missing_network).is_err());
        let missing_payload = json!({"x402Version": 1, "scheme": "exact", "network": "base"});
        assert!(serde_json::from_value::<PaymentPayload>(missing_payload).is_err());
        let null_payload =
            json!({"x402Version": 1, "scheme": "exact", "network": "base", "payload": null});
        assert!(serde_json::from_value::<PaymentPayload>(null_payload).is_err());
        let future =
            json!({"x402Version": 9, "scheme": "exact", "network": "base", "payload": {}});
        assert!(serde_json::from_value::<PaymentPayload>(future).is_err());
    }

    #[test]
    fn wire_format_parsing() {
        assert_eq!("legacy".parse::<WireFormat>(), Ok(WireFormat::Legacy));
        assert_eq!("V2".parse::<WireFormat>(), Ok(WireFormat::Current));
        assert!("v3".parse::<WireFormat>().is_err());
        assert_eq!(WireFormat::default().version(), 2);
        assert_eq!(WireFormat::Legacy.version(), 1);
    }
}
