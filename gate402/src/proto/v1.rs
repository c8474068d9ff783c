//! Legacy (`x402Version: 1`) wire shapes.
//!
//! Version 1 clients expect resource metadata repeated inside every
//! requirement and the amount under `maxAmountRequired`.

use serde::{Deserialize, Serialize};

use super::{PaymentRequirements as CurrentRequirements, ResourceInfo};

/// Version marker that serializes as `1`.
pub type X402Version1 = super::Version<1>;

/// A payment requirement in the legacy flat shape.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// The payment scheme (e.g., "exact").
    pub scheme: String,
    /// The network name (e.g., "base-sepolia").
    pub network: String,
    /// The amount required, in the asset's smallest unit.
    pub max_amount_required: String,
    /// The resource URL being paid for.
    pub resource: String,
    /// Human-readable description of the resource.
    pub description: String,
    /// MIME type of the resource.
    pub mime_type: String,
    /// Optional JSON schema for the resource output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    /// The recipient address for payment.
    pub pay_to: String,
    /// Maximum time in seconds for payment validity.
    pub max_timeout_seconds: u64,
    /// The token asset address.
    pub asset: String,
    /// Scheme-specific extra data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl PaymentRequirements {
    /// Flattens a current-shape requirement and its resource into the legacy shape.
    #[must_use]
    pub fn from_current(requirements: &CurrentRequirements, resource: &ResourceInfo) -> Self {
        Self {
            scheme: requirements.scheme.clone(),
            network: requirements.network.clone(),
            max_amount_required: requirements.amount.clone(),
            resource: resource.url.clone(),
            description: resource.description.clone(),
            mime_type: resource.mime_type.clone(),
            output_schema: None,
            pay_to: requirements.pay_to.clone(),
            max_timeout_seconds: requirements.max_timeout_seconds,
            asset: requirements.asset.clone(),
            extra: requirements.extra.clone(),
        }
    }
}

/// The `402 Payment Required` body in the legacy shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Always `1`.
    pub x402_version: X402Version1,
    /// Why payment is being requested.
    pub error: String,
    /// Every acceptable way to pay, in preference order.
    pub accepts: Vec<PaymentRequirements>,
}

impl PaymentRequired {
    /// Builds the challenge body for the given requirements.
    #[must_use]
    pub fn new(
        error: impl Into<String>,
        accepts: &[CurrentRequirements],
        resource: &ResourceInfo,
    ) -> Self {
        Self {
            x402_version: super::Version,
            error: error.into(),
            accepts: accepts
                .iter()
                .map(|r| PaymentRequirements::from_current(r, resource))
                .collect(),
        }
    }
}
