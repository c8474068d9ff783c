//! Current (`x402Version: 2`) wire shapes.
//!
//! # JSON Format
//!
//! ```json
//! {
//!   "x402Version": 2,
//!   "error": "Payment required",
//!   "resource": { "url": "/echo", "description": "Echo", "mimeType": "application/json" },
//!   "accepts": [{ "scheme": "exact", "network": "base-sepolia", "amount": "10000", ... }]
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::{PaymentRequirements, ResourceInfo};

/// Version marker that serializes as `2`.
pub type X402Version2 = super::Version<2>;

/// The `402 Payment Required` body in the current shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Always `2`.
    pub x402_version: X402Version2,
    /// Why payment is being requested.
    pub error: String,
    /// The resource being paid for.
    pub resource: ResourceInfo,
    /// Every acceptable way to pay, in preference order.
    pub accepts: Vec<PaymentRequirements>,
}

impl PaymentRequired {
    /// Builds the challenge body for the given requirements.
    #[must_use]
    pub fn new(
        error: impl Into<String>,
        accepts: &[PaymentRequirements],
        resource: &ResourceInfo,
    ) -> Self {
        Self {
            x402_version: super::Version,
            error: error.into(),
            resource: resource.clone(),
            accepts: accepts.to_vec(),
        }
    }
}
