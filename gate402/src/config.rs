//! Static payment configuration of a protected resource.
//!
//! Everything here is fixed before the gate is built and treated as
//! immutable afterwards.
//!
//! # Example
//!
//! ```toml
//! url = "/echo"
//! description = "Echo service"
//!
//! [[accepts]]
//! network = "base-sepolia"
//! asset = "USDC"
//! price = "$0.01"
//! pay_to = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C"
//! ```

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use crate::amount::Price;
use crate::proto::ResourceInfo;
use crate::scheme::ExactScheme;

/// Seconds a proof stays acceptable when an option does not say otherwise.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 60;

/// MIME type advertised when a resource does not say otherwise.
pub const DEFAULT_MIME_TYPE: &str = "application/json";

/// Asset used when an option does not name one.
pub const DEFAULT_ASSET: &str = "USDC";

fn default_scheme() -> String {
    ExactScheme::VALUE.to_owned()
}

fn default_asset() -> String {
    DEFAULT_ASSET.to_owned()
}

const fn default_max_timeout_seconds() -> u64 {
    DEFAULT_MAX_TIMEOUT_SECONDS
}

fn default_mime_type() -> String {
    DEFAULT_MIME_TYPE.to_owned()
}

/// One way a client may pay for a resource, before pricing.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOption {
    /// Payment scheme (default: `exact`).
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Network name, e.g. `base-sepolia`.
    pub network: String,
    /// Asset identifier understood by the network's mechanism (default: `USDC`).
    #[serde(default = "default_asset")]
    pub asset: String,
    /// Price in whole currency units, e.g. `"$0.01"`.
    #[serde_as(as = "DisplayFromStr")]
    pub price: Price,
    /// Recipient address.
    pub pay_to: String,
    /// Seconds a proof stays acceptable (default: 60).
    #[serde(default = "default_max_timeout_seconds")]
    pub max_timeout_seconds: u64,
    /// Extra keys merged over the mechanism's own `extra` data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Map<String, serde_json::Value>>,
}

impl PaymentOption {
    /// Creates an `exact` USDC option with default timeout.
    #[must_use]
    pub fn new(network: impl Into<String>, price: Price, pay_to: impl Into<String>) -> Self {
        Self {
            scheme: default_scheme(),
            network: network.into(),
            asset: default_asset(),
            price,
            pay_to: pay_to.into(),
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
            extra: None,
        }
    }

    /// Sets the asset identifier.
    #[must_use]
    pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
        self.asset = asset.into();
        self
    }

    /// Sets the scheme.
    #[must_use]
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Sets how long a proof stays acceptable.
    #[must_use]
    pub const fn with_max_timeout_seconds(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = seconds;
        self
    }
}

/// Payment configuration of one protected resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Public URL or path of the resource.
    pub url: String,
    /// What the payment grants access to.
    #[serde(default)]
    pub description: String,
    /// MIME type of the resource body (default: `application/json`).
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    /// Accepted payment options, in preference order.
    #[serde(default)]
    pub accepts: Vec<PaymentOption>,
}

impl ResourceConfig {
    /// Creates a resource with no payment options yet.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: String::new(),
            mime_type: default_mime_type(),
            accepts: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Appends a payment option.
    #[must_use]
    pub fn with_option(mut self, option: PaymentOption) -> Self {
        self.accepts.push(option);
        self
    }

    /// Resource metadata advertised to clients.
    #[must_use]
    pub fn resource_info(&self) -> ResourceInfo {
        ResourceInfo {
            url: self.url.clone(),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn option_defaults() {
        let option: PaymentOption = serde_json::from_value(json!({
            "network": "base-sepolia",
            "price": "$0.01",
            "pay_to": "0xWALLET"
        }))
        .unwrap();
        assert_eq!(option.scheme, "exact");
        assert_eq!(option.asset, "USDC");
        assert_eq!(option.max_timeout_seconds, 60);
        assert_eq!(option.price, "0.01".parse().unwrap());
    }

    #[test]
    fn bad_price_fails_to_load() {
        let err = serde_json::from_value::<PaymentOption>(json!({
            "network": "base",
            "price": "cheap",
            "pay_to": "0xWALLET"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("invalid price"));
    }

    #[test]
    fn resource_defaults() {
        let config: ResourceConfig = serde_json::from_value(json!({"url": "/echo"})).unwrap();
        assert_eq!(config.mime_type, "application/json");
        assert!(config.accepts.is_empty());
        assert_eq!(config.resource_info().url, "/echo");
    }
}
