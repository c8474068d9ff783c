//! HTTP-specific constants for the x402 protocol.
//!
//! Header names are case-insensitive on the wire; they are stored in the
//! lowercase form [`HeaderName`] requires.

use std::time::Duration;

use http::HeaderName;

/// `PAYMENT-SIGNATURE`: payment proof, current format (client → server).
pub const PAYMENT_SIGNATURE_HEADER: HeaderName = HeaderName::from_static("payment-signature");

/// `PAYMENT-REQUIRED`: base64 challenge, current format (server → client).
pub const PAYMENT_REQUIRED_HEADER: HeaderName = HeaderName::from_static("payment-required");

/// `PAYMENT-RESPONSE`: base64 settlement receipt, current format (server → client).
pub const PAYMENT_RESPONSE_HEADER: HeaderName = HeaderName::from_static("payment-response");

/// `X-PAYMENT`: payment proof, legacy format (client → server).
pub const X_PAYMENT_HEADER: HeaderName = HeaderName::from_static("x-payment");

/// `X-PAYMENT-RESPONSE`: base64 settlement receipt, legacy format (server → client).
pub const X_PAYMENT_RESPONSE_HEADER: HeaderName = HeaderName::from_static("x-payment-response");

/// Public facilitator used when none is configured.
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";

/// Timeout applied to every facilitator call.
///
/// Settlement waits for block confirmation, which routinely takes several
/// seconds; short client defaults fail legitimate settlements.
pub const DEFAULT_FACILITATOR_TIMEOUT: Duration = Duration::from_secs(60);
