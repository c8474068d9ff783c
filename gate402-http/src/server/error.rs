//! Terminal states of the payment gate other than success.

use gate402::scheme::UnsupportedMechanism;
use http::StatusCode;

/// Why a request did not reach the protected handler.
///
/// The [`Display`](std::fmt::Display) text is the `error` field of the
/// rendered body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// No payment header was sent.
    #[error("Payment required")]
    PaymentRequired,
    /// The payment header did not decode.
    #[error("Invalid payment header: {0}")]
    MalformedProof(String),
    /// The proof's scheme and network match no offered requirement.
    #[error("No matching payment requirements")]
    NoMatchingRequirements,
    /// No mechanism is registered for a matching requirement.
    #[error("Payment configuration error: {0}")]
    Unsupported(#[from] UnsupportedMechanism),
    /// The verify call failed in transport.
    #[error("Payment verification failed: {0}")]
    VerificationUnavailable(String),
    /// The proof was judged invalid, by a local check or the facilitator.
    #[error("Invalid payment")]
    Invalid {
        /// Machine-readable reason.
        reason: String,
        /// Optional human-readable detail.
        message: Option<String>,
        /// Paying address, when known.
        payer: Option<String>,
    },
    /// The settle call failed in transport.
    #[error("Payment settlement failed: {0}")]
    SettlementUnavailable(String),
    /// The facilitator reported that settlement did not happen.
    #[error("Payment settlement failed")]
    SettlementFailed {
        /// Machine-readable reason.
        reason: String,
        /// Optional human-readable detail.
        message: Option<String>,
        /// Network settlement was attempted on.
        network: String,
    },
}

impl Rejection {
    /// HTTP status this rejection renders with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::PaymentRequired | Self::NoMatchingRequirements | Self::Invalid { .. } => {
                StatusCode::PAYMENT_REQUIRED
            }
            Self::MalformedProof(_) => StatusCode::BAD_REQUEST,
            Self::Unsupported(_)
            | Self::VerificationUnavailable(_)
            | Self::SettlementUnavailable(_)
            | Self::SettlementFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the response carries the payment challenge.
    #[must_use]
    pub const fn is_challenge(&self) -> bool {
        matches!(
            self,
            Self::PaymentRequired | Self::NoMatchingRequirements | Self::Invalid { .. }
        )
    }

    /// Machine-readable reason, for the rejections that have one.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Invalid { reason, .. } | Self::SettlementFailed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_states_to_statuses() {
        let cases = [
            (Rejection::PaymentRequired, 402),
            (Rejection::MalformedProof("x".into()), 400),
            (Rejection::NoMatchingRequirements, 402),
            (
                Rejection::Unsupported(UnsupportedMechanism {
                    scheme: "exact".into(),
                    network: "solana".into(),
                }),
                500,
            ),
            (Rejection::VerificationUnavailable("x".into()), 500),
            (
                Rejection::Invalid {
                    reason: "x".into(),
                    message: None,
                    payer: None,
                },
                402,
            ),
            (Rejection::SettlementUnavailable("x".into()), 500),
            (
                Rejection::SettlementFailed {
                    reason: "x".into(),
                    message: None,
                    network: "base".into(),
                },
                500,
            ),
        ];
        for (rejection, status) in cases {
            assert_eq!(rejection.status().as_u16(), status, "{rejection:?}");
        }
    }

    #[test]
    fn error_text_prefixes() {
        assert_eq!(
            Rejection::MalformedProof("not valid base64".into()).to_string(),
            "Invalid payment header: not valid base64"
        );
        assert_eq!(
            Rejection::VerificationUnavailable("timeout".into()).to_string(),
            "Payment verification failed: timeout"
        );
        assert_eq!(
            Rejection::SettlementUnavailable("timeout".into()).to_string(),
            "Payment settlement failed: timeout"
        );
    }
}
