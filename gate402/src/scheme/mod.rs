//! Pluggable payment mechanisms.
//!
//! A [`Mechanism`] knows one payment scheme on one chain family: how a
//! human price becomes a token amount, which scheme-specific data goes into
//! a requirement, and which proofs are obviously unusable before any remote
//! call is made. Mechanisms are looked up by scheme and network through the
//! [`MechanismRegistry`].

mod registry;

pub use registry::*;

use crate::amount::{Price, PriceError};
use crate::proto::{PaymentPayload, PaymentRequirements, PaymentVerificationError};

/// A unit struct representing the string literal `"exact"`.
///
/// `exact` transfers precisely the required amount to the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExactScheme;

impl ExactScheme {
    /// The string literal value: `"exact"`.
    pub const VALUE: &'static str = "exact";
}

impl std::fmt::Display for ExactScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(Self::VALUE)
    }
}

impl AsRef<str> for ExactScheme {
    fn as_ref(&self) -> &str {
        Self::VALUE
    }
}

/// A resolved token amount ready for use in payment requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetAmount {
    /// The token contract address.
    pub asset: String,
    /// The amount in the token's smallest unit (e.g., "10000" for 0.01 USDC).
    pub amount: String,
    /// Scheme-specific data the token needs, such as its EIP-712 domain.
    pub extra: Option<serde_json::Value>,
}

/// Errors raised while a mechanism prices a payment option.
#[derive(Debug, thiserror::Error)]
pub enum MechanismError {
    /// The mechanism does not know the network.
    #[error("network {0:?} is not supported by this mechanism")]
    UnknownNetwork(String),
    /// The asset identifier does not name a known token on the network.
    #[error("unknown asset {asset:?} on network {network:?}")]
    UnknownAsset {
        /// The asset identifier from configuration.
        asset: String,
        /// The network it was looked up on.
        network: String,
    },
    /// The asset identifier names a different network than the option.
    #[error("asset {asset:?} belongs to network {pinned:?}, not {network:?}")]
    NetworkMismatch {
        /// The asset identifier from configuration.
        asset: String,
        /// The network named inside the asset identifier.
        pinned: String,
        /// The network of the payment option.
        network: String,
    },
    /// The price cannot be expressed in the token.
    #[error(transparent)]
    Price(#[from] PriceError),
}

/// Server-side behaviour of one payment scheme.
///
/// Implementations must be cheap to share: the registry hands out
/// references to the same instance for every request.
pub trait Mechanism: Send + Sync {
    /// Scheme tag this mechanism handles, e.g. `"exact"`.
    fn scheme(&self) -> &str;

    /// Converts a price in a given asset into a token amount on `network`.
    ///
    /// # Errors
    ///
    /// Returns [`MechanismError`] when the network or asset is unknown or the
    /// price cannot be represented in the token's smallest unit.
    fn parse_price(
        &self,
        price: &Price,
        asset: &str,
        network: &str,
    ) -> Result<AssetAmount, MechanismError>;

    /// Adds scheme-specific data to a freshly built requirement.
    ///
    /// The default implementation returns the requirement unchanged.
    fn enhance_requirements(&self, requirements: PaymentRequirements) -> PaymentRequirements {
        requirements
    }

    /// Rejects proofs that cannot possibly verify, without any remote call.
    ///
    /// Only a proof the mechanism positively recognises may be rejected;
    /// an unfamiliar payload shape must be passed on to the facilitator.
    /// The default implementation accepts everything.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentVerificationError`] describing why the proof is unusable.
    fn check_payload(&self, payload: &PaymentPayload) -> Result<(), PaymentVerificationError> {
        let _ = payload;
        Ok(())
    }
}

impl std::fmt::Debug for dyn Mechanism + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mechanism")
            .field("scheme", &self.scheme())
            .finish_non_exhaustive()
    }
}
