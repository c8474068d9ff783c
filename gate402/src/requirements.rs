//! Builds the payment requirements a resource offers.
//!
//! [`build_requirements`] is a pure function of the resource configuration
//! and the mechanism registry: no I/O, no clock, no randomness. Calling it
//! twice with the same inputs yields identical output, which is what lets a
//! gate compute the list once and advertise it on every challenge.

use crate::config::ResourceConfig;
use crate::proto::PaymentRequirements;
use crate::scheme::{MechanismError, MechanismRegistry, UnsupportedMechanism};

/// A payment option that cannot be turned into a requirement.
#[derive(Debug, thiserror::Error)]
pub enum RequirementsError {
    /// The resource offers nothing to pay with.
    #[error("resource {0:?} has no payment options")]
    NoOptions(String),
    /// No mechanism serves the option's scheme and network.
    #[error("payment option #{index}: {source}")]
    Unsupported {
        /// Position of the option in configuration.
        index: usize,
        /// Lookup failure.
        source: UnsupportedMechanism,
    },
    /// The mechanism could not price the option.
    #[error("payment option #{index}: {source}")]
    Mechanism {
        /// Position of the option in configuration.
        index: usize,
        /// Pricing failure.
        source: MechanismError,
    },
    /// The option has no recipient.
    #[error("payment option #{index}: pay_to must not be empty")]
    EmptyPayTo {
        /// Position of the option in configuration.
        index: usize,
    },
    /// The option would give clients no time to pay.
    #[error("payment option #{index}: max_timeout_seconds must be at least 1")]
    ZeroTimeout {
        /// Position of the option in configuration.
        index: usize,
    },
}

/// Turns every payment option of `config` into a [`PaymentRequirements`],
/// preserving configuration order.
///
/// # Errors
///
/// Returns [`RequirementsError`] for the first option that is unusable, or
/// when there are no options at all.
pub fn build_requirements(
    config: &ResourceConfig,
    mechanisms: &MechanismRegistry,
) -> Result<Vec<PaymentRequirements>, RequirementsError> {
    if config.accepts.is_empty() {
        return Err(RequirementsError::NoOptions(config.url.clone()));
    }
    let built = config
        .accepts
        .iter()
        .enumerate()
        .map(|(index, option)| {
            let pay_to = option.pay_to.trim();
            if pay_to.is_empty() {
                return Err(RequirementsError::EmptyPayTo { index });
            }
            if option.max_timeout_seconds == 0 {
                return Err(RequirementsError::ZeroTimeout { index });
            }
            let mechanism = mechanisms
                .resolve(&option.scheme, &option.network)
                .map_err(|source| RequirementsError::Unsupported { index, source })?;
            let priced = mechanism
                .parse_price(&option.price, &option.asset, &option.network)
                .map_err(|source| RequirementsError::Mechanism { index, source })?;

            let extra = match (priced.extra, &option.extra) {
                (Some(serde_json::Value::Object(mut base)), Some(overrides)) => {
                    base.extend(overrides.clone());
                    Some(serde_json::Value::Object(base))
                }
                (_, Some(overrides)) => Some(serde_json::Value::Object(overrides.clone())),
                (base, None) => base,
            };

            let requirements = PaymentRequirements {
                scheme: option.scheme.clone(),
                network: option.network.clone(),
                asset: priced.asset,
                amount: priced.amount,
                pay_to: pay_to.to_owned(),
                max_timeout_seconds: option.max_timeout_seconds,
                extra,
            };
            Ok(mechanism.enhance_requirements(requirements))
        })
        .collect::<Result<Vec<_>, _>>()?;

    #[cfg(feature = "telemetry")]
    tracing::debug!(resource = %config.url, count = built.len(), "Built payment requirements");

    Ok(built)
}
