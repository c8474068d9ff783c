//! The `exact` payment mechanism on EVM chains.
//!
//! Clients pay the precise requirement amount with an ERC-3009
//! `transferWithAuthorization` or a Permit2 transfer, signed over EIP-712.
//! This side of the mechanism prices requirements and turns away proofs
//! whose authorization has already expired; everything else about a proof
//! is checked by the facilitator.
//!
//! # Asset identifiers
//!
//! | Configured | Meaning |
//! |---|---|
//! | `USDC` | USDC on the option's network |
//! | `USDC@base-sepolia` | USDC, and the option must be on `base-sepolia` |
//! | `0x036C…` | a token contract known on the option's network |

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::Address;
use gate402::amount::Price;
use gate402::proto::{PaymentPayload, PaymentVerificationError};
use gate402::scheme::{AssetAmount, ExactScheme, Mechanism, MechanismError, MechanismRegistry};
use gate402::timestamp::UnixTimestamp;
use serde::Deserialize;

use crate::networks::{EvmNetwork, TokenDeployment, known_networks};

/// `exact` on EVM-compatible chains.
#[derive(Debug, Clone)]
pub struct ExactEvm {
    networks: Vec<EvmNetwork>,
}

impl Default for ExactEvm {
    fn default() -> Self {
        Self::new()
    }
}

impl ExactEvm {
    /// Creates the mechanism over every known network.
    #[must_use]
    pub fn new() -> Self {
        Self {
            networks: known_networks().to_vec(),
        }
    }

    /// Adds or replaces a network.
    #[must_use]
    pub fn with_network(mut self, network: EvmNetwork) -> Self {
        self.networks.retain(|n| n.name != network.name);
        self.networks.push(network);
        self
    }

    /// Names of the networks this mechanism prices on.
    pub fn network_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.networks.iter().map(|n| n.name)
    }

    /// Registers one shared instance of this mechanism for each of its networks.
    pub fn register_into(self, registry: &mut MechanismRegistry) {
        let names: Vec<&'static str> = self.network_names().collect();
        let mechanism: Arc<dyn Mechanism> = Arc::new(self);
        for name in names {
            registry.register(name, Arc::clone(&mechanism));
        }
    }

    fn network(&self, name: &str) -> Result<&EvmNetwork, MechanismError> {
        self.networks
            .iter()
            .find(|n| n.name == name)
            .ok_or_else(|| MechanismError::UnknownNetwork(name.to_owned()))
    }

    fn token(&self, asset: &str, network: &str) -> Result<TokenDeployment, MechanismError> {
        let known = self.network(network)?;
        let unknown = || MechanismError::UnknownAsset {
            asset: asset.to_owned(),
            network: network.to_owned(),
        };
        let trimmed = asset.trim();

        if trimmed.starts_with("0x") {
            let address = Address::from_str(trimmed).map_err(|_| unknown())?;
            return (address == known.usdc.address)
                .then_some(known.usdc)
                .ok_or_else(unknown);
        }

        let symbol = match trimmed.split_once('@') {
            Some((symbol, pinned)) => {
                if pinned != network {
                    return Err(MechanismError::NetworkMismatch {
                        asset: asset.to_owned(),
                        pinned: pinned.to_owned(),
                        network: network.to_owned(),
                    });
                }
                symbol
            }
            None => trimmed,
        };
        if symbol.eq_ignore_ascii_case(known.usdc.symbol) {
            Ok(known.usdc)
        } else {
            Err(unknown())
        }
    }
}

impl Mechanism for ExactEvm {
    fn scheme(&self) -> &str {
        ExactScheme::VALUE
    }

    fn parse_price(
        &self,
        price: &Price,
        asset: &str,
        network: &str,
    ) -> Result<AssetAmount, MechanismError> {
        let token = self.token(asset, network)?;
        Ok(AssetAmount {
            asset: token.address.to_checksum(None),
            amount: price.to_atomic(token.decimals)?,
            extra: serde_json::to_value(token.eip712).ok(),
        })
    }

    /// Rejects only recognised proofs whose authorization has already
    /// expired. Anything else, including shapes this crate does not know,
    /// is left to the facilitator.
    fn check_payload(&self, payload: &PaymentPayload) -> Result<(), PaymentVerificationError> {
        let Ok(exact) = ExactPayload::deserialize(&payload.payload) else {
            return Ok(());
        };
        if exact.expires_at() > UnixTimestamp::now() {
            return Ok(());
        }
        #[cfg(feature = "telemetry")]
        tracing::debug!(
            network = %payload.network,
            method = exact.method(),
            "exact EVM authorization already expired"
        );
        Err(PaymentVerificationError::Expired)
    }
}

/// Scheme payload of an `exact` EVM proof, as far as the expiry screen
/// needs it.
///
/// Untagged: Permit2 is tried first because only it carries
/// `permit2Authorization`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExactPayload {
    Permit2(Permit2Payload),
    Eip3009(Eip3009Payload),
}

impl ExactPayload {
    /// Last second at which the authorization can still be executed.
    const fn expires_at(&self) -> UnixTimestamp {
        match self {
            Self::Permit2(p) => p.permit2_authorization.deadline,
            Self::Eip3009(p) => p.authorization.valid_before,
        }
    }

    #[cfg(feature = "telemetry")]
    const fn method(&self) -> &'static str {
        match self {
            Self::Permit2(_) => "permit2",
            Self::Eip3009(_) => "eip3009",
        }
    }
}

/// ERC-3009 `transferWithAuthorization` proof.
#[derive(Debug, Deserialize)]
struct Eip3009Payload {
    #[allow(dead_code)]
    signature: String,
    authorization: Eip3009Authorization,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Eip3009Authorization {
    valid_before: UnixTimestamp,
}

/// Permit2 `PermitWitnessTransferFrom` proof.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Permit2Payload {
    #[allow(dead_code)]
    signature: String,
    permit2_authorization: Permit2Authorization,
}

#[derive(Debug, Deserialize)]
struct Permit2Authorization {
    deadline: UnixTimestamp,
}
