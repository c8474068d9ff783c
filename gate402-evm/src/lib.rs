#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EVM support for gate402.
//!
//! Provides the `exact` payment mechanism for EVM-compatible chains, where a
//! client pays with an ERC-3009 `transferWithAuthorization` signed over the
//! token's EIP-712 domain, and the table of networks and USDC deployments the
//! mechanism prices against.
//!
//! - [`exact`] - The [`ExactEvm`] mechanism
//! - [`networks`] - Known networks and their USDC contracts

pub mod exact;
pub mod networks;

pub use exact::ExactEvm;
pub use networks::{Eip712Domain, EvmNetwork, TokenDeployment, known_networks};
