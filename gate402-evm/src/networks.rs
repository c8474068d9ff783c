//! Known EVM networks and their USDC deployments.
//!
//! Networks are addressed by the names clients put on the wire
//! (`base`, `base-sepolia`, ...). Every entry carries the USDC contract the
//! `exact` mechanism prices in, with the EIP-712 domain clients must sign.

use alloy_primitives::{Address, address};
use serde::Serialize;

/// Base Mainnet chain ID.
pub const BASE_MAINNET: u64 = 8453;

/// Base Sepolia (testnet) chain ID.
pub const BASE_SEPOLIA: u64 = 84532;

/// Ethereum Mainnet chain ID.
pub const ETHEREUM_MAINNET: u64 = 1;

/// Polygon Mainnet chain ID.
pub const POLYGON_MAINNET: u64 = 137;

/// Polygon Amoy (testnet) chain ID.
pub const POLYGON_AMOY: u64 = 80002;

/// Avalanche C-Chain chain ID.
pub const AVALANCHE_MAINNET: u64 = 43114;

/// Avalanche Fuji (testnet) chain ID.
pub const AVALANCHE_FUJI: u64 = 43113;

/// Celo Mainnet chain ID.
pub const CELO_MAINNET: u64 = 42220;

/// USDC contract address on Base Mainnet.
pub const USDC_BASE: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

/// USDC contract address on Base Sepolia.
pub const USDC_BASE_SEPOLIA: Address = address!("036CbD53842c5426634e7929541eC2318f3dCF7e");

/// USDC contract address on Ethereum Mainnet.
pub const USDC_ETHEREUM: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");

/// USDC contract address on Polygon Mainnet.
pub const USDC_POLYGON: Address = address!("3c499c542cEF5E3811e1192ce70d8cC03d5c3359");

/// USDC contract address on Polygon Amoy.
pub const USDC_POLYGON_AMOY: Address = address!("41E94Eb71Ef8C9fAE0235d1e472b21E21B5a4dbF");

/// USDC contract address on Avalanche C-Chain.
pub const USDC_AVALANCHE: Address = address!("B97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E");

/// USDC contract address on Avalanche Fuji.
pub const USDC_AVALANCHE_FUJI: Address = address!("5425890298aed601595a70AB815c96711a31Bc65");

/// USDC contract address on Celo.
pub const USDC_CELO: Address = address!("cebA9300f2b948710d2653dD7B07f33A8B32118C");

/// Default EIP-712 domain name for USDC.
pub const DEFAULT_USDC_NAME: &str = "USD Coin";

/// EIP-712 domain name of the Base Sepolia USDC contract.
pub const BASE_SEPOLIA_USDC_NAME: &str = "USDC";

/// Default EIP-712 domain version for USDC.
pub const DEFAULT_USDC_VERSION: &str = "2";

/// Default token decimals for USDC.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;

/// Symbol of the token every known network carries.
pub const USDC_SYMBOL: &str = "USDC";

/// EIP-712 domain parameters of a token contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Eip712Domain {
    /// Domain name, e.g. `"USD Coin"`.
    pub name: &'static str,
    /// Domain version, e.g. `"2"`.
    pub version: &'static str,
}

/// A token contract deployed on one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenDeployment {
    /// Ticker used in configuration, e.g. `"USDC"`.
    pub symbol: &'static str,
    /// Contract address.
    pub address: Address,
    /// Decimals of the token.
    pub decimals: u8,
    /// Domain clients sign transfer authorizations over.
    pub eip712: Eip712Domain,
}

/// A named EVM network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvmNetwork {
    /// Wire name, e.g. `"base-sepolia"`.
    pub name: &'static str,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// The USDC deployment on this network.
    pub usdc: TokenDeployment,
}

const fn usdc(address: Address, name: &'static str) -> TokenDeployment {
    TokenDeployment {
        symbol: USDC_SYMBOL,
        address,
        decimals: DEFAULT_TOKEN_DECIMALS,
        eip712: Eip712Domain {
            name,
            version: DEFAULT_USDC_VERSION,
        },
    }
}

const KNOWN_NETWORKS: &[EvmNetwork] = &[
    EvmNetwork {
        name: "base",
        chain_id: BASE_MAINNET,
        usdc: usdc(USDC_BASE, DEFAULT_USDC_NAME),
    },
    EvmNetwork {
        name: "base-sepolia",
        chain_id: BASE_SEPOLIA,
        usdc: usdc(USDC_BASE_SEPOLIA, BASE_SEPOLIA_USDC_NAME),
    },
    EvmNetwork {
        name: "ethereum",
        chain_id: ETHEREUM_MAINNET,
        usdc: usdc(USDC_ETHEREUM, DEFAULT_USDC_NAME),
    },
    EvmNetwork {
        name: "polygon",
        chain_id: POLYGON_MAINNET,
        usdc: usdc(USDC_POLYGON, DEFAULT_USDC_NAME),
    },
    EvmNetwork {
        name: "polygon-amoy",
        chain_id: POLYGON_AMOY,
        usdc: usdc(USDC_POLYGON_AMOY, DEFAULT_USDC_NAME),
    },
    EvmNetwork {
        name: "avalanche",
        chain_id: AVALANCHE_MAINNET,
        usdc: usdc(USDC_AVALANCHE, DEFAULT_USDC_NAME),
    },
    EvmNetwork {
        name: "avalanche-fuji",
        chain_id: AVALANCHE_FUJI,
        usdc: usdc(USDC_AVALANCHE_FUJI, DEFAULT_USDC_NAME),
    },
    EvmNetwork {
        name: "celo",
        chain_id: CELO_MAINNET,
        usdc: usdc(USDC_CELO, DEFAULT_USDC_NAME),
    },
];

/// Returns every known EVM network.
#[must_use]
pub const fn known_networks() -> &'static [EvmNetwork] {
    KNOWN_NETWORKS
}

/// Looks up a known network by wire name.
#[must_use]
pub fn network_by_name(name: &str) -> Option<&'static EvmNetwork> {
    KNOWN_NETWORKS.iter().find(|n| n.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_chain_ids_are_unique() {
        let networks = known_networks();
        for (i, a) in networks.iter().enumerate() {
            for b in &networks[i + 1..] {
                assert_ne!(a.name, b.name);
                assert_ne!(a.chain_id, b.chain_id);
            }
        }
    }

    #[test]
    fn base_sepolia_usdc() {
        let network = network_by_name("base-sepolia").unwrap();
        assert_eq!(network.chain_id, 84532);
        assert_eq!(
            network.usdc.address.to_checksum(None),
            "0x036CbD53842c5426634e7929541eC2318f3dCF7e"
        );
        assert_eq!(network.usdc.eip712.name, "USDC");
        assert!(network_by_name("base-goerli").is_none());
    }
}
