//! Network parameters
//!
//! The version bytes that differ between mainnet and testnet. They prefix
//! every base58check payload this crate produces (WIF keys and addresses).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which Bitcoin network an encoding or transaction belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// Select a network from a testnet flag
    pub fn from_testnet(testnet: bool) -> Self {
        if testnet {
            Network::Testnet
        } else {
            Network::Mainnet
        }
    }

    pub fn is_testnet(&self) -> bool {
        matches!(self, Network::Testnet)
    }

    /// Version byte prepended to a WIF-encoded secret
    pub fn wif_prefix(&self) -> u8 {
        match self {
            Network::Mainnet => 0x80,
            Network::Testnet => 0xef,
        }
    }

    /// Version byte of a pay-to-pubkey-hash address
    pub fn p2pkh_prefix(&self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet => 0x6f,
        }
    }

    /// Version byte of a pay-to-script-hash address
    pub fn p2sh_prefix(&self) -> u8 {
        match self {
            Network::Mainnet => 0x05,
            Network::Testnet => 0xc4,
        }
    }

    /// Resolve a WIF version byte back to its network
    pub fn from_wif_prefix(prefix: u8) -> Option<Self> {
        match prefix {
            0x80 => Some(Network::Mainnet),
            0xef => Some(Network::Testnet),
            _ => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert_eq!(Network::Mainnet.wif_prefix(), 0x80);
        assert_eq!(Network::Testnet.p2pkh_prefix(), 0x6f);
        assert_eq!(Network::from_wif_prefix(0xef), Some(Network::Testnet));
        assert_eq!(Network::from_wif_prefix(0x00), None);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Network::Testnet).unwrap();
        assert_eq!(json, "\"testnet\"");
        assert_eq!(Network::from_testnet(false), Network::Mainnet);
    }
}
