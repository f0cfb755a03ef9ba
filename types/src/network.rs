//! Chain identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// EIP-155 chain id of the network a session is connected to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(u64);

impl ChainId {
    pub const ARBITRUM_ONE: Self = Self(42_161);
    pub const SEPOLIA: Self = Self(11_155_111);
    pub const BSC: Self = Self(56);
    pub const BSC_TESTNET: Self = Self(97);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Human-readable name for the networks the dashboard supports.
    pub fn name(&self) -> Option<&'static str> {
        match *self {
            Self::ARBITRUM_ONE => Some("arbitrum"),
            Self::SEPOLIA => Some("sepolia"),
            Self::BSC => Some("bsc"),
            Self::BSC_TESTNET => Some("bsc-testnet"),
            _ => None,
        }
    }

    /// Resolve a network name or a numeric id.
    pub fn from_name_or_id(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "arbitrum" => Some(Self::ARBITRUM_ONE),
            "sepolia" => Some(Self::SEPOLIA),
            "bsc" => Some(Self::BSC),
            "bsc-testnet" => Some(Self::BSC_TESTNET),
            other => other.parse().ok().map(Self),
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({})", self.0),
            None => write!(f, "chain {}", self.0),
        }
    }
}
