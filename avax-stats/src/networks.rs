//! Pre-configured Avalanche network definitions.
//!
//! Every network exposes the public C-Chain JSON-RPC endpoint and the path
//! segment the Avascan API uses for it. Validator queries are always scoped
//! to the Primary Network subnet.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, address};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Subnet id of the Avalanche Primary Network.
pub const PRIMARY_NETWORK_ID: &str = "11111111111111111111111111111111LpoYY";

/// Base URL of the Avascan REST API.
pub const AVASCAN_API: &str = "https://api-beta.avascan.info";

/// OONODZ subscriptions contract on the C-Chain mainnet.
pub const SUBSCRIPTIONS_CONTRACT: Address = address!("59a90cd4fa3f6f9544fb26eeee913a35d6e7772e");

/// Block at which [`SUBSCRIPTIONS_CONTRACT`] was created.
pub const SUBSCRIPTIONS_CREATION_BLOCK: u64 = 28_953_227;

/// Maximum number of blocks a public C-Chain node serves per `eth_getLogs`.
pub const MAX_LOG_BLOCK_RANGE: u64 = 2_048;

/// Known Avalanche networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Avalanche Mainnet (C-Chain ID 43114).
    #[default]
    Mainnet,
    /// Avalanche Fuji testnet (C-Chain ID 43113).
    Testnet,
}

impl Network {
    /// All known network variants.
    pub const ALL: &[Self] = &[Self::Mainnet, Self::Testnet];

    /// Name used on the command line and in Avascan URL paths.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
        }
    }

    /// Returns the EIP-155 chain ID of the network's C-Chain.
    #[must_use]
    pub const fn c_chain_id(self) -> u64 {
        match self {
            Self::Mainnet => 43_114,
            Self::Testnet => 43_113,
        }
    }

    /// Public C-Chain JSON-RPC endpoint.
    #[must_use]
    pub const fn c_chain_rpc(self) -> &'static str {
        match self {
            Self::Mainnet => "https://api.avax.network/ext/bc/C/rpc",
            Self::Testnet => "https://api.avax-test.network/ext/bc/C/rpc",
        }
    }

    /// Path of the Avascan staking validations listing, relative to the API root.
    #[must_use]
    pub fn validations_path(self) -> String {
        format!("v2/network/{}/staking/validations", self.as_str())
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|n| n.as_str() == s)
            .ok_or_else(|| Error::UnknownNetwork(s.to_owned()))
    }
}

/// Validation status filter accepted by the Avascan listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Validators currently validating.
    #[default]
    Active,
    /// Validators whose validation period has not started yet.
    Pending,
}

impl Status {
    /// Query-string value for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "pending" => Ok(Self::Pending),
            other => Err(Error::UnknownStatus(other.to_owned())),
        }
    }
}
