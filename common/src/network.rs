use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The named deployment a node connects to. Resolves defaults for RPC
/// endpoint, chain id, and contract address the way the teacher's wallet
/// resolves network-specific genesis/RPC defaults from a single enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkPreset {
    Devnet,
    Testnet,
    Mainnet,
    Planet,
}

impl NetworkPreset {
    pub fn default_rpc(&self) -> &'static str {
        match self {
            NetworkPreset::Devnet => "http://127.0.0.1:26657",
            NetworkPreset::Testnet => "https://rpc.testnet.seda.xyz",
            NetworkPreset::Mainnet => "https://rpc.seda.xyz",
            NetworkPreset::Planet => "https://rpc.planet.seda.xyz",
        }
    }

    pub fn default_chain_id(&self) -> &'static str {
        match self {
            NetworkPreset::Devnet => "seda_devnet",
            NetworkPreset::Testnet => "seda_test",
            NetworkPreset::Mainnet => "seda_mainnet",
            NetworkPreset::Planet => "seda_planet",
        }
    }
}

impl fmt::Display for NetworkPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NetworkPreset::Devnet => "devnet",
            NetworkPreset::Testnet => "testnet",
            NetworkPreset::Mainnet => "mainnet",
            NetworkPreset::Planet => "planet",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown network {0:?}, expected one of devnet|testnet|mainnet|planet")]
pub struct UnknownNetwork(String);

impl FromStr for NetworkPreset {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "devnet" => Ok(NetworkPreset::Devnet),
            "testnet" => Ok(NetworkPreset::Testnet),
            "mainnet" => Ok(NetworkPreset::Mainnet),
            "planet" => Ok(NetworkPreset::Planet),
            other => Err(UnknownNetwork(other.to_string())),
        }
    }
}
