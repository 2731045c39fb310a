//! Network selection and connection settings

use crate::core::{AssociationId, ServiceFlags};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Supported network variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet3,
    Stn,
    #[default]
    Regtest,
}

impl Network {
    /// Four bytes opening every frame on this network
    pub fn magic(&self) -> [u8; 4] {
        match self {
            Network::Mainnet => [0xe3, 0xe1, 0xf3, 0xe8],
            Network::Testnet3 => [0xf4, 0xe5, 0xf3, 0xf4],
            Network::Stn => [0xfb, 0xce, 0xc4, 0xf9],
            Network::Regtest => [0xda, 0xb5, 0xbf, 0xfa],
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Network::Mainnet => 8333,
            Network::Testnet3 => 18333,
            Network::Stn => 9333,
            Network::Regtest => 18444,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Testnet3 => "testnet3",
            Network::Stn => "stn",
            Network::Regtest => "regtest",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet3" | "testnet" => Ok(Network::Testnet3),
            "stn" => Ok(Network::Stn),
            "regtest" => Ok(Network::Regtest),
            other => Err(format!("Unknown network: {}", other)),
        }
    }
}

/// Settings for one outbound peer connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub network: Network,
    /// Services announced in our `version`
    pub services: ServiceFlags,
    /// Queue a `version` as soon as the connection is created
    pub send_version: bool,
    /// Overrides the default user agent
    pub user_agent: Option<String>,
    /// Join an existing association; suppresses our `version`
    pub association_id: Option<AssociationId>,
    /// Announce `version` without an association id
    pub null_association_id: bool,
    pub start_height: i32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            network: Network::Regtest,
            services: ServiceFlags::NETWORK,
            send_version: true,
            user_agent: None,
            association_id: None,
            null_association_id: false,
            start_height: -1,
        }
    }
}

impl ConnectionConfig {
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }
}

/// Settings for the polling loop that drives every connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkThreadConfig {
    /// Upper bound on one readiness wait
    pub poll_timeout: Duration,
    pub read_buffer_size: usize,
}

impl Default for NetworkThreadConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(100),
            read_buffer_size: crate::core::consensus::READ_BUFFER_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_magic_and_ports() {
        assert_eq!(Network::Mainnet.magic(), [0xe3, 0xe1, 0xf3, 0xe8]);
        assert_eq!(Network::Regtest.default_port(), 18444);
        assert_eq!(Network::Stn.default_port(), 9333);
    }

    #[test]
    fn test_network_names() {
        for network in [Network::Mainnet, Network::Testnet3, Network::Stn, Network::Regtest] {
            assert_eq!(network.to_string().parse::<Network>().unwrap(), network);
        }
        assert!("signet".parse::<Network>().is_err());
        assert_eq!(serde_json::to_string(&Network::Testnet3).unwrap(), "\"testnet3\"");
    }

    #[test]
    fn test_connection_config_defaults() {
        let config: ConnectionConfig = serde_json::from_str(r#"{"network":"stn"}"#).unwrap();
        assert_eq!(config.network, Network::Stn);
        assert!(config.send_version);
        assert_eq!(config.services, ServiceFlags::NETWORK);
        assert!(config.association_id.is_none());
    }
}
