// Node Configuration
//
// Everything a node needs is fixed at construction: where it listens, how peers
// know it, who its peers are, where blocks live, and the reward amounts.

use crate::transport::UdpTransportConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("collect_timeout_ms must be greater than 0")]
    InvalidTimeout,
}

/// Immutable node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Address peers use to reach this node; also identifies it in reconciliation rounds
    pub address: SocketAddr,
    /// Socket address to bind
    pub listen: SocketAddr,
    /// Static peer list; the node's own address is ignored if present
    pub peers: Vec<SocketAddr>,
    /// Directory holding `<n>.txt` block files
    pub data_dir: PathBuf,
    /// How long reconciliation and surveys wait for replies
    pub collect_timeout_ms: u64,
    /// Reward minted for a successful local chain check
    pub check_reward: u64,
    /// Reward minted for a successful reconciliation round
    pub reconcile_reward: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            address: SocketAddr::from(([127, 0, 0, 1], 8001)),
            listen: SocketAddr::from(([0, 0, 0, 0], 8001)),
            peers: Vec::new(),
            data_dir: PathBuf::from("./blocks"),
            collect_timeout_ms: 3_000,
            check_reward: 10,
            reconcile_reward: 100,
        }
    }
}

impl NodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML file; missing keys fall back to defaults
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the advertised address and listen on the same port on all interfaces
    pub fn with_address(mut self, address: SocketAddr) -> Self {
        self.address = address;
        self.listen = SocketAddr::new(self.listen.ip(), address.port());
        self
    }

    pub fn with_listen(mut self, listen: SocketAddr) -> Self {
        self.listen = listen;
        self
    }

    pub fn with_peers(mut self, peers: Vec<SocketAddr>) -> Self {
        self.peers = peers;
        self
    }

    pub fn with_data_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_collect_timeout_ms(mut self, ms: u64) -> Self {
        self.collect_timeout_ms = ms;
        self
    }

    pub fn with_check_reward(mut self, amount: u64) -> Self {
        self.check_reward = amount;
        self
    }

    pub fn with_reconcile_reward(mut self, amount: u64) -> Self {
        self.reconcile_reward = amount;
        self
    }

    pub fn collect_timeout(&self) -> Duration {
        Duration::from_millis(self.collect_timeout_ms)
    }

    /// UDP socket settings derived from `listen`
    pub fn udp_config(&self) -> UdpTransportConfig {
        UdpTransportConfig::new()
            .with_bind_address(&self.listen.ip().to_string())
            .with_bind_port(self.listen.port())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collect_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}
