use crate::net::NodeId;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, io, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config lists no nodes")]
    NoNodes,
    #[error("config has an empty client id")]
    NoClientId,
}

/// Startup configuration of a client.
///
/// ```json
/// { "NodeAddrMap": { "n1": "127.0.0.1:9001" }, "ClientID": "alice" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(rename = "NodeAddrMap")]
    pub node_addr_map: HashMap<NodeId, String>,
    #[serde(rename = "ClientID")]
    pub client_id: String,
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Cluster members, sorted.
    pub fn members(&self) -> Vec<NodeId> {
        let mut members: Vec<_> = self.node_addr_map.keys().cloned().collect();
        members.sort();
        members
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.node_addr_map.is_empty() {
            return Err(ConfigError::NoNodes);
        }
        if self.client_id.is_empty() {
            return Err(ConfigError::NoClientId);
        }
        Ok(())
    }
}
