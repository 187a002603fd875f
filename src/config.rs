use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use anyhow::Result;
use crate::Address;
use crate::protocol::DEFAULT_BROADCAST_RADIUS;

pub const PROTOCOL_PORT: u16 = 1111;

/// Configuration shared by every node role. Fields a role does not use are
/// ignored (`routers` only matters to the monitor, `broadcast_radius` only
/// to hosts).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Our address. When absent it is read from `interface`.
    pub address: Option<Address>,
    pub interface: Option<String>,
    pub bind: SocketAddr,
    pub neighbors: Vec<Address>,
    /// Address book for the UDP transport. Addresses missing here that parse
    /// as IPs are reached on `PROTOCOL_PORT`.
    pub peers: BTreeMap<Address, SocketAddr>,
    pub rip_enabled: bool,
    pub broadcast_radius: u32,
    pub routers: Vec<Address>,
    pub collect_interval_secs: u64,
    pub collect_timeout_secs: Option<u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            address: None,
            interface: None,
            bind: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, PROTOCOL_PORT)),
            neighbors: vec![],
            peers: BTreeMap::new(),
            rip_enabled: false,
            broadcast_radius: DEFAULT_BROADCAST_RADIUS,
            routers: vec![],
            collect_interval_secs: 30,
            collect_timeout_secs: None,
        }
    }
}

impl NodeConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: NodeConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn collect_interval(&self) -> Duration {
        Duration::from_secs(self.collect_interval_secs.max(1))
    }

    pub fn collect_timeout(&self) -> Option<Duration> {
        self.collect_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: NodeConfig = serde_json::from_str(r#"{"address":"r1","neighbors":["h1","r2"]}"#).unwrap();

        assert_eq!(config.address.as_deref(), Some("r1"));
        assert_eq!(config.neighbors, vec!["h1", "r2"]);
        assert_eq!(config.bind.port(), PROTOCOL_PORT);
        assert_eq!(config.broadcast_radius, DEFAULT_BROADCAST_RADIUS);
        assert!(config.collect_timeout().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("routesim-config-{}.json", uuid::Uuid::new_v4()));
        let path = path.to_string_lossy().to_string();
        let mut config = NodeConfig::default();
        config.address = Some("m".to_string());
        config.routers = vec!["r1".to_string()];
        config.collect_timeout_secs = Some(5);

        config.save(&path).unwrap();
        let loaded = NodeConfig::load(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded.routers, config.routers);
        assert_eq!(loaded.collect_timeout(), Some(Duration::from_secs(5)));
    }
}
