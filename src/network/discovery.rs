use log::{debug, info};
use pnet::datalink;
use std::collections::BTreeSet;

use crate::config::NodeConfig;
use crate::error::{Error, Result};
use crate::Address;

/// IPv4 address of a named interface, as a node address.
pub fn interface_address(name: &str) -> Option<Address> {
    let interfaces = datalink::interfaces();
    let interface = interfaces.iter().find(|iface| iface.name == name)?;
    let ip = interface.ips.iter().find(|ip| ip.is_ipv4())?;
    debug!("Interface: {} -> {}", name, ip.ip());
    Some(ip.ip().to_string())
}

/// Our own address: the configured one, else the IPv4 address of the
/// configured interface.
pub fn discover_self_address(config: &NodeConfig) -> Result<Address> {
    if let Some(address) = &config.address {
        return Ok(address.clone());
    }
    let name = config
        .interface
        .as_deref()
        .ok_or_else(|| Error::Config("neither address nor interface configured".to_string()))?;
    let address = interface_address(name)
        .ok_or_else(|| Error::Config(format!("no IPv4 address on interface {}", name)))?;
    info!("Discovered own address {} on {}", address, name);
    Ok(address)
}

/// Our direct neighbors: the configured list, else every peer in the
/// address book except ourselves.
pub fn discover_neighbors(config: &NodeConfig, own: &str) -> BTreeSet<Address> {
    let neighbors: BTreeSet<Address> = if config.neighbors.is_empty() {
        config.peers.keys().cloned().collect()
    } else {
        config.neighbors.iter().cloned().collect()
    };
    neighbors.into_iter().filter(|n| n != own).collect()
}
