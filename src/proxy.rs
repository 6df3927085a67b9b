// src/proxy.rs
use ipnetwork::IpNetwork;
use log::info;
use std::net::IpAddr;

/// Reverse proxies allowed to report the real client address through
/// forwarding headers.
#[derive(Debug, Default, Clone)]
pub struct TrustedProxies {
    networks: Vec<IpNetwork>,
}

impl TrustedProxies {
    pub fn new(networks: Vec<IpNetwork>) -> Self {
        if !networks.is_empty() {
            info!("Trusting forwarding headers from {} networks", networks.len());
        }
        Self { networks }
    }

    pub fn is_trusted(&self, ip: IpAddr) -> bool {
        self.networks.iter().any(|network| network.contains(ip))
    }
}
